//! Compiled bodies and the module that owns them.

use garnet_ast::Span;
use serde::Serialize;

use crate::{Arity, BodyId, BreakId, IrNode, ReturnId};

/// What kind of construct a body was compiled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BodyKind {
    TopLevel,
    Method,
    Block,
    Lambda,
    ClassBody,
    ModuleBody,
}

impl BodyKind {
    /// Blocks and lambdas are closures over their defining frame.
    pub fn is_closure(&self) -> bool {
        matches!(self, BodyKind::Block | BodyKind::Lambda)
    }

    /// Methods and lambdas check arity strictly.
    pub fn is_strict(&self) -> bool {
        matches!(self, BodyKind::Method | BodyKind::Lambda)
    }
}

/// A method, block, lambda, class body or top level after lowering.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledBody {
    pub id: BodyId,

    /// Method name, `block in <method>`, `<lambda>`, class name or `<main>`
    pub name: String,

    pub kind: BodyKind,

    /// Parameter shape, for arity diagnostics raised at call time
    pub arity: Arity,

    /// Local names by slot index; the slot count is its length
    pub slot_names: Vec<String>,

    /// The frame of this body must keep a link to its declaration frame
    pub needs_captured_frame: bool,

    /// Identity `return` exits target
    pub return_id: Option<ReturnId>,

    /// Identity `break` exits target (blocks and lambdas)
    pub break_id: Option<BreakId>,

    /// Parameter prelude followed by the lowered body
    pub body: IrNode,

    pub span: Span,
}

impl CompiledBody {
    pub fn new(id: BodyId, name: String, kind: BodyKind) -> Self {
        Self {
            id,
            name,
            kind,
            arity: Arity::default(),
            slot_names: Vec::new(),
            needs_captured_frame: false,
            return_id: None,
            break_id: None,
            body: IrNode::Nil,
            span: Span::default(),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slot_names.len()
    }

    /// Slot index of a named local, if the body declares it.
    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.slot_names.iter().position(|n| n == name)
    }
}

/// Per-body summary for tooling output.
#[derive(Debug, Clone, Serialize)]
pub struct BodySummary {
    pub id: usize,
    pub name: String,
    pub kind: BodyKind,
    pub arity: Arity,
    pub slots: Vec<String>,
    pub needs_captured_frame: bool,
    pub return_id: Option<usize>,
    pub break_id: Option<usize>,
}

impl From<&CompiledBody> for BodySummary {
    fn from(body: &CompiledBody) -> Self {
        Self {
            id: body.id.0,
            name: body.name.clone(),
            kind: body.kind,
            arity: body.arity.clone(),
            slots: body.slot_names.clone(),
            needs_captured_frame: body.needs_captured_frame,
            return_id: body.return_id.map(|id| id.0),
            break_id: body.break_id.map(|id| id.0),
        }
    }
}

/// All bodies produced from one program.
#[derive(Debug, Clone, PartialEq)]
pub struct IrModule {
    /// Bodies indexed by `BodyId`
    pub bodies: Vec<CompiledBody>,

    /// Top-level body
    pub main: BodyId,
}

impl IrModule {
    pub fn new() -> Self {
        Self {
            bodies: Vec::new(),
            main: BodyId(0),
        }
    }

    /// Stores a body at the index named by its id. Ids are reserved before
    /// nested bodies are lowered, so bodies may arrive out of order.
    pub fn add_body(&mut self, body: CompiledBody) -> BodyId {
        let id = body.id;
        if id.0 >= self.bodies.len() {
            let filler = |i: usize| CompiledBody::new(BodyId(i), String::new(), BodyKind::Block);
            let start = self.bodies.len();
            self.bodies.extend((start..=id.0).map(filler));
        }
        self.bodies[id.0] = body;
        id
    }

    pub fn body(&self, id: BodyId) -> Option<&CompiledBody> {
        self.bodies.get(id.0)
    }

    pub fn find_body(&self, name: &str) -> Option<&CompiledBody> {
        self.bodies.iter().find(|b| b.name == name)
    }

    pub fn summaries(&self) -> Vec<BodySummary> {
        self.bodies.iter().map(BodySummary::from).collect()
    }
}

impl Default for IrModule {
    fn default() -> Self {
        Self::new()
    }
}
