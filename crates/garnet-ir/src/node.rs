//! IR node kinds.
//!
//! One closed enum covers every node the lowerer can emit. The engine matches
//! on it exhaustively, so adding a kind means touching every consumer.

use crate::{Arity, BodyId, BreakId, ReturnId, SlotId};

/// Storage class of a resolved local.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalKind {
    /// Ordinary local variable or parameter
    Local,
    /// Pseudo-global such as `$~` or `$_` that lives in a frame slot
    FrameLocalGlobal,
}

/// A local reference resolved at lowering time: walk `level` parent frames,
/// then address `slot`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalRef {
    pub level: usize,
    pub slot: SlotId,
    pub kind: LocalKind,
    /// Source name, kept for dumps and diagnostics
    pub name: String,
}

impl LocalRef {
    pub fn new(level: usize, slot: SlotId, kind: LocalKind, name: impl Into<String>) -> Self {
        Self {
            level,
            slot,
            kind,
            name: name.into(),
        }
    }
}

/// What a positional read does when the argument was not supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingArgumentBehavior {
    /// Blocks: bind nil
    Nil,
    /// Methods and lambdas: raise an argument error
    HardError,
}

/// How a splat cast treats a nil operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplatNilPolicy {
    /// `nil` becomes `[nil]`
    ArrayWithNil,
    /// `nil` becomes `[]`
    EmptyArray,
}

/// IR node
#[derive(Debug, Clone, PartialEq)]
pub enum IrNode {
    // ------------------------------------------------------------------
    // Literals
    // ------------------------------------------------------------------
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Str(String),
    Symbol(String),
    SelfValue,

    /// Array built from the element values; `Splat` elements are spread.
    ArrayLiteral(Vec<IrNode>),

    HashLiteral(Vec<(IrNode, IrNode)>),

    /// Spread marker, only meaningful inside array literals and argument lists
    Splat(Box<IrNode>),

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------
    Sequence(Vec<IrNode>),

    If {
        condition: Box<IrNode>,
        then_branch: Box<IrNode>,
        else_branch: Box<IrNode>,
    },

    And(Box<IrNode>, Box<IrNode>),
    Or(Box<IrNode>, Box<IrNode>),
    Not(Box<IrNode>),

    /// Runs `body`, then produces `result`. When the value is discarded
    /// (any non-final position of a sequence) only `body` survives.
    ElidableResult {
        body: Box<IrNode>,
        result: Box<IrNode>,
    },

    // ------------------------------------------------------------------
    // Variables
    // ------------------------------------------------------------------
    ReadLocal(LocalRef),

    WriteLocal {
        target: LocalRef,
        value: Box<IrNode>,
    },

    ReadInstanceVar(String),
    WriteInstanceVar {
        name: String,
        value: Box<IrNode>,
    },

    ReadClassVar(String),
    WriteClassVar {
        name: String,
        value: Box<IrNode>,
    },

    ReadGlobal(String),
    WriteGlobal {
        name: String,
        value: Box<IrNode>,
    },

    ReadConstant(String),

    // ------------------------------------------------------------------
    // Argument binding
    // ------------------------------------------------------------------
    /// Strict positional arity check for methods and lambdas
    CheckArity(Arity),

    /// Positional argument by forward index
    ReadPreArgument {
        index: usize,
        missing: MissingArgumentBehavior,
    },

    /// Supplied value when at least `minimum` positional arguments were
    /// passed, else `default`. `minimum` counts the keyword carrier slot when
    /// `keywords` is set; the engine discounts it when no carrier was passed.
    ReadOptionalArgument {
        index: usize,
        minimum: usize,
        keywords: bool,
        required: usize,
        default: Box<IrNode>,
    },

    /// Arguments `[start, len - post)`, minus the keyword carrier if present
    ReadRestArgument {
        start: usize,
        post: usize,
        keywords: bool,
        required: usize,
    },

    /// Post parameter: `from_end` counted from the end when at least
    /// `minimum` values were supplied, else `forward_index` from the start.
    ReadPostArgument {
        from_end: usize,
        forward_index: usize,
        minimum: usize,
        keywords: bool,
        required: usize,
    },

    /// Named entry of the keyword carrier, else `default`
    ReadKeywordArgument {
        name: String,
        required: usize,
        default: Box<IrNode>,
    },

    /// Every carrier entry not claimed by a named keyword parameter
    ReadKeywordRestArgument {
        required: usize,
        excluded: Vec<String>,
    },

    /// Raises when executed
    MissingKeywordArgument(String),

    /// Block passed to the current invocation, or nil
    ReadBlock,

    /// True when a proc received exactly one non-nil argument that
    /// coerces to an array
    ShouldDestructure,

    // ------------------------------------------------------------------
    // Sequence operations
    // ------------------------------------------------------------------
    /// Element read; negative indices count from the end, out of range is nil
    ArrayRead {
        array: Box<IrNode>,
        index: i64,
    },

    /// Elements `[start, len - end_offset)`, empty when the range is inverted
    ArraySlice {
        array: Box<IrNode>,
        start: usize,
        end_offset: usize,
    },

    ArrayIsAtLeastAsLargeAs {
        array: Box<IrNode>,
        size: usize,
    },

    /// Coerce to an array: arrays pass through, `to_ary` is consulted on
    /// objects (a nil answer yields nil), anything else is wrapped.
    SplatCast {
        value: Box<IrNode>,
        nil_policy: SplatNilPolicy,
    },

    IsNil(Box<IrNode>),

    // ------------------------------------------------------------------
    // Calls and definitions
    // ------------------------------------------------------------------
    Call {
        receiver: Option<Box<IrNode>>,
        method: String,
        args: Vec<IrNode>,
        block: Option<Box<IrNode>>,
    },

    /// Superclass dispatch; without an explicit block and with
    /// `forward_block` set, the current method's block is passed along.
    Super {
        args: Vec<IrNode>,
        block: Option<Box<IrNode>>,
        forward_block: bool,
    },

    Yield(Vec<IrNode>),

    /// Closure over the current frame
    ProcLiteral {
        body: BodyId,
        lambda: bool,
    },

    /// Catches a `break` carrying `id` raised while evaluating `body`
    CatchBreak {
        id: BreakId,
        body: Box<IrNode>,
    },

    MethodDefinition {
        name: String,
        body: BodyId,
    },

    ModuleDefinition {
        name: String,
        superclass: Option<Box<IrNode>>,
        is_module: bool,
        body: BodyId,
    },

    // ------------------------------------------------------------------
    // Loops and non-local exits
    // ------------------------------------------------------------------
    While {
        condition: Box<IrNode>,
        body: Box<IrNode>,
        do_while: bool,
        break_id: BreakId,
    },

    Break {
        id: BreakId,
        value: Box<IrNode>,
    },

    Next(Box<IrNode>),
    Redo,
    Retry,

    Return {
        id: ReturnId,
        value: Box<IrNode>,
    },
}

impl IrNode {
    /// Build a sequence: nested sequences are flattened, discarded elidable
    /// results are reduced to their bodies, and a single element is returned
    /// unwrapped.
    pub fn sequence(nodes: Vec<IrNode>) -> IrNode {
        let mut flat = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                IrNode::Sequence(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }

        let last = flat.len().saturating_sub(1);
        let mut items: Vec<IrNode> = Vec::with_capacity(flat.len());
        for (i, node) in flat.into_iter().enumerate() {
            match node {
                IrNode::ElidableResult { body, .. } if i != last => match *body {
                    IrNode::Sequence(inner) => items.extend(inner),
                    other => items.push(other),
                },
                other => items.push(other),
            }
        }

        match items.len() {
            0 => IrNode::Nil,
            1 => items.pop().unwrap_or(IrNode::Nil),
            _ => IrNode::Sequence(items),
        }
    }

    pub fn if_else(condition: IrNode, then_branch: IrNode, else_branch: IrNode) -> IrNode {
        IrNode::If {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        }
    }

    pub fn write_local(target: LocalRef, value: IrNode) -> IrNode {
        IrNode::WriteLocal {
            target,
            value: Box::new(value),
        }
    }

    pub fn array_read(array: IrNode, index: i64) -> IrNode {
        IrNode::ArrayRead {
            array: Box::new(array),
            index,
        }
    }

    pub fn at_least(array: IrNode, size: usize) -> IrNode {
        IrNode::ArrayIsAtLeastAsLargeAs {
            array: Box::new(array),
            size,
        }
    }

    pub fn call(receiver: Option<IrNode>, method: impl Into<String>, args: Vec<IrNode>) -> IrNode {
        IrNode::Call {
            receiver: receiver.map(Box::new),
            method: method.into(),
            args,
            block: None,
        }
    }

    /// Visit this node and every node nested in it, pre-order.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a IrNode)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    /// Direct child nodes in evaluation order.
    pub fn children(&self) -> Vec<&IrNode> {
        match self {
            IrNode::Nil
            | IrNode::Boolean(_)
            | IrNode::Integer(_)
            | IrNode::Float(_)
            | IrNode::Str(_)
            | IrNode::Symbol(_)
            | IrNode::SelfValue
            | IrNode::ReadLocal(_)
            | IrNode::ReadInstanceVar(_)
            | IrNode::ReadClassVar(_)
            | IrNode::ReadGlobal(_)
            | IrNode::ReadConstant(_)
            | IrNode::CheckArity(_)
            | IrNode::ReadPreArgument { .. }
            | IrNode::ReadRestArgument { .. }
            | IrNode::ReadPostArgument { .. }
            | IrNode::ReadKeywordRestArgument { .. }
            | IrNode::MissingKeywordArgument(_)
            | IrNode::ReadBlock
            | IrNode::ShouldDestructure
            | IrNode::ProcLiteral { .. }
            | IrNode::MethodDefinition { .. }
            | IrNode::Redo
            | IrNode::Retry => Vec::new(),

            IrNode::ArrayLiteral(items) | IrNode::Sequence(items) | IrNode::Yield(items) => {
                items.iter().collect()
            }
            IrNode::HashLiteral(pairs) => pairs.iter().flat_map(|(k, v)| [k, v]).collect(),
            IrNode::Splat(inner)
            | IrNode::Not(inner)
            | IrNode::IsNil(inner)
            | IrNode::Next(inner) => vec![&**inner],
            IrNode::If {
                condition,
                then_branch,
                else_branch,
            } => vec![&**condition, &**then_branch, &**else_branch],
            IrNode::And(left, right) | IrNode::Or(left, right) => vec![&**left, &**right],
            IrNode::ElidableResult { body, result } => vec![&**body, &**result],
            IrNode::WriteLocal { value, .. }
            | IrNode::WriteInstanceVar { value, .. }
            | IrNode::WriteClassVar { value, .. }
            | IrNode::WriteGlobal { value, .. }
            | IrNode::Break { value, .. }
            | IrNode::Return { value, .. } => vec![&**value],
            IrNode::ReadOptionalArgument { default, .. }
            | IrNode::ReadKeywordArgument { default, .. } => vec![&**default],
            IrNode::ArrayRead { array, .. }
            | IrNode::ArraySlice { array, .. }
            | IrNode::ArrayIsAtLeastAsLargeAs { array, .. } => vec![&**array],
            IrNode::SplatCast { value, .. } => vec![&**value],
            IrNode::Call {
                receiver,
                args,
                block,
                ..
            } => receiver
                .iter()
                .map(|r| r.as_ref())
                .chain(args.iter())
                .chain(block.iter().map(|b| b.as_ref()))
                .collect(),
            IrNode::Super { args, block, .. } => args
                .iter()
                .chain(block.iter().map(|b| b.as_ref()))
                .collect(),
            IrNode::CatchBreak { body, .. } => vec![&**body],
            IrNode::ModuleDefinition { superclass, .. } => {
                superclass.iter().map(|s| s.as_ref()).collect()
            }
            IrNode::While {
                condition, body, ..
            } => vec![&**condition, &**body],
        }
    }

    /// True if this node or any descendant satisfies `predicate`.
    pub fn any(&self, predicate: &dyn Fn(&IrNode) -> bool) -> bool {
        let mut found = false;
        self.walk(&mut |node| {
            if !found && predicate(node) {
                found = true;
            }
        });
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_of_call() {
        let node = IrNode::Call {
            receiver: Some(Box::new(IrNode::SelfValue)),
            method: "push".to_string(),
            args: vec![IrNode::Integer(1), IrNode::Integer(2)],
            block: Some(Box::new(IrNode::ReadBlock)),
        };
        assert_eq!(node.children().len(), 4);
    }

    #[test]
    fn test_any_finds_nested_node() {
        let node = IrNode::if_else(
            IrNode::Boolean(true),
            IrNode::sequence(vec![IrNode::Nil, IrNode::MissingKeywordArgument("k".into())]),
            IrNode::Nil,
        );
        assert!(node.any(&|n| matches!(n, IrNode::MissingKeywordArgument(_))));
        assert!(!node.any(&|n| matches!(n, IrNode::ReadBlock)));
    }
}
