//! AST → IR Lowering
//!
//! Translates a Garnet AST `Program` into an `IrModule`. The lowerer owns one
//! `EnvArena` for the whole unit; each method, block, lambda and class body
//! gets an environment in it, and every local reference is resolved to a
//! `(level, slot)` pair while the body is lowered.

mod args;
pub mod collect;
pub mod env;
mod error;
mod masgn;
mod replay;

use std::rc::Rc;

use garnet_ast::*;
use tracing::debug;

use crate::{
    Arity, BodyId, BodyKind, BreakId, CompiledBody, EnvId, IrModule, IrNode, SplatNilPolicy,
};

pub use collect::collect_declarations;
pub use env::{EnvArena, Environment, Resolution};
pub use error::{LowerError, LowerErrorKind, LowerResult};

/// Lowering configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LowerOptions {
    /// File id stamped on diagnostic spans
    pub file_id: usize,
    /// Reject default values that read a parameter bound later
    pub reject_forward_parameter_references: bool,
    /// Reading an undeclared local is an error; otherwise it is declared and reads nil
    pub strict_unresolved_locals: bool,
}

impl Default for LowerOptions {
    fn default() -> Self {
        Self {
            file_id: 0,
            reject_forward_parameter_references: true,
            strict_unresolved_locals: true,
        }
    }
}

/// Method whose parameters a bare `super` replays.
#[derive(Debug)]
struct MethodContext {
    params: Params,
}

/// State that changes when lowering enters a new body.
#[derive(Debug, Clone)]
struct BodyContext {
    env: EnvId,
    kind: BodyKind,
    /// Lowering the body of a `while`/`until` in this body
    in_loop: bool,
    /// Lowering the value of a `next`
    in_next_expression: bool,
    /// Enclosing method, inherited by blocks and lambdas
    method: Option<Rc<MethodContext>>,
    /// Used to name nested block bodies
    scope_name: String,
}

/// Main lowering context.
pub struct Lowerer {
    options: LowerOptions,
    envs: EnvArena,
    module: IrModule,
    next_body_id: usize,
    errors: Vec<LowerError>,
    ctx: BodyContext,
}

impl Lowerer {
    pub fn new() -> Self {
        let mut envs = EnvArena::new();
        let top = envs.new_root(BodyKind::TopLevel);
        Self {
            options: LowerOptions::default(),
            envs,
            module: IrModule::new(),
            next_body_id: 0,
            errors: Vec::new(),
            ctx: BodyContext {
                env: top,
                kind: BodyKind::TopLevel,
                in_loop: false,
                in_next_expression: false,
                method: None,
                scope_name: "<main>".to_string(),
            },
        }
    }

    pub fn with_options(mut self, options: LowerOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the file id used in diagnostic spans.
    pub fn with_file_id(mut self, file_id: usize) -> Self {
        self.options.file_id = file_id;
        self
    }

    pub fn with_strict_unresolved_locals(mut self, strict: bool) -> Self {
        self.options.strict_unresolved_locals = strict;
        self
    }

    pub fn with_forward_reference_check(mut self, reject: bool) -> Self {
        self.options.reject_forward_parameter_references = reject;
        self
    }

    /// Environments created so far, for inspection.
    pub fn environments(&self) -> &EnvArena {
        &self.envs
    }

    /// Lower an entire program into an IR module.
    pub fn lower_program(mut self, program: &Program) -> Result<IrModule, Vec<LowerError>> {
        let main = self.reserve_body();
        let body = self.lower_statements(&program.body);
        let compiled = self.finish_body(
            main,
            "<main>".to_string(),
            BodyKind::TopLevel,
            self.ctx.env,
            Arity::default(),
            body,
            program.span,
        );
        self.module.add_body(compiled);
        self.module.main = main;

        debug!(
            bodies = self.module.bodies.len(),
            environments = self.envs.len(),
            errors = self.errors.len(),
            "lowered program"
        );

        if self.errors.is_empty() {
            Ok(self.module)
        } else {
            Err(self.errors)
        }
    }

    // ========================================================================
    // Bodies
    // ========================================================================

    fn reserve_body(&mut self) -> BodyId {
        let id = BodyId(self.next_body_id);
        self.next_body_id += 1;
        id
    }

    #[allow(clippy::too_many_arguments)]
    fn finish_body(
        &self,
        id: BodyId,
        name: String,
        kind: BodyKind,
        env: EnvId,
        arity: Arity,
        body: IrNode,
        span: Span,
    ) -> CompiledBody {
        let environment = self.envs.get(env);
        CompiledBody {
            id,
            name,
            kind,
            arity,
            slot_names: environment.slot_names(),
            needs_captured_frame: environment.needs_captured_frame,
            return_id: environment.return_id,
            break_id: environment.break_id,
            body,
            span,
        }
    }

    fn with_context<T>(&mut self, ctx: BodyContext, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = std::mem::replace(&mut self.ctx, ctx);
        let result = f(self);
        self.ctx = saved;
        result
    }

    fn child_context(&self, env: EnvId, kind: BodyKind) -> BodyContext {
        BodyContext {
            env,
            kind,
            in_loop: false,
            in_next_expression: false,
            method: self.ctx.method.clone(),
            scope_name: self.ctx.scope_name.clone(),
        }
    }

    /// Declare every parameter name, then lower the binding prelude and the
    /// statements of a callable body in the current context.
    fn lower_callable_body(&mut self, params: &Params, statements: &[Node<Expr>], span: Span) -> IrNode {
        let env = self.ctx.env;
        for name in collect_declarations(params) {
            self.envs.declare(env, &name);
        }

        let mut nodes = match self.lower_parameters(params, self.ctx.kind, span) {
            Ok(prelude) => prelude,
            Err(err) => {
                self.errors.push(err);
                Vec::new()
            }
        };
        nodes.push(self.lower_statements(statements));
        IrNode::sequence(nodes)
    }

    fn lower_method(&mut self, def: &MethodDef, span: Span) -> LowerResult<IrNode> {
        let name = def.name.value.name.clone();
        let id = self.reserve_body();
        let env = self.envs.new_root(BodyKind::Method);

        let ctx = BodyContext {
            env,
            kind: BodyKind::Method,
            in_loop: false,
            in_next_expression: false,
            method: Some(Rc::new(MethodContext {
                params: def.params.clone(),
            })),
            scope_name: name.clone(),
        };
        let body = self.with_context(ctx, |this| this.lower_callable_body(&def.params, &def.body, span));

        let compiled = self.finish_body(
            id,
            name.clone(),
            BodyKind::Method,
            env,
            Arity::from_params(&def.params),
            body,
            span,
        );
        self.module.add_body(compiled);
        Ok(IrNode::MethodDefinition { name, body: id })
    }

    /// Lower a block or lambda literal into a body and return the node that
    /// creates the closure, with the break identity a call site catches.
    fn lower_closure(
        &mut self,
        literal: &Node<BlockLiteral>,
        lambda: bool,
    ) -> LowerResult<(IrNode, Option<BreakId>)> {
        let parent = self.ctx.env;
        let (env, kind, name) = if lambda {
            (self.envs.new_lambda(parent), BodyKind::Lambda, "<lambda>".to_string())
        } else {
            (
                self.envs.new_block(parent, false),
                BodyKind::Block,
                format!("block in {}", self.ctx.scope_name),
            )
        };
        let id = self.reserve_body();
        let params = &literal.value.params;

        let ctx = self.child_context(env, kind);
        let body = self.with_context(ctx, |this| {
            this.lower_callable_body(params, &literal.value.body, literal.span)
        });

        let compiled = self.finish_body(
            id,
            name,
            kind,
            env,
            Arity::from_params(params),
            body,
            literal.span,
        );
        let break_id = compiled.break_id;
        self.module.add_body(compiled);
        Ok((IrNode::ProcLiteral { body: id, lambda }, break_id))
    }

    fn lower_module_body(
        &mut self,
        name: &Ident,
        superclass: Option<&Node<Expr>>,
        statements: &[Node<Expr>],
        is_module: bool,
        span: Span,
    ) -> LowerResult<IrNode> {
        let superclass = superclass.map(|s| self.lower_expr(s)).transpose()?;
        let kind = if is_module {
            BodyKind::ModuleBody
        } else {
            BodyKind::ClassBody
        };
        let id = self.reserve_body();
        let env = self.envs.new_root(kind);

        let ctx = BodyContext {
            env,
            kind,
            in_loop: false,
            in_next_expression: false,
            method: None,
            scope_name: name.name.clone(),
        };
        let body = self.with_context(ctx, |this| this.lower_statements(statements));

        let compiled = self.finish_body(id, name.name.clone(), kind, env, Arity::default(), body, span);
        self.module.add_body(compiled);
        Ok(IrNode::ModuleDefinition {
            name: name.name.clone(),
            superclass: superclass.map(Box::new),
            is_module,
            body: id,
        })
    }

    // ========================================================================
    // Statements and expressions
    // ========================================================================

    /// Lower a statement list. A statement that fails to lower is recorded
    /// and replaced by nil so the rest of the unit is still checked.
    fn lower_statements(&mut self, statements: &[Node<Expr>]) -> IrNode {
        let mut nodes = Vec::with_capacity(statements.len());
        for statement in statements {
            match self.lower_expr(statement) {
                Ok(node) => nodes.push(node),
                Err(err) => {
                    self.errors.push(err);
                    nodes.push(IrNode::Nil);
                }
            }
        }
        IrNode::sequence(nodes)
    }

    fn lower_expr(&mut self, expr: &Node<Expr>) -> LowerResult<IrNode> {
        let span = expr.span;
        match &expr.value {
            Expr::Nil => Ok(IrNode::Nil),
            Expr::True => Ok(IrNode::Boolean(true)),
            Expr::False => Ok(IrNode::Boolean(false)),
            Expr::Integer(value) => Ok(IrNode::Integer(*value)),
            Expr::Float(value) => Ok(IrNode::Float(*value)),
            Expr::Str(value) => Ok(IrNode::Str(value.clone())),
            Expr::Symbol(name) => Ok(IrNode::Symbol(name.clone())),
            Expr::SelfRef => Ok(IrNode::SelfValue),

            Expr::Array(items) => Ok(IrNode::ArrayLiteral(self.lower_args(items)?)),
            Expr::Hash(pairs) => {
                let mut lowered = Vec::with_capacity(pairs.len());
                for (key, value) in pairs {
                    lowered.push((self.lower_expr(key)?, self.lower_expr(value)?));
                }
                Ok(IrNode::HashLiteral(lowered))
            }
            Expr::Splat(inner) => Ok(IrNode::SplatCast {
                value: Box::new(self.lower_expr(inner)?),
                nil_policy: SplatNilPolicy::EmptyArray,
            }),

            Expr::LocalVar(name) => self.read_local(name.as_str(), span),
            Expr::VCall(name) => match self.envs.resolve(self.ctx.env, name.as_str()) {
                Some(local) => Ok(IrNode::ReadLocal(local)),
                None => Ok(IrNode::call(None, name.as_str(), Vec::new())),
            },
            Expr::InstanceVar(name) => Ok(IrNode::ReadInstanceVar(name.clone())),
            Expr::ClassVar(name) => Ok(IrNode::ReadClassVar(name.clone())),
            Expr::GlobalVar(name) => {
                if env::is_frame_local_global(name) {
                    Ok(IrNode::ReadLocal(self.envs.resolve_frame_global(self.ctx.env, name)))
                } else {
                    Ok(IrNode::ReadGlobal(name.clone()))
                }
            }
            Expr::Const(name) => Ok(IrNode::ReadConstant(name.name.clone())),

            Expr::Assign { target, value } => {
                let value = self.lower_expr(value)?;
                self.assign_target(target, value)
            }
            Expr::MultipleAssign { targets, value } => {
                self.lower_multiple_assignment(targets, value.as_deref(), span)
            }

            Expr::Call {
                receiver,
                method,
                args,
                block,
            } => self.lower_call(receiver.as_deref(), method.as_str(), args, block.as_deref()),
            Expr::Super { args, block } => {
                if self.ctx.method.is_none() {
                    return Err(self.error(LowerErrorKind::SuperOutsideMethod, span));
                }
                let args = self.lower_args(args)?;
                self.lower_super(args, block.as_deref())
            }
            Expr::ZSuper { block } => {
                let method = match &self.ctx.method {
                    Some(method) => Rc::clone(method),
                    None => return Err(self.error(LowerErrorKind::SuperOutsideMethod, span)),
                };
                let args = self.lower_replay(&method.params, span)?;
                self.lower_super(args, block.as_deref())
            }
            Expr::Yield(args) => {
                if self.ctx.method.is_none() {
                    return Err(self.error(LowerErrorKind::YieldOutsideMethod, span));
                }
                Ok(IrNode::Yield(self.lower_args(args)?))
            }

            Expr::Def(def) => self.lower_method(def, span),
            Expr::Lambda(literal) => Ok(self.lower_closure(literal, true)?.0),
            Expr::ClassDef {
                name,
                superclass,
                body,
            } => self.lower_module_body(name, superclass.as_deref(), body, false, span),
            Expr::ModuleDef { name, body } => self.lower_module_body(name, None, body, true, span),

            Expr::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = self.lower_expr(condition)?;
                let then_branch = self.lower_statements(then_branch);
                let else_branch = self.lower_statements(else_branch);
                Ok(IrNode::if_else(condition, then_branch, else_branch))
            }
            Expr::While {
                condition,
                body,
                do_while,
                until,
            } => self.lower_while(condition, body, *do_while, *until),
            Expr::For {
                target,
                iterable,
                body,
            } => self.lower_for(target, iterable, body, span),
            Expr::And(left, right) => Ok(IrNode::And(
                Box::new(self.lower_expr(left)?),
                Box::new(self.lower_expr(right)?),
            )),
            Expr::Or(left, right) => Ok(IrNode::Or(
                Box::new(self.lower_expr(left)?),
                Box::new(self.lower_expr(right)?),
            )),
            Expr::Not(inner) => Ok(IrNode::Not(Box::new(self.lower_expr(inner)?))),

            Expr::Break(value) => {
                let id = match self.envs.get(self.ctx.env).break_id {
                    Some(id) => id,
                    None => return Err(self.error(LowerErrorKind::InvalidBreak, span)),
                };
                let value = self.lower_optional(value.as_deref())?;
                Ok(IrNode::Break {
                    id,
                    value: Box::new(value),
                })
            }
            Expr::Next(value) => {
                self.require_block_or_loop(LowerErrorKind::InvalidNext, span)?;
                let saved = std::mem::replace(&mut self.ctx.in_next_expression, true);
                let value = self.lower_optional(value.as_deref());
                self.ctx.in_next_expression = saved;
                Ok(IrNode::Next(Box::new(value?)))
            }
            Expr::Redo => {
                self.require_block_or_loop(LowerErrorKind::InvalidRedo, span)?;
                Ok(IrNode::Redo)
            }
            Expr::Retry => {
                self.require_block_or_loop(LowerErrorKind::InvalidRetry, span)?;
                Ok(IrNode::Retry)
            }
            Expr::Return(value) => self.lower_return(value.as_deref(), span),
            Expr::Begin(statements) => Ok(self.lower_statements(statements)),
        }
    }

    fn lower_optional(&mut self, expr: Option<&Node<Expr>>) -> LowerResult<IrNode> {
        match expr {
            Some(expr) => self.lower_expr(expr),
            None => Ok(IrNode::Nil),
        }
    }

    /// Arguments and array elements; `*x` becomes a spread marker.
    fn lower_args(&mut self, args: &[Node<Expr>]) -> LowerResult<Vec<IrNode>> {
        let mut lowered = Vec::with_capacity(args.len());
        for arg in args {
            match &arg.value {
                Expr::Splat(inner) => lowered.push(IrNode::Splat(Box::new(self.lower_expr(inner)?))),
                _ => lowered.push(self.lower_expr(arg)?),
            }
        }
        Ok(lowered)
    }

    fn read_local(&mut self, name: &str, span: Span) -> LowerResult<IrNode> {
        if let Some(local) = self.envs.resolve(self.ctx.env, name) {
            return Ok(IrNode::ReadLocal(local));
        }
        if self.options.strict_unresolved_locals {
            return Err(self.error(
                LowerErrorKind::UnresolvedLocal {
                    name: name.to_string(),
                },
                span,
            ));
        }
        Ok(IrNode::ReadLocal(self.envs.resolve_for_assignment(self.ctx.env, name)))
    }

    /// Assign an already-lowered value to a target.
    fn assign_target(&mut self, target: &Node<AssignTarget>, value: IrNode) -> LowerResult<IrNode> {
        match &target.value {
            AssignTarget::Local(name) => {
                let local = self.envs.resolve_for_assignment(self.ctx.env, name.as_str());
                Ok(IrNode::write_local(local, value))
            }
            AssignTarget::InstanceVar(name) => Ok(IrNode::WriteInstanceVar {
                name: name.clone(),
                value: Box::new(value),
            }),
            AssignTarget::ClassVar(name) => Ok(IrNode::WriteClassVar {
                name: name.clone(),
                value: Box::new(value),
            }),
            AssignTarget::Global(name) => {
                if env::is_frame_local_global(name) {
                    let local = self.envs.resolve_frame_global(self.ctx.env, name);
                    Ok(IrNode::write_local(local, value))
                } else {
                    Ok(IrNode::WriteGlobal {
                        name: name.clone(),
                        value: Box::new(value),
                    })
                }
            }
            AssignTarget::Index { receiver, args } => {
                let receiver = self.lower_expr(receiver)?;
                let mut args = self.lower_args(args)?;
                args.push(value);
                Ok(IrNode::call(Some(receiver), "[]=", args))
            }
            AssignTarget::Attribute { receiver, name } => {
                let receiver = self.lower_expr(receiver)?;
                Ok(IrNode::call(Some(receiver), format!("{}=", name), vec![value]))
            }
            AssignTarget::Nested(targets) => self.destructure_value(targets, value),
        }
    }

    fn lower_call(
        &mut self,
        receiver: Option<&Node<Expr>>,
        method: &str,
        args: &[Node<Expr>],
        block: Option<&BlockArg>,
    ) -> LowerResult<IrNode> {
        let receiver = receiver.map(|r| self.lower_expr(r)).transpose()?;
        let args = self.lower_args(args)?;

        match block {
            None => Ok(IrNode::call(receiver, method, args)),
            Some(BlockArg::Pass(expr)) => {
                let block = self.lower_expr(expr)?;
                Ok(IrNode::Call {
                    receiver: receiver.map(Box::new),
                    method: method.to_string(),
                    args,
                    block: Some(Box::new(block)),
                })
            }
            Some(BlockArg::Literal(literal)) => {
                let (block, break_id) = self.lower_closure(literal, false)?;
                let call = IrNode::Call {
                    receiver: receiver.map(Box::new),
                    method: method.to_string(),
                    args,
                    block: Some(Box::new(block)),
                };
                Ok(catch_break(break_id, call))
            }
        }
    }

    fn lower_super(&mut self, args: Vec<IrNode>, block: Option<&BlockArg>) -> LowerResult<IrNode> {
        match block {
            None => Ok(IrNode::Super {
                args,
                block: None,
                forward_block: true,
            }),
            Some(BlockArg::Pass(expr)) => Ok(IrNode::Super {
                args,
                block: Some(Box::new(self.lower_expr(expr)?)),
                forward_block: false,
            }),
            Some(BlockArg::Literal(literal)) => {
                let (block, break_id) = self.lower_closure(literal, false)?;
                let call = IrNode::Super {
                    args,
                    block: Some(Box::new(block)),
                    forward_block: false,
                };
                Ok(catch_break(break_id, call))
            }
        }
    }

    fn lower_return(&mut self, value: Option<&Node<Expr>>, span: Span) -> LowerResult<IrNode> {
        let value = Box::new(self.lower_optional(value)?);
        let env = self.envs.get(self.ctx.env);
        if let Some(id) = env.return_id {
            return Ok(IrNode::Return { id, value });
        }
        // Class bodies have no return identity; inside a loop the exit
        // leaves the loop instead.
        if self.ctx.in_loop {
            if let Some(id) = env.break_id {
                return Ok(IrNode::Break { id, value });
            }
        }
        Err(self.error(LowerErrorKind::InvalidReturn, span))
    }

    fn lower_while(
        &mut self,
        condition: &Node<Expr>,
        body: &[Node<Expr>],
        do_while: bool,
        until: bool,
    ) -> LowerResult<IrNode> {
        let env = self.ctx.env;
        let id = self.envs.allocate_break_id();
        let saved_break = self.envs.get(env).break_id;
        self.envs.get_mut(env).break_id = Some(id);
        let saved_loop = std::mem::replace(&mut self.ctx.in_loop, true);

        let condition = self.lower_expr(condition);
        let body = self.lower_statements(body);

        self.ctx.in_loop = saved_loop;
        self.envs.get_mut(env).break_id = saved_break;

        let mut condition = condition?;
        if until {
            condition = IrNode::Not(Box::new(condition));
        }
        Ok(IrNode::While {
            condition: Box::new(condition),
            body: Box::new(body),
            do_while,
            break_id: id,
        })
    }

    /// `for target in iterable` becomes `iterable.each { |tmp| target = tmp; ... }`
    /// with a block that does not own its assignments, so the loop variable
    /// and body locals live in the enclosing scope.
    fn lower_for(
        &mut self,
        target: &Node<AssignTarget>,
        iterable: &Node<Expr>,
        statements: &[Node<Expr>],
        span: Span,
    ) -> LowerResult<IrNode> {
        let iterable = self.lower_expr(iterable)?;
        let env = self.envs.new_block(self.ctx.env, false);
        let id = self.reserve_body();
        let name = format!("block in {}", self.ctx.scope_name);

        let ctx = self.child_context(env, BodyKind::Block);
        let body = self.with_context(ctx, |this| {
            let param = this.envs.allocate_temp(env, "for");
            let bind = IrNode::write_local(
                param.clone(),
                IrNode::ReadPreArgument {
                    index: 0,
                    missing: crate::MissingArgumentBehavior::Nil,
                },
            );
            let assign = match this.assign_target(target, IrNode::ReadLocal(param)) {
                Ok(node) => node,
                Err(err) => {
                    this.errors.push(err);
                    IrNode::Nil
                }
            };
            let body = this.lower_statements(statements);
            IrNode::sequence(vec![bind, assign, body])
        });

        let arity = Arity {
            pre: 1,
            ..Arity::default()
        };
        let compiled = self.finish_body(id, name, BodyKind::Block, env, arity, body, span);
        let break_id = compiled.break_id;
        self.module.add_body(compiled);

        let call = IrNode::Call {
            receiver: Some(Box::new(iterable)),
            method: "each".to_string(),
            args: Vec::new(),
            block: Some(Box::new(IrNode::ProcLiteral {
                body: id,
                lambda: false,
            })),
        };
        Ok(catch_break(break_id, call))
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn error(&self, kind: LowerErrorKind, span: Span) -> LowerError {
        let span = Span {
            file_id: self.options.file_id,
            ..span
        };
        LowerError::new(kind, span)
    }

    fn require_block_or_loop(&self, kind: LowerErrorKind, span: Span) -> LowerResult<()> {
        if self.ctx.kind.is_closure() || self.ctx.in_loop {
            Ok(())
        } else {
            Err(self.error(kind, span))
        }
    }
}

impl Default for Lowerer {
    fn default() -> Self {
        Self::new()
    }
}

fn catch_break(id: Option<BreakId>, node: IrNode) -> IrNode {
    match id {
        Some(id) => IrNode::CatchBreak {
            id,
            body: Box::new(node),
        },
        None => node,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LocalKind, ReturnId};
    use garnet_ast::builder::*;

    fn lower(body: Vec<Node<Expr>>) -> IrModule {
        let result = Lowerer::new().lower_program(&program(body));
        match result {
            Ok(module) => module,
            Err(errors) => panic!("lowering failed: {:?}", errors),
        }
    }

    fn lower_errors(body: Vec<Node<Expr>>) -> Vec<LowerErrorKind> {
        match Lowerer::new().lower_program(&program(body)) {
            Ok(_) => panic!("expected lowering errors"),
            Err(errors) => errors.into_iter().map(|e| e.kind).collect(),
        }
    }

    fn body_named<'a>(module: &'a IrModule, name: &str) -> &'a CompiledBody {
        module
            .find_body(name)
            .unwrap_or_else(|| panic!("no body named {}", name))
    }

    #[test]
    fn test_lower_top_level_locals() {
        // a = 1; a
        let module = lower(vec![assign("a", int(1)), local("a")]);
        let main = module.body(module.main).expect("main body");

        assert_eq!(main.kind, BodyKind::TopLevel);
        assert_eq!(main.slot_names, vec!["a"]);
        assert_eq!(main.return_id, Some(ReturnId(0)));
        match &main.body {
            IrNode::Sequence(items) => {
                assert!(matches!(&items[0], IrNode::WriteLocal { target, .. } if target.level == 0));
                assert!(matches!(&items[1], IrNode::ReadLocal(local) if local.slot.0 == 0));
            }
            other => panic!("Expected sequence, got {:?}", other),
        }
    }

    #[test]
    fn test_vcall_becomes_call_when_undeclared() {
        let module = lower(vec![vcall("puts")]);
        let main = module.body(module.main).expect("main body");
        assert!(matches!(&main.body, IrNode::Call { method, receiver: None, .. } if method == "puts"));
    }

    #[test]
    fn test_unresolved_local_is_an_error() {
        let errors = lower_errors(vec![local("missing")]);
        assert_eq!(
            errors,
            vec![LowerErrorKind::UnresolvedLocal {
                name: "missing".to_string()
            }]
        );
    }

    #[test]
    fn test_lenient_unresolved_local_reads_nil_slot() {
        let module = Lowerer::new()
            .with_strict_unresolved_locals(false)
            .lower_program(&program(vec![local("missing")]))
            .expect("lenient lowering succeeds");
        let main = module.body(module.main).expect("main body");
        assert_eq!(main.slot_names, vec!["missing"]);
    }

    #[test]
    fn test_block_assignment_lands_in_method_scope() {
        // def m; [1].each { |x| total = x }; total; end
        let module = lower(vec![def(
            "m",
            Params::new(),
            vec![
                call_with_block(
                    Some(array(vec![int(1)])),
                    "each",
                    vec![],
                    block(Params::new().required("x"), vec![assign("total", local("x"))]),
                ),
                local("total"),
            ],
        )]);

        let method = body_named(&module, "m");
        let block = body_named(&module, "block in m");
        assert_eq!(method.slot_names, vec!["total"]);
        assert_eq!(block.slot_names, vec!["x"]);
        assert!(block.needs_captured_frame);
        assert!(!method.needs_captured_frame);
        assert_eq!(block.return_id, method.return_id);
        assert!(block.break_id.is_some());
    }

    #[test]
    fn test_block_call_catches_its_break() {
        let module = lower(vec![call_with_block(
            Some(array(vec![])),
            "each",
            vec![],
            block(Params::new(), vec![break_(Some(int(1)))]),
        )]);
        let main = module.body(module.main).expect("main body");
        let block = body_named(&module, "block in <main>");

        match &main.body {
            IrNode::CatchBreak { id, body } => {
                assert_eq!(Some(*id), block.break_id);
                assert!(matches!(body.as_ref(), IrNode::Call { method, .. } if method == "each"));
            }
            other => panic!("Expected catch-break, got {:?}", other),
        }
    }

    #[test]
    fn test_while_rebinds_break() {
        // while true; break; end
        let module = lower(vec![while_(true_(), vec![break_(None)])]);
        let main = module.body(module.main).expect("main body");
        match &main.body {
            IrNode::While { break_id, body, .. } => {
                assert!(matches!(body.as_ref(), IrNode::Break { id, .. } if id == break_id));
            }
            other => panic!("Expected while, got {:?}", other),
        }
        assert!(main.break_id.is_none());
    }

    #[test]
    fn test_break_outside_block_or_loop() {
        let errors = lower_errors(vec![break_(None)]);
        assert_eq!(errors, vec![LowerErrorKind::InvalidBreak]);
    }

    #[test]
    fn test_next_and_redo_outside_block_or_loop() {
        let errors = lower_errors(vec![def(
            "m",
            Params::new(),
            vec![next(None), node(Expr::Redo), node(Expr::Retry)],
        )]);
        assert_eq!(
            errors,
            vec![
                LowerErrorKind::InvalidNext,
                LowerErrorKind::InvalidRedo,
                LowerErrorKind::InvalidRetry,
            ]
        );
    }

    #[test]
    fn test_next_inside_block_is_valid() {
        let module = lower(vec![call_with_block(
            None,
            "loop",
            vec![],
            block(Params::new(), vec![next(Some(int(2)))]),
        )]);
        let block = body_named(&module, "block in <main>");
        assert!(matches!(&block.body, IrNode::Next(value) if **value == IrNode::Integer(2)));
    }

    #[test]
    fn test_return_in_block_targets_method() {
        let module = lower(vec![def(
            "m",
            Params::new(),
            vec![call_with_block(
                None,
                "tap",
                vec![],
                block(Params::new(), vec![return_(Some(int(1)))]),
            )],
        )]);
        let method = body_named(&module, "m");
        let block = body_named(&module, "block in m");
        match &block.body {
            IrNode::Return { id, .. } => assert_eq!(Some(*id), method.return_id),
            other => panic!("Expected return, got {:?}", other),
        }
    }

    #[test]
    fn test_return_in_class_body() {
        let errors = lower_errors(vec![class_def("Foo", None, vec![return_(None)])]);
        assert_eq!(errors, vec![LowerErrorKind::InvalidReturn]);

        // Inside a loop the return leaves the loop.
        let module = lower(vec![class_def(
            "Foo",
            None,
            vec![while_(true_(), vec![return_(None)])],
        )]);
        let class = body_named(&module, "Foo");
        match &class.body {
            IrNode::While { break_id, body, .. } => {
                assert!(matches!(body.as_ref(), IrNode::Break { id, .. } if id == break_id));
            }
            other => panic!("Expected while, got {:?}", other),
        }
    }

    #[test]
    fn test_lambda_owns_scope_and_identities() {
        // -> { y = 1 }
        let module = lower(vec![lambda(Params::new(), vec![assign("y", int(1))])]);
        let main = module.body(module.main).expect("main body");
        let lambda = body_named(&module, "<lambda>");

        assert!(main.slot_names.is_empty());
        assert_eq!(lambda.slot_names, vec!["y"]);
        assert_ne!(lambda.return_id, main.return_id);
        assert!(lambda.break_id.is_some());
        assert!(matches!(&main.body, IrNode::ProcLiteral { lambda: true, .. }));
    }

    #[test]
    fn test_methods_do_not_see_outer_locals() {
        let errors = lower_errors(vec![
            assign("x", int(1)),
            def("m", Params::new(), vec![local("x")]),
        ]);
        assert_eq!(
            errors,
            vec![LowerErrorKind::UnresolvedLocal {
                name: "x".to_string()
            }]
        );
    }

    #[test]
    fn test_capture_flags_by_depth() {
        // x = 1; each { each { each { x } } } with the reference at depth 0..=3
        for depth in 0..=3usize {
            let mut inner = vec![local("x")];
            for _ in 0..depth {
                inner = vec![call_with_block(None, "each", vec![], block(Params::new(), inner))];
            }
            let mut body = vec![assign("x", int(1))];
            body.extend(inner);

            let module = lower(body);
            let main = module.body(module.main).expect("main body");
            assert!(!main.needs_captured_frame);

            let blocks: Vec<&CompiledBody> = module
                .bodies
                .iter()
                .filter(|b| b.kind == BodyKind::Block)
                .collect();
            assert_eq!(blocks.len(), depth);
            for block in blocks {
                assert!(block.needs_captured_frame, "depth {} block {}", depth, block.id);
            }
        }
    }

    #[test]
    fn test_block_without_outer_reference_is_not_captured() {
        let module = lower(vec![
            assign("x", int(1)),
            call_with_block(
                None,
                "each",
                vec![],
                block(Params::new().required("y"), vec![local("y")]),
            ),
        ]);
        let block = body_named(&module, "block in <main>");
        assert!(!block.needs_captured_frame);
    }

    #[test]
    fn test_frame_local_global_in_block() {
        let module = lower(vec![def(
            "m",
            Params::new(),
            vec![call_with_block(None, "tap", vec![], block(Params::new(), vec![gvar("~")]))],
        )]);
        let method = body_named(&module, "m");
        let block = body_named(&module, "block in m");
        assert_eq!(method.slot_names, vec!["$~"]);
        match &block.body {
            IrNode::ReadLocal(local) => {
                assert_eq!(local.kind, LocalKind::FrameLocalGlobal);
                assert_eq!(local.level, 1);
            }
            other => panic!("Expected frame-local read, got {:?}", other),
        }
    }

    #[test]
    fn test_for_loop_variable_lives_outside() {
        // for i in [1, 2]; last = i; end
        let module = lower(vec![for_(
            target("i"),
            array(vec![int(1), int(2)]),
            vec![assign("last", local("i"))],
        )]);
        let main = module.body(module.main).expect("main body");
        assert_eq!(main.slot_names, vec!["i", "last"]);
        assert!(matches!(&main.body, IrNode::CatchBreak { .. }));
    }

    #[test]
    fn test_super_and_yield_need_a_method() {
        let errors = lower_errors(vec![zsuper(), yield_(vec![])]);
        assert_eq!(
            errors,
            vec![LowerErrorKind::SuperOutsideMethod, LowerErrorKind::YieldOutsideMethod]
        );
    }

    #[test]
    fn test_errors_do_not_stop_lowering() {
        let errors = lower_errors(vec![break_(None), int(1), local("nope")]);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_error_span_carries_file_id() {
        let result = Lowerer::new()
            .with_file_id(7)
            .lower_program(&program(vec![break_(None)]));
        let errors = result.expect_err("break at top level is invalid");
        assert_eq!(errors[0].span.file_id, 7);
    }
}
