//! Expression definitions for the AST

use super::*;

/// Expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// `nil`
    Nil,

    /// `true`
    True,

    /// `false`
    False,

    /// Integer literal
    Integer(i64),

    /// Float literal
    Float(f64),

    /// String literal
    Str(String),

    /// Symbol literal: `:name`
    Symbol(String),

    /// Array literal: `[a, b, *c]`
    Array(Vec<Node<Expr>>),

    /// Hash literal: `{ k => v }`. Trailing keyword arguments of a call are
    /// passed as a hash literal in the last argument position.
    Hash(Vec<(Node<Expr>, Node<Expr>)>),

    /// Splat: `*expr` (in array literals and call arguments)
    Splat(Box<Node<Expr>>),

    /// `self`
    SelfRef,

    /// Reference to a local variable the parser knows is declared
    LocalVar(Ident),

    /// Bare identifier that is either a local variable or a zero-argument
    /// call on `self`; the parser could not tell which.
    VCall(Ident),

    /// `@name`
    InstanceVar(String),

    /// `@@name`
    ClassVar(String),

    /// `$name`
    GlobalVar(String),

    /// Constant reference: `Name`
    Const(Ident),

    /// Single assignment: `target = value`
    Assign {
        target: Box<Node<AssignTarget>>,
        value: Box<Node<Expr>>,
    },

    /// Multiple assignment: `a, *b, c = value`
    MultipleAssign {
        targets: Box<MultipleAssignTargets>,
        value: Option<Box<Node<Expr>>>,
    },

    /// Method call: `receiver.method(args) { block }`
    Call {
        receiver: Option<Box<Node<Expr>>>,
        method: Ident,
        #[serde(default)]
        args: Vec<Node<Expr>>,
        #[serde(default)]
        block: Option<Box<BlockArg>>,
    },

    /// `super(args)` with explicit arguments
    Super {
        #[serde(default)]
        args: Vec<Node<Expr>>,
        #[serde(default)]
        block: Option<Box<BlockArg>>,
    },

    /// Bare `super`: re-invokes the superclass method with the current
    /// values of this method's parameters.
    ZSuper {
        #[serde(default)]
        block: Option<Box<BlockArg>>,
    },

    /// `yield args`
    Yield(Vec<Node<Expr>>),

    /// Method definition: `def name(params) body end`
    Def(Box<MethodDef>),

    /// Lambda literal: `->(params) { body }`
    Lambda(Box<Node<BlockLiteral>>),

    /// Class body: `class Name < Super; body; end`
    ClassDef {
        name: Ident,
        #[serde(default)]
        superclass: Option<Box<Node<Expr>>>,
        body: Vec<Node<Expr>>,
    },

    /// Module body: `module Name; body; end`
    ModuleDef { name: Ident, body: Vec<Node<Expr>> },

    /// `if condition then ... else ... end`
    If {
        condition: Box<Node<Expr>>,
        then_branch: Vec<Node<Expr>>,
        #[serde(default)]
        else_branch: Vec<Node<Expr>>,
    },

    /// `while`/`until` loop; `do_while` evaluates the body before the first test
    While {
        condition: Box<Node<Expr>>,
        body: Vec<Node<Expr>>,
        #[serde(default)]
        do_while: bool,
        #[serde(default)]
        until: bool,
    },

    /// `for target in iterable; body; end`
    For {
        target: Box<Node<AssignTarget>>,
        iterable: Box<Node<Expr>>,
        body: Vec<Node<Expr>>,
    },

    /// `left && right`
    And(Box<Node<Expr>>, Box<Node<Expr>>),

    /// `left || right`
    Or(Box<Node<Expr>>, Box<Node<Expr>>),

    /// `!expr`
    Not(Box<Node<Expr>>),

    /// `break value`
    Break(Option<Box<Node<Expr>>>),

    /// `next value`
    Next(Option<Box<Node<Expr>>>),

    /// `redo`
    Redo,

    /// `retry`
    Retry,

    /// `return value`
    Return(Option<Box<Node<Expr>>>),

    /// `begin ... end` / statement sequence
    Begin(Vec<Node<Expr>>),
}

impl Expr {
    /// Returns the element list when this is a literal array without splats.
    pub fn as_fixed_array(&self) -> Option<&[Node<Expr>]> {
        match self {
            Expr::Array(elements)
                if elements.iter().all(|e| !matches!(e.value, Expr::Splat(_))) =>
            {
                Some(elements)
            }
            _ => None,
        }
    }

    /// Sub-expressions evaluated in the same scope as this one, in source
    /// order. Bodies of nested methods, blocks, lambdas, classes and modules
    /// are not included; a `for` body is, since it shares the loop's scope.
    pub fn scope_children(&self) -> Vec<&Node<Expr>> {
        let mut out: Vec<&Node<Expr>> = Vec::new();
        match self {
            Expr::Array(items) | Expr::Yield(items) | Expr::Begin(items) => out.extend(items),
            Expr::Hash(pairs) => {
                for (key, value) in pairs {
                    out.push(key);
                    out.push(value);
                }
            }
            Expr::Splat(inner) | Expr::Not(inner) => out.push(inner),
            Expr::Assign { target, value } => {
                target.value.push_scope_children(&mut out);
                out.push(value);
            }
            Expr::MultipleAssign { targets, value } => {
                targets.push_scope_children(&mut out);
                out.extend(value.as_deref());
            }
            Expr::Call {
                receiver,
                args,
                block,
                ..
            } => {
                out.extend(receiver.as_deref());
                out.extend(args);
                if let Some(BlockArg::Pass(expr)) = block.as_deref() {
                    out.push(expr);
                }
            }
            Expr::Super { args, block } => {
                out.extend(args);
                if let Some(BlockArg::Pass(expr)) = block.as_deref() {
                    out.push(expr);
                }
            }
            Expr::ZSuper { block } => {
                if let Some(BlockArg::Pass(expr)) = block.as_deref() {
                    out.push(expr);
                }
            }
            Expr::If {
                condition,
                then_branch,
                else_branch,
            } => {
                out.push(condition);
                out.extend(then_branch);
                out.extend(else_branch);
            }
            Expr::While { condition, body, .. } => {
                out.push(condition);
                out.extend(body);
            }
            Expr::For {
                target,
                iterable,
                body,
            } => {
                target.value.push_scope_children(&mut out);
                out.push(iterable);
                out.extend(body);
            }
            Expr::And(left, right) | Expr::Or(left, right) => {
                out.push(left);
                out.push(right);
            }
            Expr::Break(value) | Expr::Next(value) | Expr::Return(value) => {
                out.extend(value.as_deref());
            }
            Expr::ClassDef { superclass, .. } => out.extend(superclass.as_deref()),
            Expr::Nil
            | Expr::True
            | Expr::False
            | Expr::Integer(_)
            | Expr::Float(_)
            | Expr::Str(_)
            | Expr::Symbol(_)
            | Expr::SelfRef
            | Expr::LocalVar(_)
            | Expr::VCall(_)
            | Expr::InstanceVar(_)
            | Expr::ClassVar(_)
            | Expr::GlobalVar(_)
            | Expr::Const(_)
            | Expr::Def(_)
            | Expr::Lambda(_)
            | Expr::ModuleDef { .. }
            | Expr::Redo
            | Expr::Retry => {}
        }
        out
    }
}

/// Method definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: Node<Ident>,
    #[serde(default)]
    pub params: Params,
    pub body: Vec<Node<Expr>>,
}

/// Block literal `{ |params| body }`, also the payload of a lambda
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockLiteral {
    #[serde(default)]
    pub params: Params,
    pub body: Vec<Node<Expr>>,
}

/// Block passed to a call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlockArg {
    /// Literal block: `foo { |x| ... }`
    Literal(Node<BlockLiteral>),

    /// Block pass: `foo(&blk)`
    Pass(Node<Expr>),
}
