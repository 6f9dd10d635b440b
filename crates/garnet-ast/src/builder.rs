//! Span-free constructors for building trees in tests and tools.

use super::*;

pub fn node<T>(value: T) -> Node<T> {
    Node::new(value, Span::default())
}

pub fn program(body: Vec<Node<Expr>>) -> Program {
    Program::new(body)
}

pub fn nil() -> Node<Expr> {
    node(Expr::Nil)
}

pub fn true_() -> Node<Expr> {
    node(Expr::True)
}

pub fn false_() -> Node<Expr> {
    node(Expr::False)
}

pub fn int(value: i64) -> Node<Expr> {
    node(Expr::Integer(value))
}

pub fn string(value: &str) -> Node<Expr> {
    node(Expr::Str(value.to_string()))
}

pub fn sym(name: &str) -> Node<Expr> {
    node(Expr::Symbol(name.to_string()))
}

pub fn array(elements: Vec<Node<Expr>>) -> Node<Expr> {
    node(Expr::Array(elements))
}

pub fn hash(pairs: Vec<(Node<Expr>, Node<Expr>)>) -> Node<Expr> {
    node(Expr::Hash(pairs))
}

/// Keyword-argument carrier: `{ name: value, ... }` with symbol keys.
pub fn kwargs(pairs: Vec<(&str, Node<Expr>)>) -> Node<Expr> {
    hash(pairs.into_iter().map(|(k, v)| (sym(k), v)).collect())
}

pub fn splat(inner: Node<Expr>) -> Node<Expr> {
    node(Expr::Splat(Box::new(inner)))
}

pub fn self_ref() -> Node<Expr> {
    node(Expr::SelfRef)
}

pub fn local(name: &str) -> Node<Expr> {
    node(Expr::LocalVar(Ident::new(name)))
}

pub fn vcall(name: &str) -> Node<Expr> {
    node(Expr::VCall(Ident::new(name)))
}

pub fn ivar(name: &str) -> Node<Expr> {
    node(Expr::InstanceVar(name.to_string()))
}

pub fn gvar(name: &str) -> Node<Expr> {
    node(Expr::GlobalVar(name.to_string()))
}

pub fn constant(name: &str) -> Node<Expr> {
    node(Expr::Const(Ident::new(name)))
}

/// `name = value` for a local
pub fn assign(name: &str, value: Node<Expr>) -> Node<Expr> {
    assign_to(target(name), value)
}

pub fn assign_to(target: Node<AssignTarget>, value: Node<Expr>) -> Node<Expr> {
    node(Expr::Assign {
        target: Box::new(target),
        value: Box::new(value),
    })
}

/// Local assignment target
pub fn target(name: &str) -> Node<AssignTarget> {
    node(AssignTarget::Local(Ident::new(name)))
}

pub fn ivar_target(name: &str) -> Node<AssignTarget> {
    node(AssignTarget::InstanceVar(name.to_string()))
}

pub fn index_target(receiver: Node<Expr>, args: Vec<Node<Expr>>) -> Node<AssignTarget> {
    node(AssignTarget::Index {
        receiver: Box::new(receiver),
        args,
    })
}

pub fn nested_target(targets: MultipleAssignTargets) -> Node<AssignTarget> {
    node(AssignTarget::Nested(targets))
}

pub fn rest_target(name: &str) -> RestTarget {
    RestTarget::Named(Box::new(target(name)))
}

pub fn targets(
    pre: Vec<Node<AssignTarget>>,
    rest: Option<RestTarget>,
    post: Vec<Node<AssignTarget>>,
) -> MultipleAssignTargets {
    MultipleAssignTargets { pre, rest, post }
}

pub fn masgn(targets: MultipleAssignTargets, value: Node<Expr>) -> Node<Expr> {
    node(Expr::MultipleAssign {
        targets: Box::new(targets),
        value: Some(Box::new(value)),
    })
}

pub fn call(receiver: Node<Expr>, method: &str, args: Vec<Node<Expr>>) -> Node<Expr> {
    node(Expr::Call {
        receiver: Some(Box::new(receiver)),
        method: Ident::new(method),
        args,
        block: None,
    })
}

/// Call on implicit `self`
pub fn fcall(method: &str, args: Vec<Node<Expr>>) -> Node<Expr> {
    node(Expr::Call {
        receiver: None,
        method: Ident::new(method),
        args,
        block: None,
    })
}

pub fn call_with_block(
    receiver: Option<Node<Expr>>,
    method: &str,
    args: Vec<Node<Expr>>,
    block: Node<BlockLiteral>,
) -> Node<Expr> {
    node(Expr::Call {
        receiver: receiver.map(Box::new),
        method: Ident::new(method),
        args,
        block: Some(Box::new(BlockArg::Literal(block))),
    })
}

pub fn block(params: Params, body: Vec<Node<Expr>>) -> Node<BlockLiteral> {
    node(BlockLiteral { params, body })
}

pub fn lambda(params: Params, body: Vec<Node<Expr>>) -> Node<Expr> {
    node(Expr::Lambda(Box::new(block(params, body))))
}

pub fn def(name: &str, params: Params, body: Vec<Node<Expr>>) -> Node<Expr> {
    node(Expr::Def(Box::new(MethodDef {
        name: node(Ident::new(name)),
        params,
        body,
    })))
}

pub fn class_def(name: &str, superclass: Option<Node<Expr>>, body: Vec<Node<Expr>>) -> Node<Expr> {
    node(Expr::ClassDef {
        name: Ident::new(name),
        superclass: superclass.map(Box::new),
        body,
    })
}

pub fn zsuper() -> Node<Expr> {
    node(Expr::ZSuper { block: None })
}

pub fn super_call(args: Vec<Node<Expr>>) -> Node<Expr> {
    node(Expr::Super { args, block: None })
}

pub fn yield_(args: Vec<Node<Expr>>) -> Node<Expr> {
    node(Expr::Yield(args))
}

pub fn if_(condition: Node<Expr>, then_branch: Vec<Node<Expr>>, else_branch: Vec<Node<Expr>>) -> Node<Expr> {
    node(Expr::If {
        condition: Box::new(condition),
        then_branch,
        else_branch,
    })
}

pub fn while_(condition: Node<Expr>, body: Vec<Node<Expr>>) -> Node<Expr> {
    node(Expr::While {
        condition: Box::new(condition),
        body,
        do_while: false,
        until: false,
    })
}

pub fn for_(target: Node<AssignTarget>, iterable: Node<Expr>, body: Vec<Node<Expr>>) -> Node<Expr> {
    node(Expr::For {
        target: Box::new(target),
        iterable: Box::new(iterable),
        body,
    })
}

pub fn break_(value: Option<Node<Expr>>) -> Node<Expr> {
    node(Expr::Break(value.map(Box::new)))
}

pub fn next(value: Option<Node<Expr>>) -> Node<Expr> {
    node(Expr::Next(value.map(Box::new)))
}

pub fn return_(value: Option<Node<Expr>>) -> Node<Expr> {
    node(Expr::Return(value.map(Box::new)))
}

pub fn begin(body: Vec<Node<Expr>>) -> Node<Expr> {
    node(Expr::Begin(body))
}
