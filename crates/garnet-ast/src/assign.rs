//! Assignment targets, including destructuring patterns

use super::*;

/// Assignable location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AssignTarget {
    /// Local variable
    Local(Ident),

    /// `@name`
    InstanceVar(String),

    /// `@@name`
    ClassVar(String),

    /// `$name`
    Global(String),

    /// Indexed write: `receiver[args] = value`
    Index {
        receiver: Box<Node<Expr>>,
        args: Vec<Node<Expr>>,
    },

    /// Attribute write: `receiver.name = value`
    Attribute {
        receiver: Box<Node<Expr>>,
        name: Ident,
    },

    /// Nested destructuring: `a, (b, c) = ...`
    Nested(MultipleAssignTargets),
}

impl AssignTarget {
    /// Receiver and index expressions evaluated when assigning to this target.
    pub fn push_scope_children<'a>(&'a self, out: &mut Vec<&'a Node<Expr>>) {
        match self {
            AssignTarget::Index { receiver, args } => {
                out.push(receiver);
                out.extend(args);
            }
            AssignTarget::Attribute { receiver, .. } => out.push(receiver),
            AssignTarget::Nested(targets) => targets.push_scope_children(out),
            AssignTarget::Local(_)
            | AssignTarget::InstanceVar(_)
            | AssignTarget::ClassVar(_)
            | AssignTarget::Global(_) => {}
        }
    }
}

/// Left-hand side of a multiple assignment: `pre, *rest, post`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MultipleAssignTargets {
    #[serde(default)]
    pub pre: Vec<Node<AssignTarget>>,
    #[serde(default)]
    pub rest: Option<RestTarget>,
    #[serde(default)]
    pub post: Vec<Node<AssignTarget>>,
}

impl MultipleAssignTargets {
    pub fn pre_count(&self) -> usize {
        self.pre.len()
    }

    pub fn post_count(&self) -> usize {
        self.post.len()
    }

    /// Every target in source order, rest included when it names a location.
    pub fn all_targets(&self) -> impl Iterator<Item = &Node<AssignTarget>> {
        let rest = match &self.rest {
            Some(RestTarget::Named(target)) => Some(target.as_ref()),
            _ => None,
        };
        self.pre.iter().chain(rest).chain(self.post.iter())
    }

    pub fn push_scope_children<'a>(&'a self, out: &mut Vec<&'a Node<Expr>>) {
        for target in self.all_targets() {
            target.value.push_scope_children(out);
        }
    }
}

/// Rest position of a multiple assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RestTarget {
    /// `*name`
    Named(Box<Node<AssignTarget>>),

    /// Bare `*`
    Anonymous,
}
