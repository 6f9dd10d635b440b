//! Parameter lists for methods, blocks and lambdas

use super::*;

/// Parameter list in declaration order:
/// `pre, optional = default, *rest, post, key:, **keyword_rest, &block; block_locals`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    pub pre: Vec<Node<ParamPattern>>,
    pub optional: Vec<Node<OptionalParam>>,
    pub rest: Option<Node<RestParam>>,
    pub post: Vec<Node<ParamPattern>>,
    pub keywords: Vec<Node<KeywordParam>>,
    pub keyword_rest: Option<Node<RestParam>>,
    pub block: Option<Node<Ident>>,
    pub block_locals: Vec<Node<Ident>>,
}

/// Required positional parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamPattern {
    /// Plain name: `a`
    Required(Ident),

    /// Destructuring pattern: `(a, *b)`
    Destructure(MultipleAssignTargets),
}

/// Optional parameter: `name = default`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionalParam {
    pub name: Ident,
    pub default: Node<Expr>,
}

/// Rest or keyword-rest parameter; `None` for the anonymous `*` / `**` forms
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RestParam {
    #[serde(default)]
    pub name: Option<Ident>,
}

/// Keyword parameter; a missing default marks a required keyword
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordParam {
    pub name: Ident,
    #[serde(default)]
    pub default: Option<Node<Expr>>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pre.is_empty()
            && self.optional.is_empty()
            && self.rest.is_none()
            && self.post.is_empty()
            && self.keywords.is_empty()
            && self.keyword_rest.is_none()
            && self.block.is_none()
            && self.block_locals.is_empty()
    }

    pub fn has_keywords(&self) -> bool {
        !self.keywords.is_empty()
    }

    pub fn required(mut self, name: &str) -> Self {
        self.pre.push(Node::new(ParamPattern::Required(Ident::new(name)), Span::default()));
        self
    }

    pub fn destructure(mut self, targets: MultipleAssignTargets) -> Self {
        self.pre.push(Node::new(ParamPattern::Destructure(targets), Span::default()));
        self
    }

    pub fn optional(mut self, name: &str, default: Node<Expr>) -> Self {
        self.optional.push(Node::new(
            OptionalParam {
                name: Ident::new(name),
                default,
            },
            Span::default(),
        ));
        self
    }

    pub fn rest(mut self, name: &str) -> Self {
        self.rest = Some(Node::new(
            RestParam {
                name: Some(Ident::new(name)),
            },
            Span::default(),
        ));
        self
    }

    pub fn anonymous_rest(mut self) -> Self {
        self.rest = Some(Node::new(RestParam::default(), Span::default()));
        self
    }

    pub fn post(mut self, name: &str) -> Self {
        self.post.push(Node::new(ParamPattern::Required(Ident::new(name)), Span::default()));
        self
    }

    pub fn keyword(mut self, name: &str, default: Option<Node<Expr>>) -> Self {
        self.keywords.push(Node::new(
            KeywordParam {
                name: Ident::new(name),
                default,
            },
            Span::default(),
        ));
        self
    }

    pub fn keyword_rest(mut self, name: &str) -> Self {
        self.keyword_rest = Some(Node::new(
            RestParam {
                name: Some(Ident::new(name)),
            },
            Span::default(),
        ));
        self
    }

    pub fn block_param(mut self, name: &str) -> Self {
        self.block = Some(Node::new(Ident::new(name), Span::default()));
        self
    }

    pub fn block_local(mut self, name: &str) -> Self {
        self.block_locals.push(Node::new(Ident::new(name), Span::default()));
        self
    }
}
