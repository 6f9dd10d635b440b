//! Compilation unit

use super::*;

/// A whole source file: a sequence of top-level expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub body: Vec<Node<Expr>>,
    #[serde(default)]
    pub span: Span,
}

impl Program {
    pub fn new(body: Vec<Node<Expr>>) -> Self {
        Self {
            body,
            span: Span::default(),
        }
    }
}
