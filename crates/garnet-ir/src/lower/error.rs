//! Lowering errors

use garnet_ast::Span;
use thiserror::Error;

pub type LowerResult<T> = Result<T, LowerError>;

/// What went wrong while lowering a construct
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LowerErrorKind {
    #[error("Invalid break (not in a block or loop)")]
    InvalidBreak,

    #[error("Invalid next (not in a block or loop)")]
    InvalidNext,

    #[error("Invalid redo (not in a block or loop)")]
    InvalidRedo,

    #[error("Invalid retry (not in a block or loop)")]
    InvalidRetry,

    #[error("Invalid return (no enclosing method, lambda or loop)")]
    InvalidReturn,

    #[error("Undefined local variable: {name}")]
    UnresolvedLocal { name: String },

    #[error("super called outside of a method")]
    SuperOutsideMethod,

    #[error("Implicit super cannot forward {what} parameters")]
    UnsupportedReplay { what: String },

    #[error("Default value of `{parameter}` refers to later parameter `{name}`")]
    ForwardParameterReference { parameter: String, name: String },

    #[error("Yield outside of a method body")]
    YieldOutsideMethod,
}

/// Error produced during lowering, with the span of the offending construct.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Lower error: {kind}")]
pub struct LowerError {
    pub kind: LowerErrorKind,
    pub span: Span,
}

impl LowerError {
    pub fn new(kind: LowerErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Message without the `Lower error:` prefix, for report labels.
    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LowerError::new(
            LowerErrorKind::UnresolvedLocal { name: "x".to_string() },
            Span::new(3, 4, 0),
        );
        assert_eq!(err.to_string(), "Lower error: Undefined local variable: x");
        assert_eq!(err.message(), "Undefined local variable: x");
    }
}
