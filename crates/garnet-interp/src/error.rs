//! Runtime errors and non-local exits

use garnet_ir::{BreakId, ReturnId};
use thiserror::Error;

use crate::value::Value;

/// Error raised while executing IR
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("ArgumentError: {0}")]
    ArgumentError(String),

    #[error("ArgumentError: missing keyword: :{0}")]
    MissingKeyword(String),

    #[error("NoMethodError: undefined method `{method}' for {receiver}")]
    NoMethod { method: String, receiver: String },

    #[error("TypeError: {0}")]
    TypeError(String),

    #[error("NameError: uninitialized constant {0}")]
    NameError(String),

    #[error("ZeroDivisionError: divided by 0")]
    ZeroDivision,

    #[error("RangeError: {0}")]
    Range(String),

    #[error("LocalJumpError: {0}")]
    LocalJump(String),

    #[error("undefined local variable `{name}' (no captured frame)")]
    UndefinedLocal { name: String },

    #[error("SystemStackError: stack level too deep")]
    StackOverflow,
}

/// Why evaluation of a node stopped early.
#[derive(Debug, Clone)]
pub enum Unwind {
    Break { id: BreakId, value: Value },
    Next(Value),
    Redo,
    Retry,
    Return { id: ReturnId, value: Value },
    Raise(RuntimeError),
}

impl From<RuntimeError> for Unwind {
    fn from(error: RuntimeError) -> Self {
        Unwind::Raise(error)
    }
}

impl Unwind {
    /// The error reported when this exit escapes every construct that could
    /// have caught it.
    pub fn into_error(self) -> RuntimeError {
        match self {
            Unwind::Raise(error) => error,
            Unwind::Break { .. } => RuntimeError::LocalJump("break from proc-closure".to_string()),
            Unwind::Next(_) => RuntimeError::LocalJump("unexpected next".to_string()),
            Unwind::Redo => RuntimeError::LocalJump("unexpected redo".to_string()),
            Unwind::Retry => RuntimeError::LocalJump("retry outside of rescue clause".to_string()),
            Unwind::Return { .. } => RuntimeError::LocalJump("unexpected return".to_string()),
        }
    }
}

/// Result of evaluating a node
pub type Eval<T> = Result<T, Unwind>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RuntimeError::NoMethod {
            method: "frob".to_string(),
            receiver: "Integer".to_string(),
        };
        assert_eq!(err.to_string(), "NoMethodError: undefined method `frob' for Integer");
        assert_eq!(
            RuntimeError::MissingKeyword("k".to_string()).to_string(),
            "ArgumentError: missing keyword: :k"
        );
    }

    #[test]
    fn test_escaped_exits_become_local_jumps() {
        let escaped = Unwind::Break {
            id: BreakId(0),
            value: Value::Nil,
        };
        assert!(matches!(escaped.into_error(), RuntimeError::LocalJump(_)));

        let raised: Unwind = RuntimeError::TypeError("bad".to_string()).into();
        assert_eq!(raised.into_error(), RuntimeError::TypeError("bad".to_string()));
    }
}
