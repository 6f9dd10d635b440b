//! # Garnet AST
//!
//! Syntax tree handed over by the parser. The lowering pass consumes these
//! trees read-only; every node kind that matters for scope resolution and
//! parameter binding has its own variant.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Core Types (kept in lib.rs - used by all modules)
// =============================================================================

/// Source location information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub file_id: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, file_id: usize) -> Self {
        Self { start, end, file_id }
    }

    pub fn merge(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            file_id: self.file_id,
        }
    }
}

/// AST node wrapper that includes span information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node<T> {
    #[serde(default)]
    pub span: Span,
    pub value: T,
}

impl<T> Node<T> {
    pub fn new(value: T, span: Span) -> Self {
        Self { span, value }
    }
}

/// Identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ident {
    pub name: String,
}

impl Ident {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

// =============================================================================
// Module Declarations
// =============================================================================

pub mod expr;
pub mod assign;
pub mod params;
pub mod program;
pub mod builder;

// =============================================================================
// Re-exports
// =============================================================================

pub use expr::*;
pub use assign::*;
pub use params::*;
pub use program::*;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::*;

    #[test]
    fn test_span_merge() {
        let a = Span::new(4, 9, 0);
        let b = Span::new(1, 6, 0);
        assert_eq!(a.merge(&b), Span::new(1, 9, 0));
    }

    #[test]
    fn test_ident_display() {
        let ident = Ident::new("counter");
        assert_eq!(format!("{}", ident), "counter");
        assert_eq!(ident.as_str(), "counter");
    }

    #[test]
    fn test_multiple_assign_shape() {
        // a, *b, c = xs
        let expr = masgn(
            targets(vec![target("a")], Some(rest_target("b")), vec![target("c")]),
            local("xs"),
        );

        if let Expr::MultipleAssign { targets, value } = &expr.value {
            assert_eq!(targets.pre.len(), 1);
            assert!(matches!(targets.rest, Some(RestTarget::Named(_))));
            assert_eq!(targets.post.len(), 1);
            assert!(value.is_some());
        } else {
            panic!("Expected multiple assignment");
        }
    }

    #[test]
    fn test_nested_pattern_with_rest() {
        // a, (b, *c) = xs
        let inner = targets(vec![target("b")], Some(rest_target("c")), vec![]);
        let outer = targets(vec![target("a"), nested_target(inner)], None, vec![]);

        let collected: Vec<_> = outer.all_targets().collect();
        assert_eq!(collected.len(), 2);
        match &collected[1].value {
            AssignTarget::Nested(inner) => {
                let names: Vec<_> = inner
                    .all_targets()
                    .filter_map(|t| match &t.value {
                        AssignTarget::Local(name) => Some(name.as_str()),
                        _ => None,
                    })
                    .collect();
                assert_eq!(names, vec!["b", "c"]);
            }
            other => panic!("Expected nested target, got {:?}", other),
        }

        let json = r#"{
            "pre": [ { "value": { "Nested": {
                "pre": [],
                "rest": { "Named": { "value": { "Local": "d" } } },
                "post": []
            } } } ]
        }"#;
        let parsed: MultipleAssignTargets = serde_json::from_str(json).expect("valid targets");
        match &parsed.pre[0].value {
            AssignTarget::Nested(inner) => match &inner.rest {
                Some(RestTarget::Named(rest)) => {
                    assert_eq!(rest.value, AssignTarget::Local(Ident::new("d")))
                }
                other => panic!("Expected named rest, got {:?}", other),
            },
            other => panic!("Expected nested target, got {:?}", other),
        }
    }

    #[test]
    fn test_program_from_json() {
        // The parser hands trees over as JSON; spans may be omitted.
        let json = r#"{
            "body": [
                { "value": { "Assign": {
                    "target": { "value": { "Local": "a" } },
                    "value": { "value": { "Integer": 1 } }
                } } },
                { "value": { "LocalVar": "a" } }
            ]
        }"#;

        let program: Program = serde_json::from_str(json).expect("valid program json");
        assert_eq!(program.body.len(), 2);
        assert!(matches!(program.body[1].value, Expr::LocalVar(ref id) if id.name == "a"));
    }
}
