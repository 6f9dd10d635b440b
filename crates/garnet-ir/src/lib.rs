//! Intermediate Representation (IR) for Garnet
//!
//! The IR is a tree of composable nodes. Every node executes against a frame
//! and either produces a value or propagates a non-local signal (break, next,
//! return, raise). Alongside the node trees, each compiled body carries the
//! scope metadata the engine needs: slot count, whether its frame must stay
//! reachable from closures, and the identities that match `return`/`break`
//! to the construct they target.
//!
//! The `lower` module turns a `garnet_ast::Program` into an [`IrModule`].

pub mod arity;
pub mod node;
pub mod body;
pub mod pretty;
pub mod lower;

// ============================================================================
// ID Types (using newtype pattern for type safety)
// ============================================================================

/// Index of a local-variable slot within one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub usize);

/// Identifier of a scope environment during lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvId(pub usize);

/// Identifier of a compiled body (method, block, lambda, class body, top level).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub usize);

/// Token matching a `return` to the method or lambda it leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReturnId(pub usize);

/// Token matching a `break` to the block or loop it leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BreakId(pub usize);

// ============================================================================
// Display Implementations for ID types
// ============================================================================

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "slot{}", self.0)
    }
}

impl std::fmt::Display for EnvId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "env{}", self.0)
    }
}

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "body{}", self.0)
    }
}

impl std::fmt::Display for ReturnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ret{}", self.0)
    }
}

impl std::fmt::Display for BreakId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "brk{}", self.0)
    }
}

// ============================================================================
// Re-exports (public API)
// ============================================================================

pub use arity::*;
pub use node::*;
pub use body::*;
pub use lower::{LowerError, LowerErrorKind, LowerOptions, Lowerer};

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        assert_eq!(SlotId(3).to_string(), "slot3");
        assert_eq!(EnvId(0).to_string(), "env0");
        assert_eq!(BodyId(7).to_string(), "body7");
        assert_eq!(ReturnId(1).to_string(), "ret1");
        assert_eq!(BreakId(2).to_string(), "brk2");
    }

    #[test]
    fn test_module_body_lookup() {
        let mut module = IrModule::new();
        let id = module.add_body(CompiledBody::new(
            BodyId(0),
            "main".to_string(),
            BodyKind::TopLevel,
        ));
        module.main = id;

        assert_eq!(module.body(id).map(|b| b.name.as_str()), Some("main"));
        assert!(module.body(BodyId(9)).is_none());
        assert_eq!(module.find_body("main").map(|b| b.id), Some(BodyId(0)));
    }

    #[test]
    fn test_sequence_flattens_and_elides() {
        let node = IrNode::sequence(vec![
            IrNode::ElidableResult {
                body: Box::new(IrNode::Integer(1)),
                result: Box::new(IrNode::Integer(2)),
            },
            IrNode::Sequence(vec![IrNode::Nil, IrNode::Integer(3)]),
        ]);

        match node {
            IrNode::Sequence(items) => {
                // The non-final elidable result keeps only its body.
                assert_eq!(items, vec![IrNode::Integer(1), IrNode::Nil, IrNode::Integer(3)]);
            }
            other => panic!("Expected sequence, got {:?}", other),
        }
    }

    #[test]
    fn test_sequence_of_one_is_unwrapped() {
        assert_eq!(IrNode::sequence(vec![IrNode::Integer(4)]), IrNode::Integer(4));
        assert_eq!(IrNode::sequence(vec![]), IrNode::Nil);
    }
}
