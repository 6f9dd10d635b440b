//! Scope environments.
//!
//! Every method, block, lambda, class body and the top level gets one
//! `Environment`. All environments of a compilation unit live in one
//! `EnvArena`; parent links are arena indices. Slots are append-only, so a
//! resolution computed earlier is never invalidated by a later declaration.

use indexmap::IndexSet;
use tracing::{debug, trace};

use crate::{BodyKind, BreakId, EnvId, LocalKind, LocalRef, ReturnId, SlotId};

/// Pseudo-globals that are stored in a frame slot rather than globally.
pub const FRAME_LOCAL_GLOBALS: &[&str] = &["~", "_"];

/// Slot name for a frame-local pseudo-global (`$~` -> `"$~"`).
pub fn frame_global_slot_name(name: &str) -> String {
    format!("${}", name)
}

pub fn is_frame_local_global(name: &str) -> bool {
    FRAME_LOCAL_GLOBALS.contains(&name)
}

/// Compile-time record of one lexical scope.
#[derive(Debug, Clone)]
pub struct Environment {
    pub id: EnvId,
    /// Lexical parent used for lookups; `None` for lookup roots
    pub parent: Option<EnvId>,
    pub kind: BodyKind,
    slots: IndexSet<String>,
    /// First assignment to an unknown name declares the slot here
    pub owns_assignment_scope: bool,
    /// Assignments always declare here, even if an ancestor has the name
    pub never_assign_in_parent_scope: bool,
    pub block_depth: usize,
    pub return_id: Option<ReturnId>,
    /// Current `break` target; rebound while a loop body is lowered
    pub break_id: Option<BreakId>,
    /// A closure reaches through this scope's frame to an outer local
    pub needs_captured_frame: bool,
}

impl Environment {
    pub fn is_block(&self) -> bool {
        self.kind == BodyKind::Block
    }

    pub fn slot(&self, name: &str) -> Option<SlotId> {
        self.slots.get_index_of(name).map(SlotId)
    }

    pub fn slot_names(&self) -> Vec<String> {
        self.slots.iter().cloned().collect()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

/// Outcome of a pure lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub level: usize,
    pub env: EnvId,
    pub slot: SlotId,
}

/// Owner of every environment of one compilation unit.
#[derive(Debug, Default)]
pub struct EnvArena {
    envs: Vec<Environment>,
    next_return_id: usize,
    next_break_id: usize,
    next_temp: usize,
}

impl EnvArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: EnvId) -> &Environment {
        &self.envs[id.0]
    }

    pub fn get_mut(&mut self, id: EnvId) -> &mut Environment {
        &mut self.envs[id.0]
    }

    pub fn len(&self) -> usize {
        self.envs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envs.is_empty()
    }

    pub fn allocate_return_id(&mut self) -> ReturnId {
        let id = ReturnId(self.next_return_id);
        self.next_return_id += 1;
        id
    }

    pub fn allocate_break_id(&mut self) -> BreakId {
        let id = BreakId(self.next_break_id);
        self.next_break_id += 1;
        id
    }

    fn push(&mut self, env: Environment) -> EnvId {
        let id = env.id;
        debug!(
            env = %id,
            kind = ?env.kind,
            parent = ?env.parent.map(|p| p.0),
            depth = env.block_depth,
            "new environment"
        );
        self.envs.push(env);
        id
    }

    /// Lookup root: top level, method, class or module body. Top level and
    /// methods get a fresh return identity; class and module bodies get none.
    pub fn new_root(&mut self, kind: BodyKind) -> EnvId {
        let return_id = match kind {
            BodyKind::TopLevel | BodyKind::Method => Some(self.allocate_return_id()),
            _ => None,
        };
        let id = EnvId(self.envs.len());
        self.push(Environment {
            id,
            parent: None,
            kind,
            slots: IndexSet::new(),
            owns_assignment_scope: true,
            never_assign_in_parent_scope: true,
            block_depth: 0,
            return_id,
            break_id: None,
            needs_captured_frame: false,
        })
    }

    /// Block literal: inherits the return identity of its parent, gets a
    /// fresh break identity.
    pub fn new_block(&mut self, parent: EnvId, owns_assignment_scope: bool) -> EnvId {
        let (return_id, depth) = {
            let p = self.get(parent);
            (p.return_id, p.block_depth + 1)
        };
        let break_id = self.allocate_break_id();
        let id = EnvId(self.envs.len());
        self.push(Environment {
            id,
            parent: Some(parent),
            kind: BodyKind::Block,
            slots: IndexSet::new(),
            owns_assignment_scope,
            never_assign_in_parent_scope: false,
            block_depth: depth,
            return_id,
            break_id: Some(break_id),
            needs_captured_frame: false,
        })
    }

    /// Lambda literal: own assignment scope, fresh return and break identities.
    pub fn new_lambda(&mut self, parent: EnvId) -> EnvId {
        let depth = self.get(parent).block_depth + 1;
        let return_id = self.allocate_return_id();
        let break_id = self.allocate_break_id();
        let id = EnvId(self.envs.len());
        self.push(Environment {
            id,
            parent: Some(parent),
            kind: BodyKind::Lambda,
            slots: IndexSet::new(),
            owns_assignment_scope: true,
            never_assign_in_parent_scope: false,
            block_depth: depth,
            return_id: Some(return_id),
            break_id: Some(break_id),
            needs_captured_frame: false,
        })
    }

    /// Find-or-add a slot in exactly `env`.
    pub fn declare(&mut self, env: EnvId, name: &str) -> SlotId {
        let (index, added) = self.get_mut(env).slots.insert_full(name.to_string());
        if added {
            trace!(env = %env, name, slot = index, "declare");
        }
        SlotId(index)
    }

    /// Fresh hidden slot in `env`. The name cannot collide with a source
    /// identifier.
    pub fn allocate_temp(&mut self, env: EnvId, prefix: &str) -> LocalRef {
        let name = format!("%{}_{}", prefix, self.next_temp);
        self.next_temp += 1;
        let slot = self.declare(env, &name);
        LocalRef::new(0, slot, LocalKind::Local, name)
    }

    /// Walk outward from `from` without side effects.
    pub fn lookup(&self, from: EnvId, name: &str) -> Option<Resolution> {
        let mut current = Some(from);
        let mut level = 0;
        while let Some(id) = current {
            let env = self.get(id);
            if let Some(slot) = env.slot(name) {
                return Some(Resolution { level, env: id, slot });
            }
            current = env.parent;
            level += 1;
        }
        None
    }

    /// Resolve `name` from `from`. When the definition is `level` scopes up,
    /// every scope from `from` up to (not including) the defining one is
    /// flagged as needing a captured frame.
    pub fn resolve(&mut self, from: EnvId, name: &str) -> Option<LocalRef> {
        let resolution = self.lookup(from, name)?;

        let mut current = from;
        for _ in 0..resolution.level {
            let env = self.get_mut(current);
            if !env.needs_captured_frame {
                trace!(env = %current, name, "needs captured frame");
                env.needs_captured_frame = true;
            }
            match env.parent {
                Some(parent) => current = parent,
                None => break,
            }
        }

        let kind = if name.starts_with('$') {
            LocalKind::FrameLocalGlobal
        } else {
            LocalKind::Local
        };
        Some(LocalRef::new(resolution.level, resolution.slot, kind, name))
    }

    /// Where the first assignment to an unknown name from `from` declares it.
    pub fn declaration_target(&self, from: EnvId) -> EnvId {
        let mut current = from;
        loop {
            let env = self.get(current);
            if env.never_assign_in_parent_scope || env.owns_assignment_scope {
                return current;
            }
            match env.parent {
                Some(parent) => current = parent,
                None => return current,
            }
        }
    }

    /// Resolve the target of an assignment, declaring it if needed.
    pub fn resolve_for_assignment(&mut self, from: EnvId, name: &str) -> LocalRef {
        if self.get(from).never_assign_in_parent_scope {
            self.declare(from, name);
        }
        if self.lookup(from, name).is_none() {
            let target = self.declaration_target(from);
            self.declare(target, name);
        }
        match self.resolve(from, name) {
            Some(local) => local,
            // The name was declared on the chain just above.
            None => LocalRef::new(0, self.declare(from, name), LocalKind::Local, name),
        }
    }

    /// Nearest enclosing scope that is not a plain block.
    pub fn nearest_non_block(&self, from: EnvId) -> EnvId {
        let mut current = from;
        while self.get(current).is_block() {
            match self.get(current).parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        current
    }

    /// Resolve a frame-local pseudo-global such as `$~`, declaring it in the
    /// nearest non-block scope on first use.
    pub fn resolve_frame_global(&mut self, from: EnvId, name: &str) -> LocalRef {
        let slot_name = frame_global_slot_name(name);
        if self.lookup(from, &slot_name).is_none() {
            let home = self.nearest_non_block(from);
            self.declare(home, &slot_name);
        }
        match self.resolve(from, &slot_name) {
            Some(local) => local,
            None => LocalRef::new(
                0,
                self.declare(from, &slot_name),
                LocalKind::FrameLocalGlobal,
                slot_name,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_is_append_only() {
        let mut arena = EnvArena::new();
        let root = arena.new_root(BodyKind::Method);
        assert_eq!(arena.declare(root, "a"), SlotId(0));
        assert_eq!(arena.declare(root, "b"), SlotId(1));
        assert_eq!(arena.declare(root, "a"), SlotId(0));
        assert_eq!(arena.get(root).slot_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_lookup_counts_levels_without_marking() {
        let mut arena = EnvArena::new();
        let root = arena.new_root(BodyKind::Method);
        let outer = arena.new_block(root, false);
        let inner = arena.new_block(outer, false);
        arena.declare(root, "x");

        let found = arena.lookup(inner, "x").expect("x is declared");
        assert_eq!(found.level, 2);
        assert_eq!(found.env, root);
        assert!(!arena.get(inner).needs_captured_frame);
        assert!(!arena.get(outer).needs_captured_frame);
    }

    #[test]
    fn test_resolve_marks_scopes_between_use_and_definition() {
        let mut arena = EnvArena::new();
        let root = arena.new_root(BodyKind::Method);
        let outer = arena.new_block(root, false);
        let inner = arena.new_block(outer, false);
        arena.declare(root, "x");
        arena.declare(outer, "y");

        let y = arena.resolve(inner, "y").expect("y is declared");
        assert_eq!(y.level, 1);
        assert!(arena.get(inner).needs_captured_frame);
        assert!(!arena.get(outer).needs_captured_frame);

        let x = arena.resolve(inner, "x").expect("x is declared");
        assert_eq!(x.level, 2);
        assert!(arena.get(outer).needs_captured_frame);
        assert!(!arena.get(root).needs_captured_frame);
    }

    #[test]
    fn test_unknown_name_does_not_resolve() {
        let mut arena = EnvArena::new();
        let root = arena.new_root(BodyKind::TopLevel);
        assert!(arena.resolve(root, "nope").is_none());
    }

    #[test]
    fn test_block_assignment_declares_in_owning_scope() {
        let mut arena = EnvArena::new();
        let root = arena.new_root(BodyKind::Method);
        let block = arena.new_block(root, false);

        let local = arena.resolve_for_assignment(block, "total");
        assert_eq!(local.level, 1);
        assert_eq!(arena.get(root).slot("total"), Some(SlotId(0)));
        assert_eq!(arena.get(block).slot("total"), None);
    }

    #[test]
    fn test_block_parameter_shadows_outer_name() {
        let mut arena = EnvArena::new();
        let root = arena.new_root(BodyKind::Method);
        arena.declare(root, "x");
        let block = arena.new_block(root, false);
        arena.declare(block, "x");

        let local = arena.resolve_for_assignment(block, "x");
        assert_eq!(local.level, 0);
        assert!(!arena.get(block).needs_captured_frame);
    }

    #[test]
    fn test_lambda_owns_its_assignments() {
        let mut arena = EnvArena::new();
        let root = arena.new_root(BodyKind::Method);
        let lambda = arena.new_lambda(root);

        let local = arena.resolve_for_assignment(lambda, "tmp");
        assert_eq!(local.level, 0);
        assert_eq!(arena.get(root).slot("tmp"), None);
    }

    #[test]
    fn test_identities() {
        let mut arena = EnvArena::new();
        let method = arena.new_root(BodyKind::Method);
        let block = arena.new_block(method, false);
        let nested = arena.new_block(block, false);
        let lambda = arena.new_lambda(block);
        let class = arena.new_root(BodyKind::ClassBody);

        let method_return = arena.get(method).return_id;
        assert!(method_return.is_some());
        assert_eq!(arena.get(block).return_id, method_return);
        assert_eq!(arena.get(nested).return_id, method_return);
        assert_ne!(arena.get(lambda).return_id, method_return);
        assert_ne!(arena.get(block).break_id, arena.get(nested).break_id);
        assert!(arena.get(method).break_id.is_none());
        assert!(arena.get(class).return_id.is_none());
        assert_eq!(arena.get(nested).block_depth, 2);
    }

    #[test]
    fn test_frame_global_lives_in_nearest_non_block() {
        let mut arena = EnvArena::new();
        let method = arena.new_root(BodyKind::Method);
        let block = arena.new_block(method, true);

        let local = arena.resolve_frame_global(block, "~");
        assert_eq!(local.kind, LocalKind::FrameLocalGlobal);
        assert_eq!(local.level, 1);
        assert!(arena.get(method).slot("$~").is_some());
        assert!(arena.get(block).slot("$~").is_none());
    }

    #[test]
    fn test_temps_are_hidden_and_unique() {
        let mut arena = EnvArena::new();
        let root = arena.new_root(BodyKind::TopLevel);
        let a = arena.allocate_temp(root, "rhs");
        let b = arena.allocate_temp(root, "rhs");
        assert_ne!(a.slot, b.slot);
        assert!(a.name.starts_with('%'));
    }
}
