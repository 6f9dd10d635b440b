//! Activation frames.
//!
//! A frame holds the slot vector of one body invocation. Frames of bodies
//! that read outer locals keep a link to their defining frame; a local at
//! `(level, slot)` is found by following `level` parent links.

use std::cell::RefCell;
use std::rc::Rc;

use garnet_ir::{BodyId, LocalRef};

use crate::error::RuntimeError;
use crate::value::{Class, Value};

/// The method invocation a frame belongs to, shared by the blocks inside it.
pub struct MethodContext {
    pub name: String,
    /// Class the running method was found on; `super` searches above it
    pub owner: Rc<Class>,
    /// Block passed to the method, target of `yield`
    pub block: Option<Value>,
    pub arguments: Vec<Value>,
}

pub struct Frame {
    pub body: BodyId,
    pub self_value: Value,
    pub arguments: Vec<Value>,
    /// Block passed to this invocation
    pub block: Option<Value>,
    pub method: Option<Rc<MethodContext>>,
    /// Class that `def` adds methods to
    pub definee: Rc<Class>,
    pub parent: Option<Rc<Frame>>,
    slots: RefCell<Vec<Value>>,
}

impl Frame {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        body: BodyId,
        slot_count: usize,
        self_value: Value,
        arguments: Vec<Value>,
        block: Option<Value>,
        method: Option<Rc<MethodContext>>,
        definee: Rc<Class>,
        parent: Option<Rc<Frame>>,
    ) -> Self {
        Self {
            body,
            self_value,
            arguments,
            block,
            method,
            definee,
            parent,
            slots: RefCell::new(vec![Value::Nil; slot_count]),
        }
    }

    fn at_level(&self, local: &LocalRef) -> Result<&Frame, RuntimeError> {
        let mut frame = self;
        for _ in 0..local.level {
            frame = match &frame.parent {
                Some(parent) => parent,
                None => {
                    return Err(RuntimeError::UndefinedLocal {
                        name: local.name.clone(),
                    })
                }
            };
        }
        Ok(frame)
    }

    /// Read a local. An unassigned slot reads as nil.
    pub fn get(&self, local: &LocalRef) -> Result<Value, RuntimeError> {
        let frame = self.at_level(local)?;
        let slots = frame.slots.borrow();
        Ok(slots.get(local.slot.0).cloned().unwrap_or(Value::Nil))
    }

    pub fn set(&self, local: &LocalRef, value: Value) -> Result<(), RuntimeError> {
        let frame = self.at_level(local)?;
        let mut slots = frame.slots.borrow_mut();
        if local.slot.0 >= slots.len() {
            slots.resize(local.slot.0 + 1, Value::Nil);
        }
        slots[local.slot.0] = value;
        Ok(())
    }

    pub fn slot_count(&self) -> usize {
        self.slots.borrow().len()
    }
}
