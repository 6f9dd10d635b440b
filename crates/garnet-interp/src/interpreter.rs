//! Interpreter state and body invocation.

use std::rc::Rc;

use garnet_ir::{BodyId, BodyKind, CompiledBody, IrModule};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::error::{Eval, RuntimeError, Unwind};
use crate::frame::{Frame, MethodContext};
use crate::value::{Class, Object, ProcValue, Value};

/// Nesting of method and block invocations allowed by default. Sized for the
/// 2 MiB stack spawned threads get; callers on a larger stack raise it with
/// [`Interpreter::with_max_depth`].
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Tree-walking engine for an [`IrModule`].
pub struct Interpreter<'m> {
    pub(crate) module: &'m IrModule,
    pub(crate) object_class: Rc<Class>,
    main_object: Value,
    pub(crate) constants: FxHashMap<String, Value>,
    pub(crate) globals: FxHashMap<String, Value>,
    pub(crate) output: String,
    depth: usize,
    max_depth: usize,
}

impl<'m> Interpreter<'m> {
    pub fn new(module: &'m IrModule) -> Self {
        let object_class = Rc::new(Class::new("Object", None, false));
        let main_object = Value::Object(Rc::new(Object::new(Rc::clone(&object_class))));
        let mut constants = FxHashMap::default();
        constants.insert("Object".to_string(), Value::Class(Rc::clone(&object_class)));

        Self {
            module,
            object_class,
            main_object,
            constants,
            globals: FxHashMap::default(),
            output: String::new(),
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Raise `StackOverflow` once invocations nest deeper than `max_depth`.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Run the module's main body.
    pub fn run(&mut self) -> Result<Value, RuntimeError> {
        let body = self.body(self.module.main)?;
        let frame = Rc::new(Frame::new(
            body.id,
            body.slot_count(),
            self.main_object.clone(),
            Vec::new(),
            None,
            None,
            Rc::clone(&self.object_class),
            None,
        ));

        match self.eval(&body.body, &frame) {
            Ok(value) => Ok(value),
            Err(Unwind::Return { id, value }) if Some(id) == body.return_id => Ok(value),
            Err(unwind) => Err(unwind.into_error()),
        }
    }

    /// Text written by `puts`, `print` and `p`.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).cloned()
    }

    pub fn constant(&self, name: &str) -> Option<Value> {
        self.constants.get(name).cloned()
    }

    pub(crate) fn body(&self, id: BodyId) -> Result<&'m CompiledBody, RuntimeError> {
        self.module
            .body(id)
            .ok_or_else(|| RuntimeError::TypeError(format!("unknown body {}", id)))
    }

    fn enter(&mut self) -> Eval<()> {
        if self.depth >= self.max_depth {
            return Err(RuntimeError::StackOverflow.into());
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Class whose method table answers calls on `value`.
    pub(crate) fn class_of(&self, value: &Value) -> Rc<Class> {
        match value {
            Value::Object(object) => Rc::clone(&object.class),
            _ => Rc::clone(&self.object_class),
        }
    }

    /// Invoke a user-defined method body with `receiver` as self.
    pub(crate) fn invoke_method(
        &mut self,
        receiver: Value,
        owner: Rc<Class>,
        id: BodyId,
        name: &str,
        args: Vec<Value>,
        block: Option<Value>,
    ) -> Eval<Value> {
        let body = self.body(id)?;
        debug!(body = %id, method = name, args = args.len(), "invoke method");

        let method = Rc::new(MethodContext {
            name: name.to_string(),
            owner: Rc::clone(&owner),
            block: block.clone(),
            arguments: args.clone(),
        });
        let frame = Rc::new(Frame::new(
            id,
            body.slot_count(),
            receiver,
            args,
            block,
            Some(method),
            owner,
            None,
        ));

        self.enter()?;
        let result = self.eval(&body.body, &frame);
        self.leave();

        match result {
            Err(Unwind::Return { id: target, value }) if Some(target) == body.return_id => {
                trace!(body = %id, "return caught by method");
                Ok(value)
            }
            other => other,
        }
    }

    /// Invoke a proc. Blocks run until their body finishes or `next`s;
    /// lambdas additionally catch their own `return` and `break`.
    pub(crate) fn call_proc(
        &mut self,
        proc: &Rc<ProcValue>,
        args: Vec<Value>,
        block: Option<Value>,
    ) -> Eval<Value> {
        let body = self.body(proc.body)?;
        debug!(body = %proc.body, lambda = proc.lambda, args = args.len(), "invoke proc");

        let parent = if body.needs_captured_frame {
            proc.frame.clone()
        } else {
            None
        };
        let frame = Rc::new(Frame::new(
            proc.body,
            body.slot_count(),
            proc.self_value.clone(),
            args,
            block,
            proc.method.clone(),
            Rc::clone(&proc.definee),
            parent,
        ));

        self.enter()?;
        let result = loop {
            match self.eval(&body.body, &frame) {
                Err(Unwind::Redo) => continue,
                other => break other,
            }
        };
        self.leave();

        match result {
            Ok(value) | Err(Unwind::Next(value)) => Ok(value),
            Err(Unwind::Return { id, value })
                if body.kind == BodyKind::Lambda && Some(id) == body.return_id =>
            {
                trace!(body = %proc.body, "return caught by lambda");
                Ok(value)
            }
            Err(Unwind::Break { id, value })
                if body.kind == BodyKind::Lambda && Some(id) == body.break_id =>
            {
                trace!(body = %proc.body, "break caught by lambda");
                Ok(value)
            }
            Err(other) => Err(other),
        }
    }

    /// Call the block passed to the current method, as `yield` does.
    pub(crate) fn call_block(&mut self, block: Option<&Value>, args: Vec<Value>) -> Eval<Value> {
        match block {
            Some(Value::Proc(proc)) => {
                let proc = Rc::clone(proc);
                self.call_proc(&proc, args, None)
            }
            _ => Err(RuntimeError::LocalJump("no block given (yield)".to_string()).into()),
        }
    }

    /// Dispatch `name` on `receiver`: user methods first, then core methods.
    pub(crate) fn call_method(
        &mut self,
        frame: &Rc<Frame>,
        receiver: Value,
        name: &str,
        args: Vec<Value>,
        block: Option<Value>,
    ) -> Eval<Value> {
        let class = self.class_of(&receiver);
        if let Some((owner, body)) = class.find_method(name) {
            return self.invoke_method(receiver, owner, body, name, args, block);
        }
        match self.call_builtin(frame, &receiver, name, args, block) {
            Some(result) => result,
            None => Err(RuntimeError::NoMethod {
                method: name.to_string(),
                receiver: receiver.type_name(),
            }
            .into()),
        }
    }
}
