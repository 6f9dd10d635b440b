//! Node evaluation.

use std::rc::Rc;

use garnet_ir::{BreakId, IrNode, SplatNilPolicy};
use indexmap::IndexMap;
use tracing::trace;

use crate::error::{Eval, RuntimeError, Unwind};
use crate::frame::Frame;
use crate::interpreter::Interpreter;
use crate::value::{Class, HashKey, Object, ProcValue, Value};

impl<'m> Interpreter<'m> {
    pub(crate) fn eval(&mut self, node: &IrNode, frame: &Rc<Frame>) -> Eval<Value> {
        match node {
            IrNode::Nil => Ok(Value::Nil),
            IrNode::Boolean(b) => Ok(Value::Bool(*b)),
            IrNode::Integer(i) => Ok(Value::Integer(*i)),
            IrNode::Float(f) => Ok(Value::Float(*f)),
            IrNode::Str(text) => Ok(Value::str(text)),
            IrNode::Symbol(name) => Ok(Value::symbol(name)),
            IrNode::SelfValue => Ok(frame.self_value.clone()),

            IrNode::ArrayLiteral(items) => Ok(Value::array(self.eval_list(items, frame)?)),
            IrNode::HashLiteral(pairs) => {
                let mut entries = IndexMap::with_capacity(pairs.len());
                for (key, value) in pairs {
                    let key = self.eval(key, frame)?;
                    let value = self.eval(value, frame)?;
                    entries.insert(hash_key(&key)?, value);
                }
                Ok(Value::hash(entries))
            }
            IrNode::Splat(inner) => {
                let value = self.eval(inner, frame)?;
                Ok(Value::array(self.splat_values(value)?))
            }

            IrNode::Sequence(items) => {
                let mut last = Value::Nil;
                for item in items {
                    last = self.eval(item, frame)?;
                }
                Ok(last)
            }
            IrNode::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval(condition, frame)?.is_truthy() {
                    self.eval(then_branch, frame)
                } else {
                    self.eval(else_branch, frame)
                }
            }
            IrNode::And(left, right) => {
                let left = self.eval(left, frame)?;
                if left.is_truthy() {
                    self.eval(right, frame)
                } else {
                    Ok(left)
                }
            }
            IrNode::Or(left, right) => {
                let left = self.eval(left, frame)?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    self.eval(right, frame)
                }
            }
            IrNode::Not(inner) => Ok(Value::Bool(!self.eval(inner, frame)?.is_truthy())),
            IrNode::ElidableResult { body, result } => {
                self.eval(body, frame)?;
                self.eval(result, frame)
            }

            IrNode::ReadLocal(local) => Ok(frame.get(local)?),
            IrNode::WriteLocal { target, value } => {
                let value = self.eval(value, frame)?;
                frame.set(target, value.clone())?;
                Ok(value)
            }
            IrNode::ReadInstanceVar(name) => Ok(match &frame.self_value {
                Value::Object(object) => object.ivars.borrow().get(name).cloned().unwrap_or(Value::Nil),
                Value::Class(class) => class.ivars.borrow().get(name).cloned().unwrap_or(Value::Nil),
                _ => Value::Nil,
            }),
            IrNode::WriteInstanceVar { name, value } => {
                let value = self.eval(value, frame)?;
                match &frame.self_value {
                    Value::Object(object) => {
                        object.ivars.borrow_mut().insert(name.clone(), value.clone());
                    }
                    Value::Class(class) => {
                        class.ivars.borrow_mut().insert(name.clone(), value.clone());
                    }
                    other => {
                        return Err(RuntimeError::TypeError(format!(
                            "can't modify instance variables of {}",
                            other.type_name()
                        ))
                        .into())
                    }
                }
                Ok(value)
            }
            IrNode::ReadClassVar(name) => Ok(frame.definee.class_var(name).unwrap_or(Value::Nil)),
            IrNode::WriteClassVar { name, value } => {
                let value = self.eval(value, frame)?;
                frame
                    .definee
                    .class_vars
                    .borrow_mut()
                    .insert(name.clone(), value.clone());
                Ok(value)
            }
            IrNode::ReadGlobal(name) => Ok(self.globals.get(name).cloned().unwrap_or(Value::Nil)),
            IrNode::WriteGlobal { name, value } => {
                let value = self.eval(value, frame)?;
                self.globals.insert(name.clone(), value.clone());
                Ok(value)
            }
            IrNode::ReadConstant(name) => match self.constants.get(name) {
                Some(value) => Ok(value.clone()),
                None => Err(RuntimeError::NameError(name.clone()).into()),
            },

            IrNode::CheckArity(arity) => {
                self.check_arity(arity, frame)?;
                Ok(Value::Nil)
            }
            IrNode::ReadPreArgument { index, missing } => self.read_pre_argument(frame, *index, *missing),
            IrNode::ReadOptionalArgument {
                index,
                minimum,
                keywords,
                required,
                default,
            } => {
                if self.optional_supplied(frame, *minimum, *keywords, *required) {
                    Ok(frame.arguments.get(*index).cloned().unwrap_or(Value::Nil))
                } else {
                    self.eval(default, frame)
                }
            }
            IrNode::ReadRestArgument {
                start,
                post,
                keywords,
                required,
            } => Ok(self.read_rest_argument(frame, *start, *post, *keywords, *required)),
            IrNode::ReadPostArgument {
                from_end,
                forward_index,
                minimum,
                keywords,
                required,
            } => Ok(self.read_post_argument(frame, *from_end, *forward_index, *minimum, *keywords, *required)),
            IrNode::ReadKeywordArgument {
                name,
                required,
                default,
            } => match self.keyword_argument(frame, name, *required) {
                Some(value) => Ok(value),
                None => self.eval(default, frame),
            },
            IrNode::ReadKeywordRestArgument { required, excluded } => {
                Ok(self.keyword_rest_argument(frame, *required, excluded))
            }
            IrNode::MissingKeywordArgument(name) => Err(RuntimeError::MissingKeyword(name.clone()).into()),
            IrNode::ReadBlock => Ok(frame.block.clone().unwrap_or(Value::Nil)),
            IrNode::ShouldDestructure => self.should_destructure(frame),

            IrNode::ArrayRead { array, index } => {
                let items = self.eval_array(array, frame)?;
                let len = items.len() as i64;
                let position = if *index < 0 { len + index } else { *index };
                Ok(if (0..len).contains(&position) {
                    items[position as usize].clone()
                } else {
                    Value::Nil
                })
            }
            IrNode::ArraySlice {
                array,
                start,
                end_offset,
            } => {
                let items = self.eval_array(array, frame)?;
                let end = items.len().saturating_sub(*end_offset);
                Ok(Value::array(if *start < end {
                    items[*start..end].to_vec()
                } else {
                    Vec::new()
                }))
            }
            IrNode::ArrayIsAtLeastAsLargeAs { array, size } => {
                let items = self.eval_array(array, frame)?;
                Ok(Value::Bool(items.len() >= *size))
            }
            IrNode::SplatCast { value, nil_policy } => {
                let value = self.eval(value, frame)?;
                self.splat_cast(frame, value, *nil_policy)
            }
            IrNode::IsNil(inner) => Ok(Value::Bool(self.eval(inner, frame)?.is_nil())),

            IrNode::Call {
                receiver,
                method,
                args,
                block,
            } => {
                let receiver = match receiver {
                    Some(receiver) => self.eval(receiver, frame)?,
                    None => frame.self_value.clone(),
                };
                let args = self.eval_list(args, frame)?;
                let block = self.eval_block_arg(block.as_deref(), frame)?;
                self.call_method(frame, receiver, method, args, block)
            }
            IrNode::Super {
                args,
                block,
                forward_block,
            } => {
                let args = self.eval_list(args, frame)?;
                let mut block = self.eval_block_arg(block.as_deref(), frame)?;
                if block.is_none() && *forward_block {
                    block = frame.method.as_ref().and_then(|m| m.block.clone());
                }
                self.call_super(frame, args, block)
            }
            IrNode::Yield(args) => {
                let args = self.eval_list(args, frame)?;
                let block = frame.method.as_ref().and_then(|m| m.block.clone());
                self.call_block(block.as_ref(), args)
            }
            IrNode::ProcLiteral { body, lambda } => {
                let compiled = self.body(*body)?;
                let captured = if compiled.needs_captured_frame {
                    Some(Rc::clone(frame))
                } else {
                    None
                };
                Ok(Value::Proc(Rc::new(ProcValue {
                    body: *body,
                    lambda: *lambda,
                    frame: captured,
                    self_value: frame.self_value.clone(),
                    method: frame.method.clone(),
                    definee: Rc::clone(&frame.definee),
                })))
            }
            IrNode::CatchBreak { id, body } => catch_break(*id, self.eval(body, frame)),
            IrNode::MethodDefinition { name, body } => {
                frame.definee.methods.borrow_mut().insert(name.clone(), *body);
                Ok(Value::symbol(name))
            }
            IrNode::ModuleDefinition {
                name,
                superclass,
                is_module,
                body,
            } => {
                let superclass = match superclass {
                    Some(node) => match self.eval(node, frame)? {
                        Value::Class(class) => Some(class),
                        other => {
                            return Err(RuntimeError::TypeError(format!(
                                "superclass must be a Class ({} given)",
                                other.type_name()
                            ))
                            .into())
                        }
                    },
                    None => None,
                };
                self.open_class(name, superclass, *is_module, *body)
            }

            IrNode::While {
                condition,
                body,
                do_while,
                break_id,
            } => catch_break(*break_id, self.run_loop(condition, body, *do_while, frame)),
            IrNode::Break { id, value } => {
                let value = self.eval(value, frame)?;
                trace!(target_id = %id, "break");
                Err(Unwind::Break { id: *id, value })
            }
            IrNode::Next(value) => Err(Unwind::Next(self.eval(value, frame)?)),
            IrNode::Redo => Err(Unwind::Redo),
            IrNode::Retry => Err(Unwind::Retry),
            IrNode::Return { id, value } => {
                let value = self.eval(value, frame)?;
                trace!(target_id = %id, "return");
                Err(Unwind::Return { id: *id, value })
            }
        }
    }

    fn run_loop(
        &mut self,
        condition: &IrNode,
        body: &IrNode,
        do_while: bool,
        frame: &Rc<Frame>,
    ) -> Eval<Value> {
        let mut skip_test = do_while;
        loop {
            if !skip_test && !self.eval(condition, frame)?.is_truthy() {
                return Ok(Value::Nil);
            }
            skip_test = false;
            match self.eval(body, frame) {
                Ok(_) | Err(Unwind::Next(_)) => {}
                Err(Unwind::Redo) => skip_test = true,
                Err(other) => return Err(other),
            }
        }
    }

    /// Evaluate an argument or element list, spreading splats.
    pub(crate) fn eval_list(&mut self, items: &[IrNode], frame: &Rc<Frame>) -> Eval<Vec<Value>> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            match item {
                IrNode::Splat(inner) => {
                    let value = self.eval(inner, frame)?;
                    values.extend(self.splat_values(value)?);
                }
                other => values.push(self.eval(other, frame)?),
            }
        }
        Ok(values)
    }

    fn eval_array(&mut self, node: &IrNode, frame: &Rc<Frame>) -> Eval<Vec<Value>> {
        match self.eval(node, frame)? {
            Value::Array(items) => Ok(items.borrow().clone()),
            other => Err(RuntimeError::TypeError(format!(
                "expected Array, got {}",
                other.type_name()
            ))
            .into()),
        }
    }

    fn eval_block_arg(&mut self, block: Option<&IrNode>, frame: &Rc<Frame>) -> Eval<Option<Value>> {
        match block {
            None => Ok(None),
            Some(node) => match self.eval(node, frame)? {
                Value::Nil => Ok(None),
                proc @ Value::Proc(_) => Ok(Some(proc)),
                other => Err(RuntimeError::TypeError(format!(
                    "wrong argument type {} (expected Proc)",
                    other.type_name()
                ))
                .into()),
            },
        }
    }

    /// Elements a `*value` spreads into.
    fn splat_values(&mut self, value: Value) -> Eval<Vec<Value>> {
        Ok(match value {
            Value::Array(items) => items.borrow().clone(),
            Value::Nil => Vec::new(),
            Value::Hash(entries) => entries
                .borrow()
                .iter()
                .map(|(k, v)| Value::array(vec![k.to_value(), v.clone()]))
                .collect(),
            other => vec![other],
        })
    }

    /// Convert `value` to an array for destructuring. Arrays are copied,
    /// objects are asked for `to_ary`; a nil answer from `to_ary` yields nil.
    pub(crate) fn splat_cast(
        &mut self,
        frame: &Rc<Frame>,
        value: Value,
        nil_policy: SplatNilPolicy,
    ) -> Eval<Value> {
        match value {
            Value::Nil => Ok(match nil_policy {
                SplatNilPolicy::ArrayWithNil => Value::array(vec![Value::Nil]),
                SplatNilPolicy::EmptyArray => Value::array(Vec::new()),
            }),
            Value::Array(items) => Ok(Value::array(items.borrow().clone())),
            other => match self.convert_to_ary(frame, &other)? {
                Some(converted) => Ok(converted),
                None if self.responds_to_to_ary(&other) => Ok(Value::Nil),
                None => Ok(Value::array(vec![other])),
            },
        }
    }

    /// `to_ary` on a user object, when defined. `Ok(None)` when the method is
    /// missing or answered nil.
    pub(crate) fn convert_to_ary(&mut self, frame: &Rc<Frame>, value: &Value) -> Eval<Option<Value>> {
        if !self.responds_to_to_ary(value) {
            return Ok(None);
        }
        match self.call_method(frame, value.clone(), "to_ary", Vec::new(), None)? {
            Value::Nil => Ok(None),
            array @ Value::Array(_) => Ok(Some(array)),
            other => Err(RuntimeError::TypeError(format!(
                "can't convert {} to Array ({}#to_ary gives {})",
                value.type_name(),
                value.type_name(),
                other.type_name()
            ))
            .into()),
        }
    }

    fn responds_to_to_ary(&self, value: &Value) -> bool {
        matches!(value, Value::Object(object) if object.class.find_method("to_ary").is_some())
    }

    fn call_super(&mut self, frame: &Rc<Frame>, args: Vec<Value>, block: Option<Value>) -> Eval<Value> {
        let method = match &frame.method {
            Some(method) => Rc::clone(method),
            None => return Err(RuntimeError::LocalJump("super called outside of method".to_string()).into()),
        };
        let receiver = frame.self_value.clone();
        let found = method
            .owner
            .superclass
            .as_ref()
            .and_then(|superclass| superclass.find_method(&method.name));
        match found {
            Some((owner, body)) => self.invoke_method(receiver, owner, body, &method.name, args, block),
            None => match self.call_builtin(frame, &receiver, &method.name, args, block) {
                Some(result) => result,
                None => Err(RuntimeError::NoMethod {
                    method: format!("super: {}", method.name),
                    receiver: receiver.type_name(),
                }
                .into()),
            },
        }
    }

    fn open_class(
        &mut self,
        name: &str,
        superclass: Option<Rc<Class>>,
        is_module: bool,
        body: garnet_ir::BodyId,
    ) -> Eval<Value> {
        let class = match self.constants.get(name) {
            Some(Value::Class(existing)) => Rc::clone(existing),
            Some(other) => {
                return Err(RuntimeError::TypeError(format!("{} is not a class", other.inspect())).into())
            }
            None => {
                let parent = if is_module {
                    None
                } else {
                    Some(superclass.unwrap_or_else(|| Rc::clone(&self.object_class)))
                };
                let class = Rc::new(Class::new(name, parent, is_module));
                self.constants.insert(name.to_string(), Value::Class(Rc::clone(&class)));
                class
            }
        };

        let compiled = self.body(body)?;
        let frame = Rc::new(Frame::new(
            body,
            compiled.slot_count(),
            Value::Class(Rc::clone(&class)),
            Vec::new(),
            None,
            None,
            class,
            None,
        ));
        self.eval(&compiled.body, &frame)
    }

    /// `Class#new`: allocate and run `initialize` when defined.
    pub(crate) fn instantiate(
        &mut self,
        class: &Rc<Class>,
        args: Vec<Value>,
        block: Option<Value>,
    ) -> Eval<Value> {
        if class.is_module {
            return Err(RuntimeError::NoMethod {
                method: "new".to_string(),
                receiver: class.name.clone(),
            }
            .into());
        }
        let object = Value::Object(Rc::new(Object::new(Rc::clone(class))));
        if let Some((owner, body)) = class.find_method("initialize") {
            self.invoke_method(object.clone(), owner, body, "initialize", args, block)?;
        } else if !args.is_empty() {
            return Err(RuntimeError::ArgumentError(format!(
                "wrong number of arguments (given {}, expected 0)",
                args.len()
            ))
            .into());
        }
        Ok(object)
    }
}

fn catch_break(id: BreakId, result: Eval<Value>) -> Eval<Value> {
    match result {
        Err(Unwind::Break { id: target, value }) if target == id => {
            trace!(break_id = %id, "break caught");
            Ok(value)
        }
        other => other,
    }
}

pub(crate) fn hash_key(value: &Value) -> Eval<HashKey> {
    HashKey::from_value(value).ok_or_else(|| {
        RuntimeError::TypeError(format!("{} cannot be used as a hash key", value.type_name())).into()
    })
}
