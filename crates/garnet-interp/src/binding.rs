//! Argument binding.
//!
//! Positional counts exclude the keyword carrier: the trailing hash a
//! keyword-taking callable receives when more than its required positional
//! arguments were passed.

use std::rc::Rc;

use garnet_ir::{Arity, MissingArgumentBehavior};
use indexmap::IndexMap;
use tracing::trace;

use crate::error::{Eval, RuntimeError};
use crate::frame::Frame;
use crate::interpreter::Interpreter;
use crate::value::{HashKey, HashRef, Value};

/// The keyword carrier of `arguments`, if one was passed.
fn keyword_carrier(arguments: &[Value], required: usize) -> Option<&HashRef> {
    if arguments.len() <= required {
        return None;
    }
    match arguments.last() {
        Some(Value::Hash(entries)) => Some(entries),
        _ => None,
    }
}

fn positional_count(arguments: &[Value], keywords: bool, required: usize) -> usize {
    if keywords && keyword_carrier(arguments, required).is_some() {
        arguments.len() - 1
    } else {
        arguments.len()
    }
}

fn expected(arity: &Arity) -> String {
    match arity.maximum() {
        Some(max) if max == arity.required() => max.to_string(),
        Some(max) => format!("{}..{}", arity.required(), max),
        None => format!("{}+", arity.required()),
    }
}

impl<'m> Interpreter<'m> {
    pub(crate) fn check_arity(&mut self, arity: &Arity, frame: &Rc<Frame>) -> Eval<()> {
        let keywords = arity.has_keywords();
        let given = positional_count(&frame.arguments, keywords, arity.required());
        if !arity.accepts(given) {
            return Err(RuntimeError::ArgumentError(format!(
                "wrong number of arguments (given {}, expected {})",
                given,
                expected(arity)
            ))
            .into());
        }

        if keywords && !arity.has_keyword_rest {
            if let Some(carrier) = keyword_carrier(&frame.arguments, arity.required()) {
                let unknown = carrier.borrow().keys().find_map(|key| match key {
                    HashKey::Symbol(name) if arity.keywords.iter().any(|k| **k == **name) => None,
                    other => Some(other.to_value().inspect()),
                });
                if let Some(key) = unknown {
                    return Err(RuntimeError::ArgumentError(format!("unknown keyword: {}", key)).into());
                }
            }
        }
        Ok(())
    }

    pub(crate) fn read_pre_argument(
        &self,
        frame: &Rc<Frame>,
        index: usize,
        missing: MissingArgumentBehavior,
    ) -> Eval<Value> {
        match frame.arguments.get(index) {
            Some(value) => Ok(value.clone()),
            None => match missing {
                MissingArgumentBehavior::Nil => Ok(Value::Nil),
                MissingArgumentBehavior::HardError => Err(RuntimeError::ArgumentError(format!(
                    "wrong number of arguments (given {}, expected at least {})",
                    frame.arguments.len(),
                    index + 1
                ))
                .into()),
            },
        }
    }

    /// Whether enough arguments arrived for an optional parameter to take
    /// its supplied value. `minimum` counts the carrier slot when `keywords`
    /// is set; it is discounted when no carrier was passed.
    pub(crate) fn optional_supplied(
        &self,
        frame: &Rc<Frame>,
        minimum: usize,
        keywords: bool,
        required: usize,
    ) -> bool {
        let needed = if keywords && keyword_carrier(&frame.arguments, required).is_none() {
            minimum.saturating_sub(1)
        } else {
            minimum
        };
        let supplied = frame.arguments.len() >= needed;
        trace!(minimum, needed, supplied, "optional argument");
        supplied
    }

    pub(crate) fn read_rest_argument(
        &self,
        frame: &Rc<Frame>,
        start: usize,
        post: usize,
        keywords: bool,
        required: usize,
    ) -> Value {
        let count = positional_count(&frame.arguments, keywords, required);
        let end = count.saturating_sub(post);
        if start < end {
            Value::array(frame.arguments[start..end].to_vec())
        } else {
            Value::array(Vec::new())
        }
    }

    pub(crate) fn read_post_argument(
        &self,
        frame: &Rc<Frame>,
        from_end: usize,
        forward_index: usize,
        minimum: usize,
        keywords: bool,
        required: usize,
    ) -> Value {
        let count = positional_count(&frame.arguments, keywords, required);
        let index = if count >= minimum {
            count - from_end
        } else {
            forward_index
        };
        if index < count {
            frame.arguments[index].clone()
        } else {
            Value::Nil
        }
    }

    pub(crate) fn keyword_argument(&self, frame: &Rc<Frame>, name: &str, required: usize) -> Option<Value> {
        keyword_carrier(&frame.arguments, required)
            .and_then(|carrier| carrier.borrow().get(&HashKey::symbol(name)).cloned())
    }

    pub(crate) fn keyword_rest_argument(&self, frame: &Rc<Frame>, required: usize, excluded: &[String]) -> Value {
        let mut rest = IndexMap::new();
        if let Some(carrier) = keyword_carrier(&frame.arguments, required) {
            for (key, value) in carrier.borrow().iter() {
                let claimed = matches!(key, HashKey::Symbol(name) if excluded.iter().any(|e| **e == **name));
                if !claimed {
                    rest.insert(key.clone(), value.clone());
                }
            }
        }
        Value::hash(rest)
    }

    /// A block spreads its single argument over its parameters when that
    /// argument is an array or converts to one.
    pub(crate) fn should_destructure(&mut self, frame: &Rc<Frame>) -> Eval<Value> {
        let answer = match frame.arguments.as_slice() {
            [Value::Array(_)] => true,
            [single @ Value::Object(_)] => self.convert_to_ary(frame, single)?.is_some(),
            _ => false,
        };
        trace!(body = %frame.body, answer, "should destructure");
        Ok(Value::Bool(answer))
    }
}
