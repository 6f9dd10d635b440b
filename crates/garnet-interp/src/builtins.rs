//! Core methods on built-in values.
//!
//! Each receiver family answers `Ok(None)` for names it does not know, which
//! falls through to the kernel methods every value responds to.

use std::rc::Rc;

use indexmap::IndexMap;
use tracing::trace;

use crate::error::{Eval, RuntimeError};
use crate::eval::hash_key;
use crate::frame::Frame;
use crate::interpreter::Interpreter;
use crate::value::{ArrayRef, Class, HashKey, HashRef, ProcValue, Value};

/// Most nil padding a single `Array#[]=` may add past the current end.
const MAX_ARRAY_GROWTH: usize = 1 << 20;

fn expect_args(name: &str, args: &[Value], count: usize) -> Eval<()> {
    if args.len() == count {
        Ok(())
    } else {
        Err(RuntimeError::ArgumentError(format!(
            "wrong number of arguments (given {}, expected {}) in `{}'",
            args.len(),
            count,
            name
        ))
        .into())
    }
}

fn integer_arg(args: &[Value], position: usize) -> Eval<i64> {
    match args.get(position) {
        Some(Value::Integer(i)) => Ok(*i),
        Some(other) => Err(RuntimeError::TypeError(format!(
            "no implicit conversion of {} into Integer",
            other.type_name()
        ))
        .into()),
        None => Err(RuntimeError::ArgumentError("missing index argument".to_string()).into()),
    }
}

fn overflow() -> RuntimeError {
    RuntimeError::Range("integer overflow".to_string())
}

/// Integer arithmetic with flooring division and modulo.
fn integer_op(a: i64, op: &str, b: i64) -> Eval<Option<Value>> {
    let value = match op {
        "+" => Value::Integer(a.checked_add(b).ok_or_else(overflow)?),
        "-" => Value::Integer(a.checked_sub(b).ok_or_else(overflow)?),
        "*" => Value::Integer(a.checked_mul(b).ok_or_else(overflow)?),
        "/" | "%" if b == 0 => return Err(RuntimeError::ZeroDivision.into()),
        "/" => {
            let quotient = a.checked_div(b).ok_or_else(overflow)?;
            let floored = if a % b != 0 && ((a < 0) != (b < 0)) {
                quotient - 1
            } else {
                quotient
            };
            Value::Integer(floored)
        }
        "%" => Value::Integer(a.checked_rem(b).map(|r| if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r }).ok_or_else(overflow)?),
        "**" if b >= 0 => {
            let exponent = u32::try_from(b).map_err(|_| overflow())?;
            Value::Integer(a.checked_pow(exponent).ok_or_else(overflow)?)
        }
        "**" => Value::Float((a as f64).powf(b as f64)),
        "<" => Value::Bool(a < b),
        ">" => Value::Bool(a > b),
        "<=" => Value::Bool(a <= b),
        ">=" => Value::Bool(a >= b),
        "<=>" => Value::Integer(a.cmp(&b) as i64),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn float_op(a: f64, op: &str, b: f64) -> Option<Value> {
    Some(match op {
        "+" => Value::Float(a + b),
        "-" => Value::Float(a - b),
        "*" => Value::Float(a * b),
        "/" => Value::Float(a / b),
        "%" => Value::Float(a.rem_euclid(b)),
        "**" => Value::Float(a.powf(b)),
        "<" => Value::Bool(a < b),
        ">" => Value::Bool(a > b),
        "<=" => Value::Bool(a <= b),
        ">=" => Value::Bool(a >= b),
        _ => return None,
    })
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

/// `puts` writes array elements on their own lines.
fn write_puts(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            let items = items.borrow().clone();
            if items.is_empty() {
                out.push('\n');
            }
            for item in &items {
                write_puts(item, out);
            }
        }
        other => {
            out.push_str(&other.to_s());
            out.push('\n');
        }
    }
}

impl<'m> Interpreter<'m> {
    pub(crate) fn call_builtin(
        &mut self,
        frame: &Rc<Frame>,
        receiver: &Value,
        name: &str,
        args: Vec<Value>,
        block: Option<Value>,
    ) -> Option<Eval<Value>> {
        trace!(method = name, receiver = %receiver.type_name(), "builtin");
        let block = block.as_ref();
        let typed = match receiver {
            Value::Integer(_) | Value::Float(_) => self.numeric_method(receiver, name, &args, block),
            Value::Str(text) => string_method(text, name, &args),
            Value::Symbol(symbol) => Ok(symbol_method(symbol, name)),
            Value::Array(items) => self.array_method(items, name, &args, block),
            Value::Hash(entries) => self.hash_method(entries, name, &args, block),
            Value::Nil => Ok(nil_method(name)),
            Value::Proc(proc) => self.proc_method(proc, name, &args, block),
            Value::Class(class) => self.class_method(class, name, &args, block),
            Value::Bool(_) | Value::Object(_) => Ok(None),
        };
        match typed {
            Ok(None) => self.kernel_method(frame, receiver, name, args, block).transpose(),
            other => other.transpose(),
        }
    }

    fn kernel_method(
        &mut self,
        frame: &Rc<Frame>,
        receiver: &Value,
        name: &str,
        args: Vec<Value>,
        block: Option<&Value>,
    ) -> Eval<Option<Value>> {
        let value = match name {
            "puts" => {
                if args.is_empty() {
                    self.output.push('\n');
                }
                for arg in &args {
                    write_puts(arg, &mut self.output);
                }
                Value::Nil
            }
            "print" => {
                for arg in &args {
                    self.output.push_str(&arg.to_s());
                }
                Value::Nil
            }
            "p" => {
                for arg in &args {
                    self.output.push_str(&arg.inspect());
                    self.output.push('\n');
                }
                match args.len() {
                    0 => Value::Nil,
                    1 => args[0].clone(),
                    _ => Value::array(args),
                }
            }
            "block_given?" => Value::Bool(frame.method.as_ref().is_some_and(|m| m.block.is_some())),
            "loop" => loop {
                self.call_block(block, Vec::new())?;
            },
            "proc" => match block {
                Some(proc) => proc.clone(),
                None => {
                    return Err(RuntimeError::ArgumentError(
                        "tried to create Proc object without a block".to_string(),
                    )
                    .into())
                }
            },
            "tap" => {
                self.call_block(block, vec![receiver.clone()])?;
                receiver.clone()
            }
            "send" | "__send__" => {
                let mut args = args.into_iter();
                let method = match args.next() {
                    Some(Value::Symbol(name)) | Some(Value::Str(name)) => name,
                    _ => return Err(RuntimeError::ArgumentError("no method name given".to_string()).into()),
                };
                let rest: Vec<Value> = args.collect();
                self.call_method(frame, receiver.clone(), &method, rest, block.cloned())?
            }
            "respond_to?" => {
                expect_args(name, &args, 1)?;
                let method = args[0].to_s();
                Value::Bool(match receiver {
                    Value::Object(object) => object.class.find_method(&method).is_some(),
                    _ => false,
                })
            }
            "class" => match receiver {
                Value::Object(object) => Value::Class(Rc::clone(&object.class)),
                _ => return Ok(None),
            },
            "nil?" => Value::Bool(receiver.is_nil()),
            "==" | "equal?" => {
                expect_args(name, &args, 1)?;
                Value::Bool(*receiver == args[0])
            }
            "!=" => {
                expect_args(name, &args, 1)?;
                Value::Bool(*receiver != args[0])
            }
            "!" => Value::Bool(!receiver.is_truthy()),
            "to_s" => Value::str(&receiver.to_s()),
            "inspect" => Value::str(&receiver.inspect()),
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    fn numeric_method(
        &mut self,
        receiver: &Value,
        name: &str,
        args: &[Value],
        block: Option<&Value>,
    ) -> Eval<Option<Value>> {
        if let [right] = args {
            let result = match (receiver, right) {
                (Value::Integer(a), Value::Integer(b)) => integer_op(*a, name, *b)?,
                (left, right) => match (as_f64(left), as_f64(right)) {
                    (Some(a), Some(b)) => float_op(a, name, b),
                    _ if matches!(name, "+" | "-" | "*" | "/" | "%" | "**" | "<" | ">" | "<=" | ">=") => {
                        return Err(RuntimeError::TypeError(format!(
                            "{} can't be coerced into {}",
                            right.type_name(),
                            left.type_name()
                        ))
                        .into())
                    }
                    _ => None,
                },
            };
            if result.is_some() {
                return Ok(result);
            }
        }

        let value = match (receiver, name) {
            (Value::Integer(i), "-@") => Value::Integer(i.checked_neg().ok_or_else(overflow)?),
            (Value::Float(f), "-@") => Value::Float(-f),
            (Value::Integer(i), "zero?") => Value::Bool(*i == 0),
            (Value::Float(f), "zero?") => Value::Bool(*f == 0.0),
            (Value::Integer(i), "even?") => Value::Bool(i % 2 == 0),
            (Value::Integer(i), "odd?") => Value::Bool(i % 2 != 0),
            (Value::Integer(i), "succ") => Value::Integer(i.checked_add(1).ok_or_else(overflow)?),
            (Value::Integer(i), "pred") => Value::Integer(i.checked_sub(1).ok_or_else(overflow)?),
            (Value::Integer(i), "abs") => Value::Integer(i.checked_abs().ok_or_else(overflow)?),
            (Value::Float(f), "abs") => Value::Float(f.abs()),
            (Value::Integer(i), "to_i") => Value::Integer(*i),
            (Value::Float(f), "to_i") => Value::Integer(*f as i64),
            (Value::Integer(i), "to_f") => Value::Float(*i as f64),
            (Value::Float(f), "to_f") => Value::Float(*f),
            (Value::Integer(count), "times") => {
                for i in 0..*count {
                    self.call_block(block, vec![Value::Integer(i)])?;
                }
                receiver.clone()
            }
            (Value::Integer(from), "upto") => {
                let to = integer_arg(args, 0)?;
                for i in *from..=to {
                    self.call_block(block, vec![Value::Integer(i)])?;
                }
                receiver.clone()
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    fn array_method(
        &mut self,
        items: &ArrayRef,
        name: &str,
        args: &[Value],
        block: Option<&Value>,
    ) -> Eval<Option<Value>> {
        let value = match name {
            "size" | "length" => Value::Integer(items.borrow().len() as i64),
            "empty?" => Value::Bool(items.borrow().is_empty()),
            "first" => items.borrow().first().cloned().unwrap_or(Value::Nil),
            "last" => items.borrow().last().cloned().unwrap_or(Value::Nil),
            "[]" => {
                let snapshot = items.borrow();
                let len = snapshot.len() as i64;
                let start = integer_arg(args, 0)?;
                let start = if start < 0 { len + start } else { start };
                match args.len() {
                    1 if (0..len).contains(&start) => snapshot[start as usize].clone(),
                    1 => Value::Nil,
                    2 => {
                        let count = integer_arg(args, 1)?;
                        if start < 0 || start > len || count < 0 {
                            Value::Nil
                        } else {
                            let end = (start + count).min(len);
                            Value::array(snapshot[start as usize..end as usize].to_vec())
                        }
                    }
                    _ => {
                        expect_args(name, args, 1)?;
                        Value::Nil
                    }
                }
            }
            "[]=" => {
                expect_args(name, args, 2)?;
                let index = integer_arg(args, 0)?;
                let mut vec = items.borrow_mut();
                let position = if index < 0 { vec.len() as i64 + index } else { index };
                if position < 0 {
                    return Err(RuntimeError::Range(format!("index {} too small for array", index)).into());
                }
                let position = position as usize;
                if position > vec.len() + MAX_ARRAY_GROWTH {
                    return Err(RuntimeError::Range(format!("index {} too big", index)).into());
                }
                if position >= vec.len() {
                    vec.resize(position + 1, Value::Nil);
                }
                vec[position] = args[1].clone();
                args[1].clone()
            }
            "push" | "<<" => {
                items.borrow_mut().extend(args.iter().cloned());
                Value::Array(Rc::clone(items))
            }
            "pop" => items.borrow_mut().pop().unwrap_or(Value::Nil),
            "include?" => {
                expect_args(name, args, 1)?;
                Value::Bool(items.borrow().contains(&args[0]))
            }
            "join" => {
                let separator = args.first().map(Value::to_s).unwrap_or_default();
                let parts: Vec<String> = items.borrow().iter().map(Value::to_s).collect();
                Value::str(&parts.join(separator.as_str()))
            }
            "reverse" => {
                let mut reversed = items.borrow().clone();
                reversed.reverse();
                Value::array(reversed)
            }
            "+" => match args {
                [Value::Array(other)] => {
                    let mut joined = items.borrow().clone();
                    joined.extend(other.borrow().iter().cloned());
                    Value::array(joined)
                }
                _ => {
                    return Err(RuntimeError::TypeError("no implicit conversion into Array".to_string()).into())
                }
            },
            "to_a" | "to_ary" => Value::Array(Rc::clone(items)),
            "each" => {
                let snapshot = items.borrow().clone();
                for item in snapshot {
                    self.call_block(block, vec![item])?;
                }
                Value::Array(Rc::clone(items))
            }
            "each_with_index" => {
                let snapshot = items.borrow().clone();
                for (i, item) in snapshot.into_iter().enumerate() {
                    self.call_block(block, vec![item, Value::Integer(i as i64)])?;
                }
                Value::Array(Rc::clone(items))
            }
            "map" | "collect" => {
                let snapshot = items.borrow().clone();
                let mut mapped = Vec::with_capacity(snapshot.len());
                for item in snapshot {
                    mapped.push(self.call_block(block, vec![item])?);
                }
                Value::array(mapped)
            }
            "select" | "filter" => {
                let snapshot = items.borrow().clone();
                let mut kept = Vec::new();
                for item in snapshot {
                    if self.call_block(block, vec![item.clone()])?.is_truthy() {
                        kept.push(item);
                    }
                }
                Value::array(kept)
            }
            "inject" | "reduce" => {
                let mut snapshot = items.borrow().clone().into_iter();
                let mut acc = match args.first() {
                    Some(initial) => initial.clone(),
                    None => snapshot.next().unwrap_or(Value::Nil),
                };
                for item in snapshot {
                    acc = self.call_block(block, vec![acc, item])?;
                }
                acc
            }
            "sum" => {
                let mut total = Value::Integer(0);
                for item in items.borrow().clone() {
                    total = match (&total, &item) {
                        (Value::Integer(a), Value::Integer(b)) => {
                            Value::Integer(a.checked_add(*b).ok_or_else(overflow)?)
                        }
                        (a, b) => match (as_f64(a), as_f64(b)) {
                            (Some(a), Some(b)) => Value::Float(a + b),
                            _ => {
                                return Err(RuntimeError::TypeError(format!(
                                    "{} can't be coerced into Integer",
                                    b.type_name()
                                ))
                                .into())
                            }
                        },
                    };
                }
                total
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    fn hash_method(
        &mut self,
        entries: &HashRef,
        name: &str,
        args: &[Value],
        block: Option<&Value>,
    ) -> Eval<Option<Value>> {
        let pairs = |entries: &HashRef| -> Vec<Value> {
            entries
                .borrow()
                .iter()
                .map(|(k, v)| Value::array(vec![k.to_value(), v.clone()]))
                .collect()
        };
        let value = match name {
            "size" | "length" => Value::Integer(entries.borrow().len() as i64),
            "empty?" => Value::Bool(entries.borrow().is_empty()),
            "[]" => {
                expect_args(name, args, 1)?;
                let key = hash_key(&args[0])?;
                entries.borrow().get(&key).cloned().unwrap_or(Value::Nil)
            }
            "[]=" => {
                expect_args(name, args, 2)?;
                let key = hash_key(&args[0])?;
                entries.borrow_mut().insert(key, args[1].clone());
                args[1].clone()
            }
            "key?" | "has_key?" | "include?" => {
                expect_args(name, args, 1)?;
                let key = hash_key(&args[0])?;
                Value::Bool(entries.borrow().contains_key(&key))
            }
            "keys" => Value::array(entries.borrow().keys().map(HashKey::to_value).collect()),
            "values" => Value::array(entries.borrow().values().cloned().collect()),
            "to_a" => Value::array(pairs(entries)),
            "each" | "each_pair" => {
                for pair in pairs(entries) {
                    self.call_block(block, vec![pair])?;
                }
                Value::Hash(Rc::clone(entries))
            }
            "map" | "collect" => {
                let mut mapped = Vec::new();
                for pair in pairs(entries) {
                    mapped.push(self.call_block(block, vec![pair])?);
                }
                Value::array(mapped)
            }
            "merge" => match args {
                [Value::Hash(other)] => {
                    let mut merged: IndexMap<HashKey, Value> = entries.borrow().clone();
                    merged.extend(other.borrow().iter().map(|(k, v)| (k.clone(), v.clone())));
                    Value::hash(merged)
                }
                _ => return Err(RuntimeError::TypeError("no implicit conversion into Hash".to_string()).into()),
            },
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    fn proc_method(
        &mut self,
        proc: &Rc<ProcValue>,
        name: &str,
        args: &[Value],
        block: Option<&Value>,
    ) -> Eval<Option<Value>> {
        let value = match name {
            "call" | "()" | "yield" | "[]" => self.call_proc(proc, args.to_vec(), block.cloned())?,
            "lambda?" => Value::Bool(proc.lambda),
            "to_proc" => Value::Proc(Rc::clone(proc)),
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    fn class_method(
        &mut self,
        class: &Rc<Class>,
        name: &str,
        args: &[Value],
        block: Option<&Value>,
    ) -> Eval<Option<Value>> {
        let value = match name {
            "new" => self.instantiate(class, args.to_vec(), block.cloned())?,
            "name" | "to_s" => Value::str(&class.name),
            "superclass" => class
                .superclass
                .as_ref()
                .map_or(Value::Nil, |parent| Value::Class(Rc::clone(parent))),
            "method_defined?" => {
                expect_args(name, args, 1)?;
                Value::Bool(class.find_method(&args[0].to_s()).is_some())
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }
}

fn string_method(text: &Rc<str>, name: &str, args: &[Value]) -> Eval<Option<Value>> {
    let value = match name {
        "size" | "length" => Value::Integer(text.chars().count() as i64),
        "empty?" => Value::Bool(text.is_empty()),
        "upcase" => Value::str(&text.to_uppercase()),
        "downcase" => Value::str(&text.to_lowercase()),
        "reverse" => Value::str(&text.chars().rev().collect::<String>()),
        "to_sym" => Value::symbol(text),
        "to_i" => Value::Integer(text.trim().parse().unwrap_or(0)),
        "+" => match args {
            [Value::Str(other)] => Value::str(&format!("{}{}", text, other)),
            [other] => {
                return Err(RuntimeError::TypeError(format!(
                    "no implicit conversion of {} into String",
                    other.type_name()
                ))
                .into())
            }
            _ => {
                expect_args(name, args, 1)?;
                Value::Nil
            }
        },
        "*" => {
            let count = integer_arg(args, 0)?;
            let count = usize::try_from(count)
                .map_err(|_| RuntimeError::ArgumentError("negative argument".to_string()))?;
            Value::str(&text.repeat(count))
        }
        "include?" => match args {
            [Value::Str(needle)] => Value::Bool(text.contains(&**needle)),
            _ => return Err(RuntimeError::TypeError("no implicit conversion into String".to_string()).into()),
        },
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn symbol_method(symbol: &Rc<str>, name: &str) -> Option<Value> {
    match name {
        "to_s" | "name" => Some(Value::Str(Rc::clone(symbol))),
        "to_sym" => Some(Value::Symbol(Rc::clone(symbol))),
        _ => None,
    }
}

fn nil_method(name: &str) -> Option<Value> {
    match name {
        "to_a" => Some(Value::array(Vec::new())),
        "to_s" => Some(Value::str("")),
        "to_i" => Some(Value::Integer(0)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_division_floors() {
        assert_eq!(integer_op(7, "/", 2).ok().flatten(), Some(Value::Integer(3)));
        assert_eq!(integer_op(-7, "/", 2).ok().flatten(), Some(Value::Integer(-4)));
        assert_eq!(integer_op(-7, "%", 2).ok().flatten(), Some(Value::Integer(1)));
        assert_eq!(integer_op(7, "%", -2).ok().flatten(), Some(Value::Integer(-1)));
        assert!(matches!(
            integer_op(1, "/", 0),
            Err(crate::error::Unwind::Raise(RuntimeError::ZeroDivision))
        ));
    }

    #[test]
    fn test_overflow_is_a_range_error() {
        assert!(matches!(
            integer_op(i64::MAX, "+", 1),
            Err(crate::error::Unwind::Raise(RuntimeError::Range(_)))
        ));
        assert_eq!(integer_op(2, "**", 10).ok().flatten(), Some(Value::Integer(1024)));
    }

    #[test]
    fn test_puts_flattens_arrays() {
        let mut out = String::new();
        write_puts(&Value::array(vec![Value::Integer(1), Value::array(vec![Value::Nil])]), &mut out);
        write_puts(&Value::array(vec![]), &mut out);
        assert_eq!(out, "1\n\n\n");
    }

    #[test]
    fn test_string_methods() {
        let text: Rc<str> = Rc::from("abc");
        assert_eq!(string_method(&text, "upcase", &[]).ok().flatten(), Some(Value::str("ABC")));
        assert_eq!(
            string_method(&text, "+", &[Value::str("d")]).ok().flatten(),
            Some(Value::str("abcd"))
        );
        assert!(string_method(&text, "+", &[Value::Integer(1)]).is_err());
        assert_eq!(string_method(&text, "frob", &[]).ok().flatten(), None);
    }
}
