//! Runtime values.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use garnet_ir::BodyId;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::frame::{Frame, MethodContext};

pub type ArrayRef = Rc<RefCell<Vec<Value>>>;
pub type HashRef = Rc<RefCell<IndexMap<HashKey, Value>>>;

/// A runtime value. Arrays, hashes and objects are shared by reference.
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Str(Rc<str>),
    Symbol(Rc<str>),
    Array(ArrayRef),
    Hash(HashRef),
    Proc(Rc<ProcValue>),
    Object(Rc<Object>),
    Class(Rc<Class>),
}

impl Value {
    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn hash(entries: IndexMap<HashKey, Value>) -> Value {
        Value::Hash(Rc::new(RefCell::new(entries)))
    }

    pub fn str(text: &str) -> Value {
        Value::Str(Rc::from(text))
    }

    pub fn symbol(name: &str) -> Value {
        Value::Symbol(Rc::from(name))
    }

    /// Only `nil` and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Snapshot of an array's elements.
    pub fn as_array(&self) -> Option<Vec<Value>> {
        match self {
            Value::Array(items) => Some(items.borrow().clone()),
            _ => None,
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::Nil => "NilClass".to_string(),
            Value::Bool(true) => "TrueClass".to_string(),
            Value::Bool(false) => "FalseClass".to_string(),
            Value::Integer(_) => "Integer".to_string(),
            Value::Float(_) => "Float".to_string(),
            Value::Str(_) => "String".to_string(),
            Value::Symbol(_) => "Symbol".to_string(),
            Value::Array(_) => "Array".to_string(),
            Value::Hash(_) => "Hash".to_string(),
            Value::Proc(_) => "Proc".to_string(),
            Value::Object(object) => object.class.name.clone(),
            Value::Class(_) => "Class".to_string(),
        }
    }

    /// `to_s` rendering, as printed by `puts`.
    pub fn to_s(&self) -> String {
        match self {
            Value::Nil => String::new(),
            Value::Str(text) => text.to_string(),
            Value::Symbol(name) => name.to_string(),
            Value::Class(class) => class.name.clone(),
            other => other.inspect(),
        }
    }

    /// `inspect` rendering, as printed by `p`.
    pub fn inspect(&self) -> String {
        match self {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.is_finite() {
                    format!("{:.1}", f)
                } else {
                    f.to_string()
                }
            }
            Value::Str(text) => format!("{:?}", text),
            Value::Symbol(name) => format!(":{}", name),
            Value::Array(items) => {
                let parts: Vec<String> = items.borrow().iter().map(Value::inspect).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Hash(entries) => {
                if entries.borrow().is_empty() {
                    return "{}".to_string();
                }
                let parts: Vec<String> = entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| match k {
                        HashKey::Symbol(name) => format!("{}: {}", name, v.inspect()),
                        other => format!("{} => {}", other.to_value().inspect(), v.inspect()),
                    })
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            Value::Proc(proc) => {
                if proc.lambda {
                    format!("#<Proc:{} (lambda)>", proc.body)
                } else {
                    format!("#<Proc:{}>", proc.body)
                }
            }
            Value::Object(object) => format!("#<{}>", object.class.name),
            Value::Class(class) => class.name.clone(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                (*a as f64) == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Hash(a), Value::Hash(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Proc(a), Value::Proc(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inspect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_s())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

/// Hashable subset of values usable as hash keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    Nil,
    Bool(bool),
    Integer(i64),
    Str(Rc<str>),
    Symbol(Rc<str>),
}

impl HashKey {
    pub fn from_value(value: &Value) -> Option<HashKey> {
        match value {
            Value::Nil => Some(HashKey::Nil),
            Value::Bool(b) => Some(HashKey::Bool(*b)),
            Value::Integer(i) => Some(HashKey::Integer(*i)),
            Value::Str(text) => Some(HashKey::Str(Rc::clone(text))),
            Value::Symbol(name) => Some(HashKey::Symbol(Rc::clone(name))),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            HashKey::Nil => Value::Nil,
            HashKey::Bool(b) => Value::Bool(*b),
            HashKey::Integer(i) => Value::Integer(*i),
            HashKey::Str(text) => Value::Str(Rc::clone(text)),
            HashKey::Symbol(name) => Value::Symbol(Rc::clone(name)),
        }
    }

    pub fn symbol(name: &str) -> HashKey {
        HashKey::Symbol(Rc::from(name))
    }
}

/// A closure: compiled body plus what it needs from its defining frame.
pub struct ProcValue {
    pub body: BodyId,
    pub lambda: bool,
    /// Defining frame, kept only when the body reads through it
    pub frame: Option<Rc<Frame>>,
    pub self_value: Value,
    pub method: Option<Rc<MethodContext>>,
    pub definee: Rc<Class>,
}

/// Class or module with its method table.
pub struct Class {
    pub name: String,
    pub superclass: Option<Rc<Class>>,
    pub is_module: bool,
    pub methods: RefCell<FxHashMap<String, BodyId>>,
    pub class_vars: RefCell<FxHashMap<String, Value>>,
    pub ivars: RefCell<FxHashMap<String, Value>>,
}

impl Class {
    pub fn new(name: impl Into<String>, superclass: Option<Rc<Class>>, is_module: bool) -> Self {
        Self {
            name: name.into(),
            superclass,
            is_module,
            methods: RefCell::new(FxHashMap::default()),
            class_vars: RefCell::new(FxHashMap::default()),
            ivars: RefCell::new(FxHashMap::default()),
        }
    }

    /// Find a method on this class or its ancestors, with the class that owns it.
    pub fn find_method(self: &Rc<Self>, name: &str) -> Option<(Rc<Class>, BodyId)> {
        let mut current = Some(Rc::clone(self));
        while let Some(class) = current {
            if let Some(body) = class.methods.borrow().get(name).copied() {
                return Some((Rc::clone(&class), body));
            }
            current = class.superclass.clone();
        }
        None
    }

    /// Class variable lookup along the superclass chain.
    pub fn class_var(self: &Rc<Self>, name: &str) -> Option<Value> {
        let mut current = Some(Rc::clone(self));
        while let Some(class) = current {
            if let Some(value) = class.class_vars.borrow().get(name) {
                return Some(value.clone());
            }
            current = class.superclass.clone();
        }
        None
    }
}

/// Instance of a user class.
pub struct Object {
    pub class: Rc<Class>,
    pub ivars: RefCell<FxHashMap<String, Value>>,
}

impl Object {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            ivars: RefCell::new(FxHashMap::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Integer(0).is_truthy());
        assert!(Value::array(vec![]).is_truthy());
    }

    #[test]
    fn test_inspect() {
        let value = Value::array(vec![
            Value::Integer(1),
            Value::str("two"),
            Value::symbol("three"),
            Value::Nil,
            Value::Float(2.0),
        ]);
        assert_eq!(value.inspect(), r#"[1, "two", :three, nil, 2.0]"#);

        let mut entries = IndexMap::new();
        entries.insert(HashKey::symbol("a"), Value::Integer(1));
        entries.insert(HashKey::Str(Rc::from("b")), Value::Integer(2));
        assert_eq!(Value::hash(entries).inspect(), r#"{a: 1, "b" => 2}"#);
    }

    #[test]
    fn test_structural_equality() {
        let a = Value::array(vec![Value::Integer(1), Value::Integer(2)]);
        let b = Value::array(vec![Value::Integer(1), Value::Integer(2)]);
        assert_eq!(a, b);
        assert_eq!(Value::Integer(2), Value::Float(2.0));
        assert_ne!(Value::str("a"), Value::symbol("a"));
    }

    #[test]
    fn test_method_lookup_walks_superclasses() {
        let base = Rc::new(Class::new("Base", None, false));
        base.methods.borrow_mut().insert("greet".to_string(), BodyId(3));
        let derived = Rc::new(Class::new("Derived", Some(Rc::clone(&base)), false));

        let (owner, body) = derived.find_method("greet").expect("inherited method");
        assert_eq!(owner.name, "Base");
        assert_eq!(body, BodyId(3));
        assert!(derived.find_method("missing").is_none());
    }
}
