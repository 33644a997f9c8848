use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::error::QuillError;
use crate::function::Callable;
use crate::number::Version;

pub type Vector<T> = im::Vector<T>;
pub type HashMap<K, V> = im::HashMap<K, V>;

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Version(Version),
    Char(char),
    String(String),
    Symbol(String),
    Keyword(String),
    Regex(RegexValue),
    List(Vector<Value>),
    Map(HashMap<Key, Value>),
    Function(Callable),
    Error(Arc<QuillError>),
    Object(Arc<dyn HostObject>),
}

pub trait HostObject: Send + Sync + fmt::Debug {
    fn type_name(&self) -> &str;

    fn iter(&self) -> Option<Box<dyn Iterator<Item = Value> + '_>> {
        None
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Key {
    Keyword(String),
    Symbol(String),
    String(String),
    Number(i64),
    Bool(bool),
}

impl Key {
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::Keyword(s) => Some(Key::Keyword(s.clone())),
            Value::Symbol(s) => Some(Key::Symbol(s.clone())),
            Value::String(s) => Some(Key::String(s.clone())),
            Value::Bool(b) => Some(Key::Bool(*b)),
            other => other.as_i64().map(Key::Number),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Key::Keyword(s) => Value::Keyword(s.clone()),
            Key::Symbol(s) => Value::Symbol(s.clone()),
            Key::String(s) => Value::String(s.clone()),
            Key::Number(n) => Value::Long(*n),
            Key::Bool(b) => Value::Bool(*b),
        }
    }
}

#[derive(Clone)]
pub struct RegexValue {
    pub pattern: String,
    pub regex: Regex,
}

impl RegexValue {
    pub fn new(pattern: impl Into<String>) -> Result<Self, QuillError> {
        let pattern = pattern.into();
        let regex = Regex::new(&pattern)
            .map_err(|e| QuillError::illegal_argument(format!("invalid regex: {}", e)))?;
        Ok(Self { pattern, regex })
    }
}

impl PartialEq for RegexValue {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl fmt::Debug for RegexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#\"{}\"", self.pattern)
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Byte(_) => "byte",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Version(_) => "version",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Keyword(_) => "keyword",
            Value::Regex(_) => "regex",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Function(_) => "function",
            Value::Error(_) => "error",
            Value::Object(_) => "object",
        }
    }

    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(n) => Some(i64::from(*n)),
            Value::Short(n) => Some(i64::from(*n)),
            Value::Int(n) => Some(i64::from(*n)),
            Value::Long(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_keyword(&self) -> Option<&str> {
        match self {
            Value::Keyword(k) => Some(k),
            _ => None,
        }
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Value {
        Value::List(items.into_iter().collect())
    }

    pub fn string(s: impl Into<String>) -> Value {
        Value::String(s.into())
    }

    pub fn repr(&self) -> String {
        match self {
            Value::String(s) => format!("{:?}", s),
            Value::Char(c) => format!("#\\{}", c),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::repr).collect();
                format!("({})", inner.join(" "))
            }
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Byte(n) => write!(f, "{}", n),
            Value::Short(n) => write!(f, "{}", n),
            Value::Int(n) => write!(f, "{}", n),
            Value::Long(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{:?}", n),
            Value::Double(n) => write!(f, "{:?}", n),
            Value::Version(v) => write!(f, "{}", v),
            Value::Char(c) => write!(f, "{}", c),
            Value::String(s) => write!(f, "{}", s),
            Value::Symbol(s) => write!(f, "{}", s),
            Value::Keyword(k) => write!(f, ":{}", k),
            Value::Regex(r) => write!(f, "{:?}", r),
            Value::List(items) => {
                write!(f, "(")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item.repr())?;
                }
                write!(f, ")")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (idx, (k, v)) in map.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", k.to_value().repr(), v.repr())?;
                }
                write!(f, "}}")
            }
            Value::Function(callable) => write!(f, "#<function {}>", callable.name()),
            Value::Error(err) => write!(f, "#<{}>", err),
            Value::Object(obj) => write!(f, "#<{}>", obj.type_name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Error(err) => write!(f, "Error({:?})", err),
            Value::Object(obj) => write!(f, "Object({:?})", obj),
            other => write!(f, "{}({})", other.type_name(), other.repr()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Version(a), Value::Version(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Keyword(a), Value::Keyword(b)) => a == b,
            (Value::Regex(a), Value::Regex(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Error(a), Value::Error(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
