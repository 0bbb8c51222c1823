//! The dynamic value carried by change events and accessors.

use crate::{
    error::{Error, Result},
    object::{ObjectRef, ObjectType},
};
use std::{
    fmt::{self, Debug, Display, Formatter},
    sync::Arc,
};

/// A dynamically-typed value read from or written to a member.
///
/// Equality is structural, with two exceptions: objects compare by identity,
/// and `Float(NaN)` equals itself, so that a stream of NaN readings is still
/// considered unchanged.
#[derive(Clone, Default)]
pub enum Value {
    /// No value. Reading a member through a `Null` intermediate stops the
    /// chain.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating-point number.
    Float(f64),
    /// An immutable string.
    Str(Arc<str>),
    /// An immutable list of values.
    List(Arc<[Value]>),
    /// A shared reference to an observable object.
    Object(ObjectRef),
}

impl Value {
    /// A short name for the kind of value, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    /// Wraps a typed object.
    pub fn object<T: ObjectType>(object: Arc<T>) -> Self {
        Value::Object(object)
    }

    /// Whether this is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer, if this is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// The float, if this is one.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// The string slice, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The items, if this is a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// The object reference, if this is an object.
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Downcasts an object value to its concrete type.
    pub fn downcast<T: ObjectType>(&self) -> Option<Arc<T>> {
        self.as_object()
            .and_then(|obj| Arc::clone(obj).into_any().downcast::<T>().ok())
    }

    /// Converts into a typed value.
    pub fn get<T: FromValue>(self) -> Result<T> {
        T::from_value(self)
    }

    /// Writes the value the way it is spelled inside a path, i.e. with
    /// strings quoted and escaped.
    pub(crate) fn fmt_literal(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        c => write!(f, "{c}")?,
                    }
                }
                f.write_str("\"")
            }
            Value::Float(n) if n.fract() == 0.0 && n.is_finite() => {
                write!(f, "{n:.1}")
            }
            other => Display::fmt(other, f),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => {
                a == b || (a.is_nan() && b.is_nan())
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Int(n) => f.debug_tuple("Int").field(n).finish(),
            Value::Float(n) => f.debug_tuple("Float").field(n).finish(),
            Value::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Object(obj) => write!(
                f,
                "Object({}@{:p})",
                obj.type_info().name(),
                Arc::as_ptr(obj) as *const ()
            ),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    item.fmt_literal(f)?;
                }
                f.write_str("]")
            }
            Value::Object(obj) => {
                write!(f, "<{}>", obj.type_info().name())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(Arc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Arc::from(value))
    }
}

impl From<Arc<str>> for Value {
    fn from(value: Arc<str>) -> Self {
        Value::Str(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(Arc::from(value))
    }
}

impl<T: ObjectType> From<Arc<T>> for Value {
    fn from(value: Arc<T>) -> Self {
        Value::Object(value)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// Conversion out of a [`Value`], used by typed accessors and setters.
pub trait FromValue: Sized {
    /// Converts the value, failing with [`Error::TypeMismatch`] when the
    /// value is of the wrong kind.
    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch<T>(expected: &'static str, found: &Value) -> Result<T> {
    Err(Error::TypeMismatch {
        expected,
        found: found.kind(),
    })
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => mismatch("bool", &other),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int(n) => Ok(n),
            other => mismatch("int", &other),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(n) => Ok(n),
            Value::Int(n) => Ok(n as f64),
            other => mismatch("float", &other),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Str(s) => Ok(s.to_string()),
            other => mismatch("string", &other),
        }
    }
}

impl FromValue for Vec<Value> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(items) => Ok(items.to_vec()),
            other => mismatch("list", &other),
        }
    }
}

impl<T: ObjectType> FromValue for Arc<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value.downcast::<T>() {
            Some(obj) => Ok(obj),
            None => Err(Error::TypeMismatch {
                expected: T::type_name(),
                found: value
                    .as_object()
                    .map(|obj| obj.type_info().name())
                    .unwrap_or_else(|| value.kind()),
            }),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}
