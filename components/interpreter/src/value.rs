//! Runtime values.
//!
//! Every value the interpreter manipulates is a [`Value`]. Immediate data
//! (nil, booleans, small integers, doubles) is stored inline; everything
//! else is reference counted so that values can be shared freely between
//! activations, blocks and threads.

use core_types::Symbol;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use std::fmt;
use std::sync::Arc;

use crate::block::SBlock;
use crate::class::SClass;
use crate::object::{SArray, SObject};

/// A runtime value.
///
/// Equality (`==` in Rust) is value equality for immediates and strings
/// and identity for heap objects, which matches the guest language's
/// `==` on everything except numbers.
///
/// # Examples
///
/// ```
/// use interpreter::Value;
///
/// let n = Value::Integer(41);
/// assert_eq!(n.type_name(), "Integer");
/// assert!(Value::Nil.is_nil());
/// assert_eq!(Value::from(true), Value::Boolean(true));
/// ```
#[derive(Clone)]
pub enum Value {
    /// The sole instance of Nil
    Nil,
    /// `true` or `false`
    Boolean(bool),
    /// Integer that fits in 64 bits
    Integer(i64),
    /// Integer that overflowed 64 bits
    BigInteger(Arc<BigInt>),
    /// IEEE 754 double
    Double(f64),
    /// Immutable string
    String(Arc<str>),
    /// Interned symbol
    Symbol(Symbol),
    /// Mutable fixed-size array
    Array(Arc<SArray>),
    /// Instance of a user-defined class
    Object(Arc<SObject>),
    /// Closure
    Block(Arc<SBlock>),
    /// Class used as a receiver
    Class(Arc<SClass>),
}

impl Value {
    /// Normalize an arbitrary-precision integer, demoting it to
    /// [`Value::Integer`] when it fits in 64 bits
    pub fn from_bigint(value: BigInt) -> Self {
        match value.to_i64() {
            Some(small) => Value::Integer(small),
            None => Value::BigInteger(Arc::new(value)),
        }
    }

    /// Create a string value
    pub fn string(s: &str) -> Self {
        Value::String(Arc::from(s))
    }

    /// Create an array value from elements
    pub fn array(elements: Vec<Value>) -> Self {
        Value::Array(Arc::new(SArray::new(elements)))
    }

    /// Check if this value is nil
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Get the boolean payload, if any
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the integer payload, if it is a small integer
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the object payload, if any
    pub fn as_object(&self) -> Option<&Arc<SObject>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Get the block payload, if any
    pub fn as_block(&self) -> Option<&Arc<SBlock>> {
        match self {
            Value::Block(b) => Some(b),
            _ => None,
        }
    }

    /// Name of the built-in kind of this value, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "Nil",
            Value::Boolean(true) => "True",
            Value::Boolean(false) => "False",
            Value::Integer(_) | Value::BigInteger(_) => "Integer",
            Value::Double(_) => "Double",
            Value::String(_) => "String",
            Value::Symbol(_) => "Symbol",
            Value::Array(_) => "Array",
            Value::Object(_) => "Object",
            Value::Block(_) => "Block",
            Value::Class(_) => "Class",
        }
    }

    /// Identity comparison as performed by the `==` primitive
    ///
    /// Numbers compare by value, heap references by address.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Arc::ptr_eq(a, b),
            _ => self == other,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::BigInteger(a), Value::BigInteger(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Block(a), Value::Block(b)) => Arc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Self {
        Value::Symbol(s)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::BigInteger(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{:?}", d),
            Value::String(s) => write!(f, "'{}'", s),
            Value::Symbol(s) => write!(f, "{:?}", s),
            Value::Array(a) => write!(f, "Array({})", a.len()),
            Value::Object(o) => write!(f, "a {}", o.class().name()),
            Value::Block(b) => write!(f, "Block({})", b.method().signature()),
            Value::Class(c) => write!(f, "{}", c.name()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Symbol(s) => f.write_str(s.as_str()),
            other => write!(f, "{:?}", other),
        }
    }
}
