//! Numeric tower shared by primitives and eager send specializations.
//!
//! Small integers overflow into arbitrary precision and demote back when
//! a result fits in 64 bits again. Mixing an integer with a double yields
//! a double.

use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use std::cmp::Ordering;

use crate::error::RuntimeError;
use crate::value::Value;

/// Binary operators with a numeric fast path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// `=`
    Eq,
}

impl ArithOp {
    /// Operator for a binary selector, if it has a numeric fast path
    pub fn from_selector(selector: &str) -> Option<Self> {
        Some(match selector {
            "+" => ArithOp::Add,
            "-" => ArithOp::Sub,
            "*" => ArithOp::Mul,
            "<" => ArithOp::Lt,
            ">" => ArithOp::Gt,
            "<=" => ArithOp::Le,
            ">=" => ArithOp::Ge,
            "=" => ArithOp::Eq,
            _ => return None,
        })
    }

    /// Selector text of this operator
    pub fn selector(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Lt => "<",
            ArithOp::Gt => ">",
            ArithOp::Le => "<=",
            ArithOp::Ge => ">=",
            ArithOp::Eq => "=",
        }
    }

    fn compares(self, ordering: Ordering) -> bool {
        match self {
            ArithOp::Lt => ordering == Ordering::Less,
            ArithOp::Gt => ordering == Ordering::Greater,
            ArithOp::Le => ordering != Ordering::Greater,
            ArithOp::Ge => ordering != Ordering::Less,
            ArithOp::Eq => ordering == Ordering::Equal,
            ArithOp::Add | ArithOp::Sub | ArithOp::Mul => false,
        }
    }
}

/// Numeric view of a value
#[derive(Debug, Clone)]
pub enum Number {
    /// 64-bit integer
    Small(i64),
    /// Arbitrary-precision integer
    Big(BigInt),
    /// Double
    Float(f64),
}

impl Number {
    /// View `value` as a number
    pub fn of(value: &Value) -> Option<Number> {
        match value {
            Value::Integer(i) => Some(Number::Small(*i)),
            Value::BigInteger(b) => Some(Number::Big((**b).clone())),
            Value::Double(d) => Some(Number::Float(*d)),
            _ => None,
        }
    }

    fn to_big(&self) -> Option<BigInt> {
        match self {
            Number::Small(i) => Some(BigInt::from(*i)),
            Number::Big(b) => Some(b.clone()),
            Number::Float(_) => None,
        }
    }

    fn to_f64(&self) -> f64 {
        match self {
            Number::Small(i) => *i as f64,
            Number::Big(b) => b.to_f64().unwrap_or(f64::NAN),
            Number::Float(d) => *d,
        }
    }
}

/// Whether `value` takes part in the numeric tower
pub fn is_number(value: &Value) -> bool {
    matches!(value, Value::Integer(_) | Value::BigInteger(_) | Value::Double(_))
}

/// Apply `op` to two values
///
/// Returns `None` when either operand is not a number, which lets
/// callers fall back to a full send.
pub fn apply(op: ArithOp, left: &Value, right: &Value) -> Option<Value> {
    let (a, b) = (Number::of(left)?, Number::of(right)?);
    Some(match (&a, &b) {
        (Number::Small(x), Number::Small(y)) => match op {
            ArithOp::Add => x
                .checked_add(*y)
                .map(Value::Integer)
                .unwrap_or_else(|| Value::from_bigint(BigInt::from(*x) + *y)),
            ArithOp::Sub => x
                .checked_sub(*y)
                .map(Value::Integer)
                .unwrap_or_else(|| Value::from_bigint(BigInt::from(*x) - *y)),
            ArithOp::Mul => x
                .checked_mul(*y)
                .map(Value::Integer)
                .unwrap_or_else(|| Value::from_bigint(BigInt::from(*x) * *y)),
            _ => Value::Boolean(op.compares(x.cmp(y))),
        },
        (Number::Float(_), _) | (_, Number::Float(_)) => {
            let (x, y) = (a.to_f64(), b.to_f64());
            match op {
                ArithOp::Add => Value::Double(x + y),
                ArithOp::Sub => Value::Double(x - y),
                ArithOp::Mul => Value::Double(x * y),
                _ => Value::Boolean(x.partial_cmp(&y).map(|o| op.compares(o)).unwrap_or(false)),
            }
        }
        _ => {
            let (x, y) = (a.to_big()?, b.to_big()?);
            match op {
                ArithOp::Add => Value::from_bigint(x + y),
                ArithOp::Sub => Value::from_bigint(x - y),
                ArithOp::Mul => Value::from_bigint(x * y),
                _ => Value::Boolean(op.compares(x.cmp(&y))),
            }
        }
    })
}

/// Integer division truncating towards negative infinity (`//`)
pub fn floor_divide(left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    integer_operation(left, right, |x, y| {
        let (q, r) = (&x / &y, &x % &y);
        if !r.is_zero() && ((r < BigInt::zero()) != (y < BigInt::zero())) {
            q - 1
        } else {
            q
        }
    })
}

/// Modulo with the sign of the divisor (`\\`)
pub fn modulo(left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    integer_operation(left, right, |x, y| {
        let r = &x % &y;
        if !r.is_zero() && ((r < BigInt::zero()) != (y < BigInt::zero())) {
            r + y
        } else {
            r
        }
    })
}

/// Division (`/`): exact integer division when it divides evenly, a double
/// otherwise
pub fn divide(left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    let (a, b) = operands(left, right)?;
    if let (Some(x), Some(y)) = (a.to_big(), b.to_big()) {
        if y.is_zero() {
            return Err(RuntimeError::Primitive("division by zero".to_string()));
        }
        if (&x % &y).is_zero() {
            return Ok(Value::from_bigint(x / y));
        }
    }
    Ok(Value::Double(a.to_f64() / b.to_f64()))
}

fn operands(left: &Value, right: &Value) -> Result<(Number, Number), RuntimeError> {
    let a = Number::of(left).ok_or(RuntimeError::TypeMismatch {
        expected: "Number",
        actual: left.type_name(),
    })?;
    let b = Number::of(right).ok_or(RuntimeError::TypeMismatch {
        expected: "Number",
        actual: right.type_name(),
    })?;
    Ok((a, b))
}

fn integer_operation(
    left: &Value,
    right: &Value,
    op: impl FnOnce(BigInt, BigInt) -> BigInt,
) -> Result<Value, RuntimeError> {
    let (a, b) = operands(left, right)?;
    let (x, y) = match (a.to_big(), b.to_big()) {
        (Some(x), Some(y)) => (x, y),
        _ => {
            return Err(RuntimeError::TypeMismatch {
                expected: "Integer",
                actual: "Double",
            })
        }
    };
    if y.is_zero() {
        return Err(RuntimeError::Primitive("division by zero".to_string()));
    }
    Ok(Value::from_bigint(op(x, y)))
}
