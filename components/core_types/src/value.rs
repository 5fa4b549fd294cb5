//! Managed value representation.
//!
//! The engine only needs integers, booleans, null and object references; the
//! object layout itself belongs to the heap, which is outside this core.

use crate::ids::ClassId;
use std::fmt;

/// Reference to a heap object.
///
/// The class is carried inline so inline caches and type checks can read it
/// without a heap lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    /// Class of the referenced object
    pub class: ClassId,
    /// Heap identity
    pub id: u32,
}

impl ObjectRef {
    /// Create a new object reference
    pub fn new(class: ClassId, id: u32) -> Self {
        Self { class, id }
    }
}

/// A managed value.
///
/// # Examples
///
/// ```
/// use core_types::Value;
///
/// assert!(Value::Int(0).is_zero());
/// assert!(Value::Null.is_zero());
/// assert!(!Value::Bool(true).is_zero());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Value {
    /// The null reference
    #[default]
    Null,
    /// 64-bit signed integer
    Int(i64),
    /// Boolean
    Bool(bool),
    /// Reference to a heap object
    Object(ObjectRef),
}

/// Binary arithmetic operators shared by both tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ArithOp {
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Division, truncating toward zero
    Div,
}

/// Comparison operators shared by both tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum CmpOp {
    /// Signed less-than on integers
    Lt,
    /// Identity/equality on any two values
    Eq,
}

/// Why a primitive operation could not produce a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithFault {
    /// Integer division by zero
    DivideByZero,
    /// An operand was not an integer
    NotAnInteger,
}

impl Value {
    /// Whether a conditional jump treats this value as "zero"
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Int(n) => *n == 0,
            Value::Bool(b) => !*b,
            Value::Object(_) => false,
        }
    }

    /// Integer payload, if any
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Object payload, if any
    pub fn as_object(&self) -> Option<ObjectRef> {
        match self {
            Value::Object(obj) => Some(*obj),
            _ => None,
        }
    }

    /// Class of the value when it is an object
    pub fn class(&self) -> Option<ClassId> {
        self.as_object().map(|obj| obj.class)
    }

    /// Generic arithmetic: wraps on overflow, faults on zero divisors and
    /// non-integer operands.
    pub fn arith(op: ArithOp, lhs: Value, rhs: Value) -> Result<Value, ArithFault> {
        let (a, b) = match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => (a, b),
            _ => return Err(ArithFault::NotAnInteger),
        };
        let result = match op {
            ArithOp::Add => a.wrapping_add(b),
            ArithOp::Sub => a.wrapping_sub(b),
            ArithOp::Mul => a.wrapping_mul(b),
            ArithOp::Div => {
                if b == 0 {
                    return Err(ArithFault::DivideByZero);
                }
                a.wrapping_div(b)
            }
        };
        Ok(Value::Int(result))
    }

    /// Arithmetic that reports overflow instead of wrapping.
    ///
    /// `Ok(None)` means the integer result overflowed. Compiled code uses this
    /// to leave speculative fast paths.
    pub fn checked_arith(op: ArithOp, a: i64, b: i64) -> Result<Option<i64>, ArithFault> {
        Ok(match op {
            ArithOp::Add => a.checked_add(b),
            ArithOp::Sub => a.checked_sub(b),
            ArithOp::Mul => a.checked_mul(b),
            ArithOp::Div => {
                if b == 0 {
                    return Err(ArithFault::DivideByZero);
                }
                a.checked_div(b)
            }
        })
    }

    /// Generic comparison
    pub fn compare(op: CmpOp, lhs: Value, rhs: Value) -> Result<Value, ArithFault> {
        match op {
            CmpOp::Eq => Ok(Value::Bool(lhs == rhs)),
            CmpOp::Lt => match (lhs, rhs) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a < b)),
                _ => Err(ArithFault::NotAnInteger),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Object(obj) => write!(f, "<{} @{}>", obj.class, obj.id),
        }
    }
}
