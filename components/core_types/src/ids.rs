//! Identifiers for classes, methods and runtime intrinsics.
//!
//! Identifiers are plain integers handed out by the class-metadata subsystem.
//! Class ids below [`ClassId::FIRST_USER`] are reserved for the builtin
//! hierarchy the engine itself throws.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a loaded class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClassId(pub u32);

impl ClassId {
    /// Root of the class hierarchy
    pub const OBJECT: ClassId = ClassId(0);
    /// Root of every throwable class
    pub const THROWABLE: ClassId = ClassId(1);
    /// Thrown on integer division by zero
    pub const ARITHMETIC_EXCEPTION: ClassId = ClassId(2);
    /// Thrown on a failed cast or an operand of the wrong type
    pub const CLASS_CAST_EXCEPTION: ClassId = ClassId(3);
    /// Thrown on a virtual call or throw through a null reference
    pub const NULL_POINTER_EXCEPTION: ClassId = ClassId(4);
    /// Thrown when a thread exhausts its frame stack
    pub const STACK_OVERFLOW_ERROR: ClassId = ClassId(5);
    /// Thrown when a method reference cannot be resolved
    pub const NO_SUCH_METHOD_ERROR: ClassId = ClassId(6);
    /// Thrown on an arity mismatch at an entry point
    pub const ILLEGAL_ARGUMENT_EXCEPTION: ClassId = ClassId(7);
    /// Thrown when a class reference cannot be resolved
    pub const NO_CLASS_DEF_FOUND_ERROR: ClassId = ClassId(8);

    /// First id available to user classes
    pub const FIRST_USER: u32 = 16;

    /// Raw numeric value
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Whether this id names one of the builtin classes
    pub const fn is_builtin(self) -> bool {
        self.0 < Self::FIRST_USER
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class#{}", self.0)
    }
}

/// Identity of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MethodId(pub u32);

impl MethodId {
    /// Raw numeric value
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "method#{}", self.0)
    }
}

/// Runtime intrinsics callable from both tiers.
///
/// The discriminant is the index into the intrinsic table patched into every
/// AOT image, so the order is part of the image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum IntrinsicId {
    /// Absolute value of an integer
    AbsI64 = 0,
    /// Minimum of two integers
    MinI64 = 1,
    /// Maximum of two integers
    MaxI64 = 2,
    /// Clamp the first argument into `[second, third]`
    ClampI64 = 3,
    /// Number of set bits
    PopCount = 4,
    /// Integer exponentiation with wrapping
    PowI64 = 5,
}

impl IntrinsicId {
    /// Number of intrinsics; size of the intrinsic table
    pub const COUNT: usize = 6;

    /// All intrinsics in table order
    pub const ALL: [IntrinsicId; Self::COUNT] = [
        IntrinsicId::AbsI64,
        IntrinsicId::MinI64,
        IntrinsicId::MaxI64,
        IntrinsicId::ClampI64,
        IntrinsicId::PopCount,
        IntrinsicId::PowI64,
    ];

    /// Position in the intrinsic table
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Expected argument count
    pub const fn arity(self) -> usize {
        match self {
            IntrinsicId::AbsI64 | IntrinsicId::PopCount => 1,
            IntrinsicId::MinI64 | IntrinsicId::MaxI64 | IntrinsicId::PowI64 => 2,
            IntrinsicId::ClampI64 => 3,
        }
    }

    /// Human-readable name
    pub const fn name(self) -> &'static str {
        match self {
            IntrinsicId::AbsI64 => "abs_i64",
            IntrinsicId::MinI64 => "min_i64",
            IntrinsicId::MaxI64 => "max_i64",
            IntrinsicId::ClampI64 => "clamp_i64",
            IntrinsicId::PopCount => "popcount",
            IntrinsicId::PowI64 => "pow_i64",
        }
    }
}
