//! Core value and identity types shared by every tier of the engine.
//!
//! This crate provides the foundational types for the execution engine:
//! value representation, class and method identity, managed exceptions and
//! the collector interface compiled code is generated against.
//!
//! # Overview
//!
//! - [`Value`] - Managed value representation
//! - [`ClassId`] / [`MethodId`] - Class-metadata identities
//! - [`IntrinsicId`] - Runtime intrinsics callable from both tiers
//! - [`ManagedException`] - A thrown object escaping the managed stack
//! - [`GcKind`] / [`GcBarrierSet`] - Collector identity and barrier queries
//!
//! # Examples
//!
//! ```
//! use core_types::{ArithOp, ClassId, ManagedException, ObjectRef, Value};
//!
//! let sum = Value::arith(ArithOp::Add, Value::Int(40), Value::Int(2)).unwrap();
//! assert_eq!(sum, Value::Int(42));
//!
//! let error = ManagedException::new(
//!     ObjectRef::new(ClassId::ARITHMETIC_EXCEPTION, 1),
//!     "divide by zero",
//! );
//! assert_eq!(error.class(), ClassId::ARITHMETIC_EXCEPTION);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod gc;
mod ids;
mod value;

pub use error::{FrameTier, ManagedException, StackTraceElement};
pub use gc::{BarrierKind, BarrierOperand, BarrierPosition, DefaultBarrierSet, GcBarrierSet, GcKind};
pub use ids::{ClassId, IntrinsicId, MethodId};
pub use value::{ArithFault, ArithOp, CmpOp, ObjectRef, Value};
