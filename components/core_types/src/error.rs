//! Managed exceptions and the stack trace attached to them.
//!
//! A [`ManagedException`] is what escapes `invoke` when no handler in the
//! managed stack accepts a thrown object. Its class decides which handlers
//! match; the message and trace are diagnostic only.

use crate::ids::{ClassId, MethodId};
use crate::value::ObjectRef;
use std::fmt;

/// Representation a frame was executing in when it was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameTier {
    /// Bytecode interpreter
    Interpreted,
    /// Compiled code
    Compiled,
}

/// One element of a managed stack trace.
///
/// # Examples
///
/// ```
/// use core_types::{FrameTier, MethodId, StackTraceElement};
///
/// let element = StackTraceElement {
///     method: MethodId(3),
///     pc: 7,
///     tier: FrameTier::Compiled,
/// };
/// assert_eq!(element.to_string(), "method#3 @ 7 (compiled)");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackTraceElement {
    /// Method the frame belongs to
    pub method: MethodId,
    /// Instruction index the frame was at
    pub pc: u32,
    /// Representation of the frame
    pub tier: FrameTier,
}

impl fmt::Display for StackTraceElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tier = match self.tier {
            FrameTier::Interpreted => "interpreted",
            FrameTier::Compiled => "compiled",
        };
        write!(f, "{} @ {} ({})", self.method, self.pc, tier)
    }
}

/// A thrown managed object, with the trace captured at the throw point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedException {
    /// The thrown object
    pub object: ObjectRef,
    /// Human-readable message
    pub message: String,
    /// Frames the exception was thrown through, innermost first
    pub stack: Vec<StackTraceElement>,
}

impl ManagedException {
    /// Create an exception without a trace
    pub fn new(object: ObjectRef, message: impl Into<String>) -> Self {
        Self {
            object,
            message: message.into(),
            stack: Vec::new(),
        }
    }

    /// Class of the thrown object
    pub fn class(&self) -> ClassId {
        self.object.class
    }

    /// Append a frame to the trace
    pub fn push_frame(&mut self, element: StackTraceElement) {
        self.stack.push(element);
    }
}

impl fmt::Display for ManagedException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.object.class, self.message)
    }
}

impl std::error::Error for ManagedException {}
