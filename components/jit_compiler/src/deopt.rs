//! Deoptimization support
//!
//! Handles safe transition from compiled code back to the interpreter when
//! speculation fails or the code is invalidated, and remembers where that
//! happened so the next compilation of the method speculates less.

use crate::code::CompiledCode;
use core_types::Value;
use serde::{Deserialize, Serialize};

/// Interpreter state for deoptimization
///
/// Everything the interpreter needs to resume a method at `pc`.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpreterState {
    /// Instruction to resume at
    pub pc: u32,
    /// Accumulator
    pub accumulator: Value,
    /// Register file
    pub registers: Vec<Value>,
}

/// Reason for deoptimization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeoptReason {
    /// Operands were not integers
    TypeGuard,
    /// Integer arithmetic overflowed
    Overflow,
    /// A speculated cast failed
    BadCast,
    /// A monomorphic call site saw another receiver class
    InlineCacheMiss,
    /// A branch outcome never seen during profiling happened
    UncommonTrap,
    /// The code was invalidated by an explicit request
    Explicit,
}

impl DeoptReason {
    /// Whether the compiled code must be discarded.
    ///
    /// Overflow depends on the values involved rather than on a wrong
    /// assumption about the method, so the code stays installed.
    pub fn invalidates(self) -> bool {
        !matches!(self, DeoptReason::Overflow)
    }

    /// Get a human-readable name
    pub const fn as_str(self) -> &'static str {
        match self {
            DeoptReason::TypeGuard => "type-guard",
            DeoptReason::Overflow => "overflow",
            DeoptReason::BadCast => "bad-cast",
            DeoptReason::InlineCacheMiss => "inline-cache-miss",
            DeoptReason::UncommonTrap => "uncommon-trap",
            DeoptReason::Explicit => "explicit",
        }
    }
}

/// Information about a deoptimization event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeoptInfo {
    /// Reason for deoptimization
    pub reason: DeoptReason,
    /// Bytecode offset execution resumed at
    pub resume_offset: u32,
}

impl DeoptInfo {
    /// Create new deopt info
    pub fn new(reason: DeoptReason, resume_offset: u32) -> Self {
        Self {
            reason,
            resume_offset,
        }
    }
}

/// Per-method deoptimization history
///
/// Compilation consults it to avoid speculating again where speculation
/// already failed, and stops speculating altogether once a method has
/// deoptimized too often.
#[derive(Debug, Clone)]
pub struct Deoptimizer {
    /// History of deoptimizations (for tracking hot deopt points)
    deopt_history: Vec<DeoptInfo>,
    /// Maximum number of deoptimizations before disabling speculation
    max_deopt_count: u32,
}

impl Deoptimizer {
    /// Create a new deoptimizer
    pub fn new() -> Self {
        Self::with_max_count(10)
    }

    /// Create deoptimizer with custom max deopt count
    pub fn with_max_count(max_count: u32) -> Self {
        Self {
            deopt_history: Vec::new(),
            max_deopt_count: max_count,
        }
    }

    /// Rebuild the interpreter state of a compiled frame
    pub fn materialize(code: &CompiledCode, slots: &[Value], pc: u32) -> InterpreterState {
        InterpreterState {
            pc,
            accumulator: slots[0],
            registers: code.frame_mapping.to_registers(slots),
        }
    }

    /// Record a deoptimization
    pub fn record(&mut self, reason: DeoptReason, pc: u32) {
        self.deopt_history.push(DeoptInfo::new(reason, pc));
    }

    /// Whether the history has grown past the limit
    pub fn should_disable_optimization(&self) -> bool {
        self.deopt_history.len() as u32 > self.max_deopt_count
    }

    /// Whether speculation at `pc` already failed once
    pub fn is_suppressed(&self, pc: u32) -> bool {
        self.deopt_history
            .iter()
            .any(|info| info.resume_offset == pc && info.reason != DeoptReason::Explicit)
    }

    /// Whether any speculation of the method has failed.
    ///
    /// Code built without this history (precompiled images) guards every
    /// site, so it must not be reused once this holds.
    pub fn has_failed_speculation(&self) -> bool {
        self.should_disable_optimization()
            || self.deopt_history.iter().any(|info| self.is_suppressed(info.resume_offset))
    }

    /// Get the deoptimization count
    pub fn deopt_count(&self) -> usize {
        self.deopt_history.len()
    }

    /// Get deoptimization history
    pub fn history(&self) -> &[DeoptInfo] {
        &self.deopt_history
    }
}

impl Default for Deoptimizer {
    fn default() -> Self {
        Self::new()
    }
}
