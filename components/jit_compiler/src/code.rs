//! Compiled method bodies
//!
//! The compiled tier is a register machine over a flat slot array. Slot 0
//! always holds the accumulator; every bytecode register the method touches
//! gets its own slot. Each bytecode instruction lowers to exactly one
//! operation, so a compiled pc is also the bytecode pc it came from. That is
//! what lets deoptimization, exception handling and OSR translate positions
//! without side tables.

use crate::deopt::DeoptReason;
use crate::osr::{FrameMapping, OSREntry};
use core_types::{ArithOp, BarrierKind, ClassId, CmpOp, IntrinsicId, MethodId, Value};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Index into a compiled frame's slot array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot(pub u16);

impl Slot {
    /// The accumulator
    pub const ACC: Slot = Slot(0);

    /// Slot index as usize
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A literal embedded in compiled code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Const {
    /// Null
    Null,
    /// Integer
    Int(i64),
    /// Boolean
    Bool(bool),
}

impl Const {
    /// The value this literal denotes
    pub fn value(self) -> Value {
        match self {
            Const::Null => Value::Null,
            Const::Int(n) => Value::Int(n),
            Const::Bool(b) => Value::Bool(b),
        }
    }
}

/// Which outcome of a branch leaves compiled code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchTrap {
    /// Both outcomes stay in compiled code
    None,
    /// Taking the branch deoptimizes
    OnTaken,
    /// Falling through deoptimizes
    OnFallthrough,
}

/// One compiled operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MOp {
    /// Do nothing
    Nop,
    /// Load a literal
    LoadConst {
        /// Destination
        dst: Slot,
        /// Literal
        value: Const,
    },
    /// Copy a slot
    Move {
        /// Destination
        dst: Slot,
        /// Source
        src: Slot,
    },
    /// `acc = acc op rhs`
    IntArith {
        /// Operator
        op: ArithOp,
        /// Right operand
        rhs: Slot,
        /// Speculate integer operands without overflow; deoptimize otherwise
        guard: bool,
    },
    /// `acc = acc op rhs`
    Compare {
        /// Operator
        op: CmpOp,
        /// Right operand
        rhs: Slot,
    },
    /// Unconditional jump
    Jump {
        /// Target pc
        target: u32,
    },
    /// Conditional jump on the accumulator
    Branch {
        /// Target pc
        target: u32,
        /// Jump when the accumulator is zero (otherwise when non-zero)
        if_zero: bool,
        /// Outcome that was never observed
        trap: BranchTrap,
    },
    /// Statically bound call
    CallStatic {
        /// Callee
        method: MethodId,
        /// Argument slots
        args: Vec<Slot>,
    },
    /// Virtual call with full dispatch
    CallVirtual {
        /// Declared method
        method: MethodId,
        /// Argument slots, receiver first
        args: Vec<Slot>,
    },
    /// Virtual call speculated monomorphic
    CallGuarded {
        /// Declared method
        method: MethodId,
        /// Receiver class the call site has always seen
        expected: ClassId,
        /// Target for that class
        target: MethodId,
        /// Argument slots, receiver first
        args: Vec<Slot>,
    },
    /// Intrinsic call
    CallIntrinsic {
        /// Intrinsic
        id: IntrinsicId,
        /// Argument slots
        args: Vec<Slot>,
    },
    /// Allocate into the accumulator
    NewObject {
        /// Class to instantiate
        class: ClassId,
    },
    /// Type check of the accumulator
    CheckCast {
        /// Required class
        class: ClassId,
        /// Deoptimize on failure instead of throwing
        guard: bool,
    },
    /// Throw the accumulator
    Throw,
    /// Return the accumulator
    Return,
}

impl MOp {
    /// Reason a failing guard on this operation reports, if it has a guard
    pub fn guard_reason(&self) -> Option<DeoptReason> {
        match self {
            MOp::IntArith { guard: true, .. } => Some(DeoptReason::TypeGuard),
            MOp::Branch { trap, .. } if *trap != BranchTrap::None => Some(DeoptReason::UncommonTrap),
            MOp::CallGuarded { .. } => Some(DeoptReason::InlineCacheMiss),
            MOp::CheckCast { guard: true, .. } => Some(DeoptReason::BadCast),
            _ => None,
        }
    }
}

/// A pc where compiled code may leave for the interpreter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeoptPoint {
    /// Position of the guard
    pub pc: u32,
    /// What the guard checks
    pub reason: DeoptReason,
}

/// A protected range of compiled code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerEntry {
    /// First protected pc
    pub start: u32,
    /// One past the last protected pc
    pub end: u32,
    /// Handler pc
    pub handler: u32,
    /// Caught class; `None` catches everything
    pub catch_class: Option<ClassId>,
}

/// Where a compiled body came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeOrigin {
    /// Compiled at run time
    Jit,
    /// Loaded from an AOT image
    Aot,
}

/// A compiled method.
///
/// Shared through `Arc` between the method's entry and every frame still
/// executing it, so code replaced or cleared by deoptimization stays alive
/// until its last frame returns.
#[derive(Debug, Serialize, Deserialize)]
pub struct CompiledCode {
    /// Method this code implements
    pub method: MethodId,
    /// Operations, one per bytecode instruction
    pub ops: Vec<MOp>,
    /// Size of the slot array, accumulator included
    pub slot_count: u16,
    /// Where each bytecode register lives
    pub frame_mapping: FrameMapping,
    /// Every guard, sorted by pc
    pub deopt_points: Vec<DeoptPoint>,
    /// Exception handlers, innermost first
    pub handlers: Vec<HandlerEntry>,
    /// Loop headers compiled code can be entered at
    pub osr_entries: Vec<OSREntry>,
    /// Write barrier shape the code was generated for
    pub barrier: BarrierKind,
    /// Provenance
    pub origin: CodeOrigin,
    #[serde(skip)]
    invalidated: AtomicBool,
    #[serde(skip)]
    intrinsic_table: Option<Arc<[u64]>>,
}

impl CompiledCode {
    /// Assemble a compiled body
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        method: MethodId,
        ops: Vec<MOp>,
        slot_count: u16,
        frame_mapping: FrameMapping,
        handlers: Vec<HandlerEntry>,
        osr_entries: Vec<OSREntry>,
        barrier: BarrierKind,
        origin: CodeOrigin,
    ) -> Self {
        let deopt_points = ops
            .iter()
            .enumerate()
            .filter_map(|(pc, op)| {
                op.guard_reason().map(|reason| DeoptPoint {
                    pc: pc as u32,
                    reason,
                })
            })
            .collect();
        Self {
            method,
            ops,
            slot_count,
            frame_mapping,
            deopt_points,
            handlers,
            osr_entries,
            barrier,
            origin,
            invalidated: AtomicBool::new(false),
            intrinsic_table: None,
        }
    }

    /// Operation at `pc`
    pub fn op(&self, pc: u32) -> &MOp {
        &self.ops[pc as usize]
    }

    /// Mark the code as no longer valid.
    ///
    /// Frames already running it finish their current operation and leave
    /// for the interpreter at the next return into them.
    pub fn invalidate(&self) {
        self.invalidated.store(true, Ordering::Release);
    }

    /// Whether the code has been invalidated
    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::Acquire)
    }

    /// Route intrinsic calls through a patched image table
    pub fn set_intrinsic_table(&mut self, table: Arc<[u64]>) {
        self.intrinsic_table = Some(table);
    }

    /// Intrinsic table the code calls through, for image-backed code
    pub fn intrinsic_table(&self) -> Option<&[u64]> {
        self.intrinsic_table.as_deref()
    }

    /// Innermost handler covering `pc` whose class is accepted by `catches`
    pub fn handler_for(&self, pc: u32, catches: impl Fn(Option<ClassId>) -> bool) -> Option<u32> {
        self.handlers
            .iter()
            .find(|h| h.start <= pc && pc < h.end && catches(h.catch_class))
            .map(|h| h.handler)
    }

    /// OSR entry at a loop header
    pub fn osr_entry(&self, bytecode_offset: u32) -> Option<&OSREntry> {
        self.osr_entries
            .iter()
            .find(|entry| entry.bytecode_offset == bytecode_offset)
    }

    /// Number of guards
    pub fn guard_count(&self) -> usize {
        self.deopt_points.len()
    }

    /// Approximate in-memory size, for statistics
    pub fn code_size(&self) -> usize {
        self.ops.len() * std::mem::size_of::<MOp>()
    }
}
