//! Bytecode opcodes for the tiered execution engine
//!
//! Defines the accumulator instruction set. Binary operators combine the
//! accumulator with a register operand and leave the result in the
//! accumulator. Jump targets are absolute instruction indices.

use core_types::{ClassId, IntrinsicId, MethodId};
use std::fmt;

/// Register identifier for a slot of the frame's register file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegisterId(pub u16);

impl RegisterId {
    /// Register index as usize
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A contiguous run of registers passed as call arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArgRange {
    /// First argument register
    pub first: RegisterId,
    /// Number of arguments
    pub count: u16,
}

impl ArgRange {
    /// Create a new argument range
    pub fn new(first: u16, count: u16) -> Self {
        Self {
            first: RegisterId(first),
            count,
        }
    }

    /// Empty argument list
    pub fn empty() -> Self {
        Self::new(0, 0)
    }

    /// Register indices covered by the range
    pub fn registers(&self) -> std::ops::Range<usize> {
        let first = self.first.index();
        first..first + self.count as usize
    }
}

/// Bytecode opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Do nothing
    Nop,

    // Accumulator loads and stores
    /// Load an integer literal
    LdaInt(i64),
    /// Load a boolean literal
    LdaBool(bool),
    /// Load null
    LdaNull,
    /// Load a register
    Lda(RegisterId),
    /// Store the accumulator into a register
    Sta(RegisterId),

    // Arithmetic: acc = acc op reg
    /// Wrapping addition
    Add(RegisterId),
    /// Wrapping subtraction
    Sub(RegisterId),
    /// Wrapping multiplication
    Mul(RegisterId),
    /// Truncating division; zero divisor throws
    Div(RegisterId),

    // Comparison: acc = acc op reg
    /// Signed less-than
    CmpLt(RegisterId),
    /// Equality
    CmpEq(RegisterId),

    // Control flow
    /// Unconditional jump
    Jmp(u32),
    /// Jump if the accumulator is zero, false or null
    Jeqz(u32),
    /// Jump if the accumulator is not zero
    Jnez(u32),

    // Calls
    /// Statically bound call
    Call {
        /// Callee
        method: MethodId,
        /// Argument registers
        args: ArgRange,
    },
    /// Virtual call dispatched on the class of the first argument
    CallVirtual {
        /// Declared method; its vtable slot selects the target
        method: MethodId,
        /// Argument registers, receiver first
        args: ArgRange,
    },
    /// Call a runtime intrinsic
    Intrinsic {
        /// Intrinsic to call
        id: IntrinsicId,
        /// Argument registers
        args: ArgRange,
    },

    // Objects and exceptions
    /// Allocate an instance of a class into the accumulator
    NewObject(ClassId),
    /// Check the accumulator is an instance of a class; throws otherwise
    CheckCast(ClassId),
    /// Throw the accumulator
    Throw,
    /// Return the accumulator
    Return,
}

impl Opcode {
    /// Jump target, if this is a jump
    pub fn jump_target(&self) -> Option<u32> {
        match self {
            Opcode::Jmp(target) | Opcode::Jeqz(target) | Opcode::Jnez(target) => Some(*target),
            _ => None,
        }
    }

    /// Whether this is a conditional branch
    pub fn is_branch(&self) -> bool {
        matches!(self, Opcode::Jeqz(_) | Opcode::Jnez(_))
    }

    /// Whether this instruction calls out of the method
    pub fn is_call(&self) -> bool {
        matches!(
            self,
            Opcode::Call { .. } | Opcode::CallVirtual { .. } | Opcode::Intrinsic { .. }
        )
    }

    /// Whether control never falls through to the next instruction
    pub fn ends_block(&self) -> bool {
        matches!(self, Opcode::Jmp(_) | Opcode::Throw | Opcode::Return)
    }

    /// Register operand of the instruction, if any
    pub fn register(&self) -> Option<RegisterId> {
        match self {
            Opcode::Lda(r)
            | Opcode::Sta(r)
            | Opcode::Add(r)
            | Opcode::Sub(r)
            | Opcode::Mul(r)
            | Opcode::Div(r)
            | Opcode::CmpLt(r)
            | Opcode::CmpEq(r) => Some(*r),
            _ => None,
        }
    }

    /// Argument registers of a call, if any
    pub fn args(&self) -> Option<ArgRange> {
        match self {
            Opcode::Call { args, .. }
            | Opcode::CallVirtual { args, .. }
            | Opcode::Intrinsic { args, .. } => Some(*args),
            _ => None,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opcode::Nop => write!(f, "nop"),
            Opcode::LdaInt(n) => write!(f, "lda.int {}", n),
            Opcode::LdaBool(b) => write!(f, "lda.bool {}", b),
            Opcode::LdaNull => write!(f, "lda.null"),
            Opcode::Lda(r) => write!(f, "lda r{}", r.0),
            Opcode::Sta(r) => write!(f, "sta r{}", r.0),
            Opcode::Add(r) => write!(f, "add r{}", r.0),
            Opcode::Sub(r) => write!(f, "sub r{}", r.0),
            Opcode::Mul(r) => write!(f, "mul r{}", r.0),
            Opcode::Div(r) => write!(f, "div r{}", r.0),
            Opcode::CmpLt(r) => write!(f, "cmp.lt r{}", r.0),
            Opcode::CmpEq(r) => write!(f, "cmp.eq r{}", r.0),
            Opcode::Jmp(t) => write!(f, "jmp @{}", t),
            Opcode::Jeqz(t) => write!(f, "jeqz @{}", t),
            Opcode::Jnez(t) => write!(f, "jnez @{}", t),
            Opcode::Call { method, args } => {
                write!(f, "call {} r{}+{}", method, args.first.0, args.count)
            }
            Opcode::CallVirtual { method, args } => {
                write!(f, "call.virtual {} r{}+{}", method, args.first.0, args.count)
            }
            Opcode::Intrinsic { id, args } => {
                write!(f, "intrinsic {} r{}+{}", id.name(), args.first.0, args.count)
            }
            Opcode::NewObject(class) => write!(f, "new {}", class),
            Opcode::CheckCast(class) => write!(f, "checkcast {}", class),
            Opcode::Throw => write!(f, "throw"),
            Opcode::Return => write!(f, "return"),
        }
    }
}
