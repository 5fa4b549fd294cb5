//! Bytecode chunk - a method's executable body
//!
//! Contains the instruction stream, frame shape and try-block table. The
//! instruction index is the program counter used everywhere else in the
//! engine: profiling keys, handler ranges, deoptimization points and OSR
//! entries all speak in instruction indices.

use crate::opcode::{Opcode, RegisterId};
use core_types::ClassId;
use std::fmt::Write as _;
use thiserror::Error;

/// A protected instruction range with its handler.
///
/// Blocks are searched in declaration order, so nested blocks must be added
/// before the blocks enclosing them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TryBlock {
    /// First protected instruction
    pub start: u32,
    /// One past the last protected instruction
    pub end: u32,
    /// Handler entry point
    pub handler: u32,
    /// Class caught by the handler; `None` catches everything
    pub catch_class: Option<ClassId>,
}

impl TryBlock {
    /// Whether the block protects the given instruction
    pub fn covers(&self, pc: u32) -> bool {
        self.start <= pc && pc < self.end
    }
}

/// Structural problems found by [`BytecodeChunk::validate`] and
/// [`BytecodeChunk::check_operands`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkError {
    /// The chunk has no instructions
    #[error("chunk has no instructions")]
    Empty,
    /// A register operand is outside the register file
    #[error("register r{register} out of range at @{pc}")]
    RegisterOutOfRange {
        /// Offending instruction
        pc: u32,
        /// Offending register
        register: u16,
    },
    /// A jump lands outside the instruction stream
    #[error("jump target @{target} out of range at @{pc}")]
    JumpOutOfRange {
        /// Offending instruction
        pc: u32,
        /// Offending target
        target: u32,
    },
    /// More arguments than registers
    #[error("{args} arguments do not fit in {registers} registers")]
    ArgumentsExceedRegisters {
        /// Declared argument count
        args: u16,
        /// Declared register count
        registers: u16,
    },
    /// A try block range or handler lies outside the instruction stream
    #[error("try block {index} out of range")]
    TryBlockOutOfRange {
        /// Index in the try-block table
        index: usize,
    },
    /// The last instruction can fall through past the end
    #[error("control falls off the end of the chunk")]
    FallsOffEnd,
}

/// A method's bytecode
#[derive(Debug, Clone, PartialEq)]
pub struct BytecodeChunk {
    /// Sequence of bytecode instructions
    pub instructions: Vec<Opcode>,
    /// Number of registers needed for execution
    pub register_count: u16,
    /// Number of leading registers filled from call arguments
    pub arg_count: u16,
    /// Exception handler table
    pub try_blocks: Vec<TryBlock>,
}

impl BytecodeChunk {
    /// Create a new empty bytecode chunk
    pub fn new(register_count: u16, arg_count: u16) -> Self {
        Self {
            instructions: Vec::new(),
            register_count,
            arg_count,
            try_blocks: Vec::new(),
        }
    }

    /// Emit an instruction and return its index
    pub fn emit(&mut self, opcode: Opcode) -> u32 {
        let pc = self.instructions.len() as u32;
        self.instructions.push(opcode);
        pc
    }

    /// Index the next emitted instruction will get
    pub fn next_pc(&self) -> u32 {
        self.instructions.len() as u32
    }

    /// Retarget the jump at `pc`
    ///
    /// # Panics
    ///
    /// Panics if the instruction at `pc` is not a jump.
    pub fn patch_jump(&mut self, pc: u32, target: u32) {
        match &mut self.instructions[pc as usize] {
            Opcode::Jmp(t) | Opcode::Jeqz(t) | Opcode::Jnez(t) => *t = target,
            other => panic!("patch_jump on non-jump instruction {} at @{}", other, pc),
        }
    }

    /// Register a try block
    pub fn add_try_block(&mut self, block: TryBlock) {
        self.try_blocks.push(block);
    }

    /// Instruction at `pc`
    pub fn get(&self, pc: u32) -> Option<&Opcode> {
        self.instructions.get(pc as usize)
    }

    /// Get the number of instructions
    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// Try blocks protecting `pc`, innermost first
    pub fn try_blocks_covering(&self, pc: u32) -> impl Iterator<Item = &TryBlock> {
        self.try_blocks.iter().filter(move |block| block.covers(pc))
    }

    /// Targets of backward jumps, sorted and deduplicated.
    ///
    /// These are the loop headers where an interpreted frame may transfer
    /// into compiled code.
    pub fn loop_headers(&self) -> Vec<u32> {
        let mut headers: Vec<u32> = self
            .instructions
            .iter()
            .enumerate()
            .filter_map(|(pc, op)| op.jump_target().filter(|target| *target as usize <= pc))
            .collect();
        headers.sort_unstable();
        headers.dedup();
        headers
    }

    /// Check the chunk is structurally executable.
    ///
    /// This is not a verifier: operand types are still checked at run time.
    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.instructions.is_empty() {
            return Err(ChunkError::Empty);
        }
        self.check_operands()?;
        if let Some(last) = self.instructions.last() {
            if !last.ends_block() {
                return Err(ChunkError::FallsOffEnd);
            }
        }
        Ok(())
    }

    /// Check every operand stays inside the chunk.
    ///
    /// Weaker than [`validate`](Self::validate): empty chunks and chunks
    /// that run off their end are accepted, since the interpreter returns
    /// the accumulator there.
    pub fn check_operands(&self) -> Result<(), ChunkError> {
        if self.arg_count > self.register_count {
            return Err(ChunkError::ArgumentsExceedRegisters {
                args: self.arg_count,
                registers: self.register_count,
            });
        }
        let len = self.instructions.len() as u32;
        for (pc, op) in self.instructions.iter().enumerate() {
            let pc = pc as u32;
            if let Some(RegisterId(register)) = op.register() {
                if register >= self.register_count {
                    return Err(ChunkError::RegisterOutOfRange { pc, register });
                }
            }
            if let Some(args) = op.args() {
                if args.registers().end > self.register_count as usize {
                    return Err(ChunkError::RegisterOutOfRange {
                        pc,
                        register: args.first.0.saturating_add(args.count),
                    });
                }
            }
            if let Some(target) = op.jump_target() {
                if target >= len {
                    return Err(ChunkError::JumpOutOfRange { pc, target });
                }
            }
        }
        for (index, block) in self.try_blocks.iter().enumerate() {
            if block.start >= block.end || block.end > len || block.handler >= len {
                return Err(ChunkError::TryBlockOutOfRange { index });
            }
        }
        Ok(())
    }

    /// Human-readable listing, one instruction per line
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        for (pc, op) in self.instructions.iter().enumerate() {
            let _ = writeln!(out, "{:4}: {}", pc, op);
        }
        for block in &self.try_blocks {
            let class = block
                .catch_class
                .map(|c| c.to_string())
                .unwrap_or_else(|| "any".to_string());
            let _ = writeln!(
                out,
                "  try [{}, {}) -> @{} catch {}",
                block.start, block.end, block.handler, class
            );
        }
        out
    }
}
