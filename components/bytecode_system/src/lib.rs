//! Bytecode system for the tiered execution engine
//!
//! This crate provides the small accumulator instruction set both tiers
//! execute, the chunk container that carries a method's instructions and
//! try-block table, and the site scan the profiling store is sized from.
//!
//! # Features
//!
//! - Accumulator-based bytecode with a per-frame register file
//! - Absolute jump targets expressed as instruction indices
//! - Try-block tables for exception dispatch
//! - Structural validation and loop-header discovery
//!
//! # Example
//!
//! ```
//! use bytecode_system::{BytecodeChunk, Opcode, RegisterId};
//!
//! let mut chunk = BytecodeChunk::new(1, 1);
//!
//! // acc = r0 * r0
//! chunk.emit(Opcode::Lda(RegisterId(0)));
//! chunk.emit(Opcode::Mul(RegisterId(0)));
//! chunk.emit(Opcode::Return);
//!
//! assert!(chunk.validate().is_ok());
//! assert_eq!(chunk.instruction_count(), 3);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunk;
pub mod opcode;
pub mod sites;

// Re-export main types at crate root
pub use chunk::{BytecodeChunk, ChunkError, TryBlock};
pub use opcode::{ArgRange, Opcode, RegisterId};
pub use sites::ProfileSites;
