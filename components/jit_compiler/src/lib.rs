//! Compiled tier of the execution engine
//!
//! This crate provides:
//! - Baseline JIT: one compiled operation per bytecode instruction, with
//!   guarded fast paths chosen from profiling feedback
//! - Task arenas: bounded memory per compilation under a global budget
//! - OSR: entering compiled code at loop headers
//! - Deoptimization: rebuilding interpreter frames when speculation fails
//! - Codec: the serialized form AOT images carry
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use bytecode_system::{BytecodeChunk, Opcode};
//! use core_types::{ClassId, DefaultBarrierSet, GcKind, MethodId};
//! use jit_compiler::{
//!     BaselineJIT, CompileRequest, CompilerConfig, Deoptimizer, MemoryStats, TaskArenas,
//!     VirtualResolver,
//! };
//!
//! struct Unresolved;
//! impl VirtualResolver for Unresolved {
//!     fn resolve_virtual(&self, _: MethodId, _: ClassId) -> Option<MethodId> {
//!         None
//!     }
//! }
//!
//! let mut chunk = BytecodeChunk::new(0, 0);
//! chunk.emit(Opcode::LdaInt(42));
//! chunk.emit(Opcode::Return);
//!
//! let jit = BaselineJIT::new(CompilerConfig::default());
//! let stats = Arc::new(MemoryStats::new(1 << 20));
//! let mut arenas = TaskArenas::allocate(&stats, 4096).unwrap();
//! let history = Deoptimizer::new();
//! let barriers = DefaultBarrierSet::new(GcKind::Generational);
//! let request = CompileRequest {
//!     method: MethodId(1),
//!     chunk: &chunk,
//!     profile: None,
//!     history: &history,
//!     osr_pc: None,
//!     barriers: &barriers,
//!     resolver: &Unresolved,
//! };
//! let code = jit.compile(&request, &mut arenas).unwrap();
//! assert_eq!(code.ops.len(), 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arena;
pub mod baseline;
pub mod code;
pub mod codec;
pub mod deopt;
pub mod error;
pub mod osr;

// Re-export main types at crate root
pub use arena::{CompilationArena, MemoryStats, TaskArenas};
pub use baseline::{BaselineJIT, BaselineStats, CompileRequest, CompilerConfig, VirtualResolver};
pub use code::{
    BranchTrap, CodeOrigin, CompiledCode, Const, DeoptPoint, HandlerEntry, MOp, Slot,
};
pub use codec::{decode, encode, CodecError, CODE_MAGIC};
pub use deopt::{DeoptInfo, DeoptReason, Deoptimizer, InterpreterState};
pub use error::CompileError;
pub use osr::{FrameMapping, OSREntry, RegisterLocation};
