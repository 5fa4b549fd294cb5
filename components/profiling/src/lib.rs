//! Per-method runtime feedback for the compiled tier
//!
//! A [`ProfilingRecord`] is attached to a method the first time its hotness
//! counter expires and is read by the baseline compiler when the method is
//! compiled. It holds three offset-sorted tables:
//!
//! - inline caches at virtual call sites, recording receiver classes
//! - taken/not-taken counters at conditional branches
//! - counters at throw instructions
//!
//! Every update is lock-free, so any number of interpreter threads may record
//! feedback into the same record concurrently.
//!
//! # Example
//!
//! ```
//! use bytecode_system::{ArgRange, BytecodeChunk, Opcode, ProfileSites};
//! use core_types::{ClassId, MethodId};
//! use profiling::{CallSiteKind, ProfilingRecord};
//!
//! let mut chunk = BytecodeChunk::new(1, 1);
//! chunk.emit(Opcode::CallVirtual { method: MethodId(1), args: ArgRange::new(0, 1) });
//! chunk.emit(Opcode::Return);
//!
//! let record = ProfilingRecord::new(&ProfileSites::scan(&chunk));
//! record.update_inline_cache(0, ClassId(20));
//! assert_eq!(record.classify(0), CallSiteKind::Monomorphic);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod counters;
pub mod inline_cache;
pub mod record;

pub use counters::{BranchCounter, ThrowCounter};
pub use inline_cache::{CallSiteKind, InlineCache, INLINE_CACHE_CAPACITY};
pub use record::{BranchSnapshot, CallSiteSnapshot, ProfileSnapshot, ProfilingRecord};
