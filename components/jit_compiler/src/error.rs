//! Compilation errors.

use bytecode_system::ChunkError;
use thiserror::Error;

/// Why a method could not be compiled.
///
/// A non-OSR compilation failing with any of these leaves the method
/// permanently interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The method has no instructions
    #[error("cannot compile empty method")]
    EmptyMethod,

    /// The method exceeds the configured size limit
    #[error("method has {size} instructions, limit is {limit}")]
    TooLarge {
        /// Instruction count
        size: usize,
        /// Configured limit
        limit: usize,
    },

    /// A task arena ran out of space
    #[error("{arena} arena exhausted: requested {requested} bytes, {remaining} remaining")]
    ArenaExhausted {
        /// Which arena
        arena: &'static str,
        /// Bytes requested
        requested: usize,
        /// Bytes left
        remaining: usize,
    },

    /// The global arena budget is used up by other tasks
    #[error("arena budget exhausted: {requested} bytes requested, {available} available")]
    BudgetExhausted {
        /// Bytes requested
        requested: usize,
        /// Bytes available
        available: usize,
    },

    /// The bytecode is structurally broken
    #[error("invalid bytecode: {0}")]
    InvalidBytecode(#[from] ChunkError),

    /// An OSR compilation found no entry at the requested loop header
    #[error("no OSR entry at @{0}")]
    NoOsrEntry(u32),

    /// Any other backend failure
    #[error("backend error: {0}")]
    Backend(String),
}
