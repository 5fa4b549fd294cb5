//! Runtime construction and management errors.

use aot_loader::LoadError;
use bytecode_system::ChunkError;
use core_types::{ClassId, MethodId};
use jit_compiler::{CodecError, CompileError};
use thiserror::Error;

/// Errors from building, configuring or managing a runtime.
///
/// Managed exceptions are not `VmError`s; they come back from
/// `Runtime::invoke` as [`core_types::ManagedException`].
#[derive(Debug, Error)]
pub enum VmError {
    /// Options are inconsistent
    #[error("invalid runtime options: {0}")]
    InvalidOptions(String),

    /// A JSON configuration could not be parsed
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// A class id was defined twice
    #[error("{0} is already defined")]
    DuplicateClass(ClassId),

    /// A method id was defined twice
    #[error("{0} is already defined")]
    DuplicateMethod(MethodId),

    /// A class was referenced before its definition
    #[error("{0} is not defined")]
    UnknownClass(ClassId),

    /// A method was referenced before its definition
    #[error("{0} is not defined")]
    UnknownMethod(MethodId),

    /// A method's bytecode refers outside its own chunk
    #[error("invalid bytecode for {method}: {source}")]
    InvalidChunk {
        /// Method being defined
        method: MethodId,
        /// What is wrong with it
        source: ChunkError,
    },

    /// An AOT image failed to load
    #[error("AOT image error: {0}")]
    Image(#[from] LoadError),

    /// Ahead-of-time compilation of a method failed
    #[error("cannot compile {method}: {source}")]
    Compile {
        /// Method that failed
        method: MethodId,
        /// Why
        source: CompileError,
    },

    /// Compiled code could not be serialized
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A compiler thread could not be started
    #[error("failed to spawn compiler thread: {0}")]
    Spawn(#[source] std::io::Error),
}
