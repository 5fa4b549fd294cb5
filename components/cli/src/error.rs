//! Error types for the CLI

use aot_loader::LoadError;
use core_types::{ManagedException, MethodId, Value};
use execution_engine::VmError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Debug, Error)]
pub enum CliError {
    /// File I/O error
    #[error("file error: {0}")]
    Io(#[from] std::io::Error),

    /// The image could not be read
    #[error("image error: {0}")]
    Image(#[from] LoadError),

    /// Runtime creation or image building failed
    #[error("runtime error: {0}")]
    Vm(#[from] VmError),

    /// Managed code threw and nothing caught it
    #[error("uncaught exception: {0}")]
    Managed(#[from] ManagedException),

    /// JSON output or configuration error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The demo computed a wrong value
    #[error("{method} returned {actual}, expected {expected}")]
    WrongResult {
        /// Method that was called
        method: MethodId,
        /// Value computed natively
        expected: Value,
        /// Value the VM returned
        actual: Value,
    },
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
