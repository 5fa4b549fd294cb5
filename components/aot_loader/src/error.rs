//! Image loading errors.

use std::io;
use thiserror::Error;

/// Why an AOT image could not be loaded or patched.
///
/// All of these are recoverable: the runtime logs them and continues without
/// the image.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Reading the file failed
    #[error("failed to read image: {0}")]
    Io(#[from] io::Error),

    /// The container or a table inside it could not be parsed
    #[error("malformed image: {0}")]
    Malformed(String),

    /// A mandatory exported symbol is absent
    #[error("missing symbol `{0}`")]
    MissingSymbol(&'static str),

    /// Symbol values are inconsistent with each other or the file
    #[error("invalid symbols: {0}")]
    InvalidSymbols(String),

    /// The metadata header does not start with the image magic
    #[error("bad magic {found:#010x}")]
    BadMagic {
        /// Magic found in the header
        found: u32,
    },

    /// The image format version is not supported
    #[error("unsupported image version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version found in the header
        found: u32,
        /// Version this loader reads
        expected: u32,
    },

    /// The image was built for a different environment
    #[error("environment checksum mismatch: image {image:#018x}, runtime {runtime:#018x}")]
    ChecksumMismatch {
        /// Checksum recorded in the image
        image: u64,
        /// Checksum of the running process
        runtime: u64,
    },

    /// The image was built for a different collector
    #[error("image built for {image} collector, runtime configured for {runtime}")]
    GcKindMismatch {
        /// Collector recorded in the image
        image: String,
        /// Collector the runtime is configured for
        runtime: String,
    },
}

impl LoadError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        LoadError::Malformed(message.into())
    }

    pub(crate) fn invalid_symbols(message: impl Into<String>) -> Self {
        LoadError::InvalidSymbols(message.into())
    }
}
