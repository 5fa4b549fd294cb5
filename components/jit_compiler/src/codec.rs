//! Serialized form of compiled code
//!
//! AOT images carry compiled bodies in their code region. A body is a short
//! magic prefix followed by the bincode encoding of [`CompiledCode`].

use crate::code::{CodeOrigin, CompiledCode};
use thiserror::Error;

/// Prefix of every encoded body
pub const CODE_MAGIC: [u8; 4] = *b"TVMC";

/// Errors decoding or encoding a compiled body
#[derive(Debug, Error)]
pub enum CodecError {
    /// The bytes do not start with [`CODE_MAGIC`]
    #[error("not a compiled code blob")]
    BadMagic,

    /// bincode rejected the payload
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

/// Encode a compiled body
pub fn encode(code: &CompiledCode) -> Result<Vec<u8>, CodecError> {
    let mut out = CODE_MAGIC.to_vec();
    bincode::serialize_into(&mut out, code)?;
    Ok(out)
}

/// Decode a compiled body; the result is marked as AOT code
pub fn decode(bytes: &[u8]) -> Result<CompiledCode, CodecError> {
    let payload = bytes
        .strip_prefix(&CODE_MAGIC[..])
        .ok_or(CodecError::BadMagic)?;
    let mut code: CompiledCode = bincode::deserialize(payload)?;
    code.origin = CodeOrigin::Aot;
    Ok(code)
}
