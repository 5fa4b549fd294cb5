//! The outer container: magic plus an exported-symbol table.

use crate::error::LoadError;
use crate::format::{Reader, CONTAINER_MAGIC, SYM_AOT, SYM_AOT_END, SYM_CODE, SYM_CODE_END};
use std::collections::BTreeMap;

/// Exported symbols of a container, by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    symbols: BTreeMap<String, u64>,
}

impl SymbolTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Define or redefine a symbol
    pub fn insert(&mut self, name: impl Into<String>, offset: u64) {
        self.symbols.insert(name.into(), offset);
    }

    /// Remove a symbol
    pub fn remove(&mut self, name: &str) {
        self.symbols.remove(name);
    }

    /// Look up a symbol
    pub fn get(&self, name: &str) -> Option<u64> {
        self.symbols.get(name).copied()
    }

    /// Number of symbols
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Serialized size of the container prefix holding this table
    pub fn encoded_len(&self) -> usize {
        CONTAINER_MAGIC.len()
            + 4
            + self
                .symbols
                .keys()
                .map(|name| 1 + name.len() + 8)
                .sum::<usize>()
    }

    /// Write the container prefix
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&CONTAINER_MAGIC);
        out.extend_from_slice(&(self.symbols.len() as u32).to_le_bytes());
        for (name, offset) in &self.symbols {
            out.push(name.len() as u8);
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
        }
    }

    /// Parse the container prefix of `bytes`
    pub fn parse(bytes: &[u8]) -> Result<Self, LoadError> {
        let mut reader = Reader::new(bytes);
        let magic = reader
            .take(CONTAINER_MAGIC.len())
            .ok_or_else(|| LoadError::malformed("file too short for container magic"))?;
        if magic != CONTAINER_MAGIC {
            return Err(LoadError::malformed("not an image container"));
        }
        let count = reader
            .u32()
            .ok_or_else(|| LoadError::malformed("truncated symbol count"))?;
        let mut table = SymbolTable::new();
        for index in 0..count {
            let truncated = || LoadError::malformed(format!("truncated symbol {}", index));
            let len = reader.u8().ok_or_else(truncated)? as usize;
            let name = reader.take(len).ok_or_else(truncated)?;
            let name = std::str::from_utf8(name)
                .map_err(|_| LoadError::malformed(format!("symbol {} is not UTF-8", index)))?;
            let offset = reader.u64().ok_or_else(truncated)?;
            table.insert(name, offset);
        }
        Ok(table)
    }
}

/// The four mandatory symbols, checked against each other and the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Regions {
    /// Start of metadata
    pub aot: usize,
    /// End of metadata, start of the data section
    pub aot_end: usize,
    /// Start of code, end of the data section
    pub code: usize,
    /// End of code
    pub code_end: usize,
}

impl Regions {
    /// Resolve and validate the mandatory symbols.
    ///
    /// This runs before any header field is read, so a broken symbol table is
    /// always reported as such and never as a header mismatch.
    pub fn resolve(symbols: &SymbolTable, file_len: usize) -> Result<Self, LoadError> {
        let lookup = |name: &'static str| {
            symbols
                .get(name)
                .ok_or(LoadError::MissingSymbol(name))
        };
        let aot = lookup(SYM_AOT)?;
        let aot_end = lookup(SYM_AOT_END)?;
        let code = lookup(SYM_CODE)?;
        let code_end = lookup(SYM_CODE_END)?;

        if code_end < code {
            return Err(LoadError::invalid_symbols(format!(
                "code_end {:#x} precedes code {:#x}",
                code_end, code
            )));
        }
        if aot_end <= aot {
            return Err(LoadError::invalid_symbols("empty metadata region"));
        }
        if code < aot_end {
            return Err(LoadError::invalid_symbols("negative data section"));
        }
        if code_end > file_len as u64 {
            return Err(LoadError::invalid_symbols(format!(
                "code_end {:#x} beyond end of file ({:#x} bytes)",
                code_end, file_len
            )));
        }
        Ok(Self {
            aot: aot as usize,
            aot_end: aot_end as usize,
            code: code as usize,
            code_end: code_end as usize,
        })
    }

    /// Size of the data section in bytes
    pub fn data_len(&self) -> usize {
        self.code - self.aot_end
    }
}
