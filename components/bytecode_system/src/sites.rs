//! Profiling site discovery.
//!
//! A method's profiling record has one entry per virtual call, conditional
//! branch and throw. The tables are built once from a full scan so that every
//! later lookup is a binary search over a fixed, sorted key set.

use crate::chunk::BytecodeChunk;
use crate::opcode::Opcode;

/// Sorted instruction indices of every profiled site in a chunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileSites {
    /// Virtual call sites (inline caches)
    pub calls: Vec<u32>,
    /// Conditional branches
    pub branches: Vec<u32>,
    /// Throw instructions
    pub throws: Vec<u32>,
}

impl ProfileSites {
    /// Scan a chunk for profiled sites
    pub fn scan(chunk: &BytecodeChunk) -> Self {
        let mut sites = ProfileSites::default();
        for (pc, op) in chunk.instructions.iter().enumerate() {
            let pc = pc as u32;
            match op {
                Opcode::CallVirtual { .. } => sites.calls.push(pc),
                Opcode::Jeqz(_) | Opcode::Jnez(_) => sites.branches.push(pc),
                Opcode::Throw => sites.throws.push(pc),
                _ => {}
            }
        }
        sites
    }

    /// Whether the chunk has nothing to profile
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty() && self.branches.is_empty() && self.throws.is_empty()
    }
}
