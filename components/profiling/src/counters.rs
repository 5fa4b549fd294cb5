//! Branch and throw counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Taken/not-taken counts for one conditional branch
#[derive(Debug)]
pub struct BranchCounter {
    pc: u32,
    taken: AtomicU64,
    not_taken: AtomicU64,
}

impl BranchCounter {
    /// Create a zeroed counter for the branch at `pc`
    pub fn new(pc: u32) -> Self {
        Self {
            pc,
            taken: AtomicU64::new(0),
            not_taken: AtomicU64::new(0),
        }
    }

    /// Instruction index of the branch
    pub fn pc(&self) -> u32 {
        self.pc
    }

    /// Record one outcome
    pub fn record(&self, taken: bool) {
        let counter = if taken { &self.taken } else { &self.not_taken };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Times the branch was taken
    pub fn taken(&self) -> u64 {
        self.taken.load(Ordering::Relaxed)
    }

    /// Times the branch fell through
    pub fn not_taken(&self) -> u64 {
        self.not_taken.load(Ordering::Relaxed)
    }

    /// Total recorded outcomes
    pub fn total(&self) -> u64 {
        self.taken() + self.not_taken()
    }
}

/// Execution count for one throw instruction
#[derive(Debug)]
pub struct ThrowCounter {
    pc: u32,
    count: AtomicU64,
}

impl ThrowCounter {
    /// Create a zeroed counter for the throw at `pc`
    pub fn new(pc: u32) -> Self {
        Self {
            pc,
            count: AtomicU64::new(0),
        }
    }

    /// Instruction index of the throw
    pub fn pc(&self) -> u32 {
        self.pc
    }

    /// Record one throw
    pub fn record(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Times the instruction threw
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}
