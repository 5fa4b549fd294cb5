//! Compilation arenas and global arena accounting.
//!
//! Every compilation task owns two bump arenas: a general one for the code
//! being produced and a local one for per-pass scratch data. Their capacity is
//! reserved against a process-wide [`MemoryStats`] budget when the task is
//! created and returned when the arenas are dropped, whichever way the task
//! ends.

use crate::error::CompileError;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Global arena accounting shared by all compilation tasks
#[derive(Debug)]
pub struct MemoryStats {
    budget: usize,
    reserved: AtomicUsize,
    peak: AtomicUsize,
    arenas_created: AtomicU64,
}

impl MemoryStats {
    /// Accounting with a total budget in bytes
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            reserved: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            arenas_created: AtomicU64::new(0),
        }
    }

    /// Bytes currently reserved by live arenas
    pub fn reserved(&self) -> usize {
        self.reserved.load(Ordering::Acquire)
    }

    /// Highest reservation seen
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }

    /// Arenas created so far
    pub fn arenas_created(&self) -> u64 {
        self.arenas_created.load(Ordering::Relaxed)
    }

    /// Total budget
    pub fn budget(&self) -> usize {
        self.budget
    }
}

/// A bump arena with a fixed capacity
#[derive(Debug)]
pub struct CompilationArena {
    name: &'static str,
    capacity: usize,
    used: usize,
}

impl CompilationArena {
    fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity,
            used: 0,
        }
    }

    /// Claim `bytes` from the arena
    pub fn alloc(&mut self, bytes: usize) -> Result<(), CompileError> {
        let remaining = self.capacity - self.used;
        if bytes > remaining {
            return Err(CompileError::ArenaExhausted {
                arena: self.name,
                requested: bytes,
                remaining,
            });
        }
        self.used += bytes;
        Ok(())
    }

    /// Bytes claimed so far
    pub fn used(&self) -> usize {
        self.used
    }

    /// Capacity in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Forget all claims
    pub fn reset(&mut self) {
        self.used = 0;
    }
}

/// The two arenas owned by one compilation task
#[derive(Debug)]
pub struct TaskArenas {
    /// Holds the compiled code being built
    pub general: CompilationArena,
    /// Holds per-pass scratch data
    pub local: CompilationArena,
    stats: Arc<MemoryStats>,
    reservation: usize,
}

impl TaskArenas {
    /// Reserve a general and a local arena of `arena_size` bytes each
    /// against the global budget
    pub fn allocate(stats: &Arc<MemoryStats>, arena_size: usize) -> Result<TaskArenas, CompileError> {
        let requested = arena_size * 2;
        let mut current = stats.reserved.load(Ordering::Relaxed);
        loop {
            let available = stats.budget.saturating_sub(current);
            if requested > available {
                return Err(CompileError::BudgetExhausted {
                    requested,
                    available,
                });
            }
            match stats.reserved.compare_exchange_weak(
                current,
                current + requested,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        stats.peak.fetch_max(current + requested, Ordering::Relaxed);
        stats.arenas_created.fetch_add(2, Ordering::Relaxed);
        Ok(TaskArenas {
            general: CompilationArena::new("general", arena_size),
            local: CompilationArena::new("local", arena_size),
            stats: Arc::clone(stats),
            reservation: requested,
        })
    }

    /// Return the reservation to the global budget
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for TaskArenas {
    fn drop(&mut self) {
        self.stats
            .reserved
            .fetch_sub(self.reservation, Ordering::AcqRel);
    }
}
