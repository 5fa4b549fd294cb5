//! Method descriptors and the compilation state machine
//!
//! A [`Method`] is shared by every thread that runs it and by the compiler
//! worker compiling it. Its status moves through
//!
//! ```text
//! NOT_COMPILED -> WAITING -> COMPILATION -> COMPILED
//!                                        -> FAILED
//!                                        -> NOT_COMPILED   (OSR failure, stale result)
//! COMPILED -> NOT_COMPILED                                 (deoptimization only)
//! ```
//!
//! Every transition is a compare-and-swap; the compiled entry is published
//! and cleared under the entry lock.

use crate::events::{CompilationEvent, EventLog};
use bytecode_system::{BytecodeChunk, ProfileSites};
use core_types::{ClassId, MethodId};
use jit_compiler::{CompiledCode, DeoptReason, Deoptimizer};
use parking_lot::{Mutex, RwLock};
use profiling::ProfilingRecord;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

/// Compilation status of a method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum CompilationStatus {
    /// Interpreted; no compilation pending
    NotCompiled = 0,
    /// A compilation task exists but has not started
    Waiting = 1,
    /// A compiler is working on the method
    Compilation = 2,
    /// Compiled code is installed
    Compiled = 3,
    /// Compilation failed; the method stays interpreted
    Failed = 4,
}

impl CompilationStatus {
    fn from_u8(raw: u8) -> CompilationStatus {
        match raw {
            0 => CompilationStatus::NotCompiled,
            1 => CompilationStatus::Waiting,
            2 => CompilationStatus::Compilation,
            3 => CompilationStatus::Compiled,
            4 => CompilationStatus::Failed,
            _ => unreachable!("corrupt compilation status {}", raw),
        }
    }

    /// Whether the state machine has an edge from `self` to `to`
    pub fn can_transition(self, to: CompilationStatus) -> bool {
        use CompilationStatus::*;
        matches!(
            (self, to),
            (NotCompiled, Waiting)
                | (Waiting, Compilation)
                | (Compilation, Compiled)
                | (Compilation, Failed)
                | (Compilation, NotCompiled)
                | (Compiled, NotCompiled)
        )
    }

    /// Name as used in logs
    pub const fn as_str(self) -> &'static str {
        match self {
            CompilationStatus::NotCompiled => "NOT_COMPILED",
            CompilationStatus::Waiting => "WAITING",
            CompilationStatus::Compilation => "COMPILATION",
            CompilationStatus::Compiled => "COMPILED",
            CompilationStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for CompilationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bytecode method
pub struct Method {
    id: MethodId,
    class: ClassId,
    index_in_class: u32,
    name: String,
    chunk: BytecodeChunk,
    status: AtomicU8,
    hotness: AtomicI32,
    entry: RwLock<Option<Arc<CompiledCode>>>,
    profile: Mutex<Option<Arc<ProfilingRecord>>>,
    deopt_epoch: AtomicU32,
    history: Mutex<Deoptimizer>,
    osr_disabled: AtomicBool,
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("id", &self.id)
            .field("class", &self.class)
            .field("name", &self.name)
            .field("status", &self.status())
            .field("hotness", &self.hotness())
            .field("has_profile", &self.profile.lock().is_some())
            .finish()
    }
}

impl Method {
    /// Create a method; it starts interpreted with a cold counter
    pub fn new(
        id: MethodId,
        class: ClassId,
        index_in_class: u32,
        name: impl Into<String>,
        chunk: BytecodeChunk,
    ) -> Self {
        Self {
            id,
            class,
            index_in_class,
            name: name.into(),
            chunk,
            status: AtomicU8::new(CompilationStatus::NotCompiled as u8),
            hotness: AtomicI32::new(i32::MAX),
            entry: RwLock::new(None),
            profile: Mutex::new(None),
            deopt_epoch: AtomicU32::new(0),
            history: Mutex::new(Deoptimizer::new()),
            osr_disabled: AtomicBool::new(false),
        }
    }

    /// Method id
    pub fn id(&self) -> MethodId {
        self.id
    }

    /// Declaring class
    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Position among the declaring class's methods
    pub fn index_in_class(&self) -> u32 {
        self.index_in_class
    }

    /// Name, for diagnostics
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytecode
    pub fn chunk(&self) -> &BytecodeChunk {
        &self.chunk
    }

    /// Number of arguments
    pub fn arg_count(&self) -> usize {
        self.chunk.arg_count as usize
    }

    /// Apply runtime settings: counter start value and deopt limit
    pub(crate) fn prepare(&self, hotness_threshold: i32, max_deopts: u32) {
        self.reset_hotness(hotness_threshold);
        *self.history.lock() = Deoptimizer::with_max_count(max_deopts);
    }

    /// Current status
    pub fn status(&self) -> CompilationStatus {
        CompilationStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Move from `from` to `to` if the status is still `from`
    pub(crate) fn transition(
        &self,
        from: CompilationStatus,
        to: CompilationStatus,
        events: &EventLog,
    ) -> bool {
        debug_assert!(from.can_transition(to), "illegal transition {} -> {}", from, to);
        let swapped = self
            .status
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if swapped {
            events.record(CompilationEvent::StatusChanged {
                method: self.id,
                from,
                to,
            });
        }
        swapped
    }

    /// Remaining invocations before the method is hot
    pub fn hotness(&self) -> i32 {
        self.hotness.load(Ordering::Relaxed)
    }

    /// Count one invocation or back-edge; true when the counter expired
    pub(crate) fn decrement_hotness(&self) -> bool {
        self.hotness.fetch_sub(1, Ordering::Relaxed) <= 1
    }

    /// Restart the counter
    pub(crate) fn reset_hotness(&self, value: i32) {
        self.hotness.store(value, Ordering::Relaxed);
    }

    /// Installed compiled code
    pub fn compiled_code(&self) -> Option<Arc<CompiledCode>> {
        self.entry.read().clone()
    }

    /// Current deoptimization epoch
    pub fn deopt_epoch(&self) -> u32 {
        self.deopt_epoch.load(Ordering::Acquire)
    }

    /// Install compiled code produced by a task that started at `epoch`.
    ///
    /// The result is dropped, and the status returned to `NOT_COMPILED`, when
    /// the method was deoptimized or compiled by someone else meanwhile.
    pub(crate) fn publish(&self, code: Arc<CompiledCode>, epoch: u32, events: &EventLog) -> bool {
        let mut entry = self.entry.write();
        if self.deopt_epoch() != epoch || entry.is_some() {
            drop(entry);
            self.transition(
                CompilationStatus::Compilation,
                CompilationStatus::NotCompiled,
                events,
            );
            events.record(CompilationEvent::ResultDiscarded { method: self.id });
            return false;
        }
        *entry = Some(code);
        self.transition(
            CompilationStatus::Compilation,
            CompilationStatus::Compiled,
            events,
        )
    }

    /// Discard compiled code.
    ///
    /// With `expected`, only that code is discarded; a stale frame's code no
    /// longer installed leaves the method alone. Without it, whatever is
    /// installed goes, and an in-flight compilation will be discarded on
    /// publication. Returns whether installed code was removed.
    pub(crate) fn deoptimize(&self, expected: Option<&Arc<CompiledCode>>, events: &EventLog) -> bool {
        let mut entry = self.entry.write();
        if let Some(expected) = expected {
            match entry.as_ref() {
                Some(current) if Arc::ptr_eq(current, expected) => {}
                _ => return false,
            }
        }
        self.deopt_epoch.fetch_add(1, Ordering::AcqRel);
        match entry.take() {
            Some(code) => {
                code.invalidate();
                drop(entry);
                self.transition(
                    CompilationStatus::Compiled,
                    CompilationStatus::NotCompiled,
                    events,
                );
                true
            }
            None => false,
        }
    }

    /// Installed profile
    pub fn profile(&self) -> Option<Arc<ProfilingRecord>> {
        self.profile.lock().clone()
    }

    /// Install a profile unless one exists; returns the installed record and
    /// whether this call installed it
    pub(crate) fn install_profile(&self) -> (Arc<ProfilingRecord>, bool) {
        let record = Arc::new(ProfilingRecord::new(&ProfileSites::scan(&self.chunk)));
        let mut slot = self.profile.lock();
        match slot.as_ref() {
            Some(existing) => (Arc::clone(existing), false),
            None => {
                *slot = Some(Arc::clone(&record));
                (record, true)
            }
        }
    }

    /// Stop profiling; running frames keep their reference until they exit
    pub(crate) fn release_profile(&self) {
        self.profile.lock().take();
    }

    /// Remember a failed speculation
    pub(crate) fn record_deopt(&self, reason: DeoptReason, pc: u32) {
        self.history.lock().record(reason, pc);
    }

    /// Copy of the deoptimization history
    pub fn deopt_history(&self) -> Deoptimizer {
        self.history.lock().clone()
    }

    /// Whether OSR was turned off after a failed OSR compilation
    pub fn is_osr_disabled(&self) -> bool {
        self.osr_disabled.load(Ordering::Relaxed)
    }

    pub(crate) fn disable_osr(&self) {
        self.osr_disabled.store(true, Ordering::Relaxed);
    }
}
