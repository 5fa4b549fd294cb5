//! Compilation event log
//!
//! When `compiler_events` is enabled every tiering decision is appended to
//! an [`EventLog`]. Tests read it to check the state machine; the CLI prints
//! a summary of it.

use crate::frame::CallerKind;
use crate::method::CompilationStatus;
use core_types::{ClassId, MethodId};
use jit_compiler::{CodeOrigin, DeoptReason};
use parking_lot::Mutex;
use serde::Serialize;

/// A recorded tiering event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CompilationEvent {
    /// A method's compilation status changed
    StatusChanged {
        /// Method
        method: MethodId,
        /// Previous status
        from: CompilationStatus,
        /// New status
        to: CompilationStatus,
    },
    /// A profiling record was installed
    ProfilingStarted {
        /// Method
        method: MethodId,
    },
    /// A task was handed to the compiler pool
    TaskQueued {
        /// Method
        method: MethodId,
    },
    /// Compiled code was published
    Compiled {
        /// Method
        method: MethodId,
        /// Whether this was an OSR compilation
        osr: bool,
        /// Where the code came from
        origin: CodeOrigin,
        /// Guards in the code
        guards: usize,
    },
    /// A compilation failed
    CompilationFailed {
        /// Method
        method: MethodId,
        /// Whether this was an OSR compilation
        osr: bool,
        /// Failure description
        error: String,
    },
    /// A finished compilation was thrown away because the method changed
    ResultDiscarded {
        /// Method
        method: MethodId,
    },
    /// A compiled frame fell back to the interpreter
    Deoptimized {
        /// Method
        method: MethodId,
        /// Why
        reason: DeoptReason,
        /// Bytecode pc the interpreter resumed at; `None` for a request
        /// against the method rather than a running frame
        pc: Option<u32>,
        /// Whether the installed code was discarded
        invalidated: bool,
    },
    /// An interpreted frame was replaced by a compiled one
    OsrEntered {
        /// Method
        method: MethodId,
        /// Loop header
        pc: u32,
    },
    /// An exception left a loop segment without a handler
    BoundaryDrop {
        /// Entry method of the segment
        method: MethodId,
        /// Kind of code the exception dropped into
        caller: CallerKind,
        /// Post-call address in the caller, when the caller is managed code
        return_pc: Option<u32>,
    },
    /// A handler accepted an exception
    ExceptionCaught {
        /// Method owning the handler
        method: MethodId,
        /// Class of the exception
        class: ClassId,
        /// Handler pc
        handler: u32,
    },
}

impl CompilationEvent {
    /// Method the event concerns
    pub fn method(&self) -> MethodId {
        match self {
            CompilationEvent::StatusChanged { method, .. }
            | CompilationEvent::ProfilingStarted { method }
            | CompilationEvent::TaskQueued { method }
            | CompilationEvent::Compiled { method, .. }
            | CompilationEvent::CompilationFailed { method, .. }
            | CompilationEvent::ResultDiscarded { method }
            | CompilationEvent::Deoptimized { method, .. }
            | CompilationEvent::OsrEntered { method, .. }
            | CompilationEvent::BoundaryDrop { method, .. }
            | CompilationEvent::ExceptionCaught { method, .. } => *method,
        }
    }
}

/// Append-only event log shared by all threads of a runtime
#[derive(Debug, Default)]
pub struct EventLog {
    enabled: bool,
    events: Mutex<Vec<CompilationEvent>>,
}

impl EventLog {
    /// Create a log; a disabled log drops every event
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            events: Mutex::new(Vec::new()),
        }
    }

    /// Whether events are kept
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Append an event
    pub fn record(&self, event: CompilationEvent) {
        if self.enabled {
            self.events.lock().push(event);
        }
    }

    /// Copy of every event so far
    pub fn snapshot(&self) -> Vec<CompilationEvent> {
        self.events.lock().clone()
    }

    /// Events concerning one method
    pub fn for_method(&self, method: MethodId) -> Vec<CompilationEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.method() == method)
            .cloned()
            .collect()
    }

    /// Status changes of one method, in order
    pub fn transitions(&self, method: MethodId) -> Vec<(CompilationStatus, CompilationStatus)> {
        self.for_method(method)
            .into_iter()
            .filter_map(|event| match event {
                CompilationEvent::StatusChanged { from, to, .. } => Some((from, to)),
                _ => None,
            })
            .collect()
    }

    /// Number of events matching `predicate`
    pub fn count(&self, predicate: impl Fn(&CompilationEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|event| predicate(event)).count()
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every event
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}
