//! Execution bridge
//!
//! Decides which representation runs a method and moves control between the
//! two execution loops. Calls between frames of the same representation stay
//! inside one loop; a change of representation starts the other loop
//! recursively on the native stack.

use crate::compiled;
use crate::events::CompilationEvent;
use crate::frame::{CallerKind, CompiledFrame, InterpretedFrame};
use crate::interpreter;
use crate::method::{CompilationStatus, Method};
use crate::runtime::Runtime;
use crate::thread::ManagedThread;
use core_types::{ClassId, ManagedException, Value};
use jit_compiler::CompiledCode;
use std::sync::Arc;
use tracing::trace;

/// The portable compiled tier can always be entered at a loop header
pub const ARCH_SUPPORTS_OSR: bool = true;

/// What an execution loop does after one step
#[derive(Debug)]
pub(crate) enum Flow {
    /// Keep executing the top frame
    Continue,
    /// Hand a value to the frame below the one that produced it
    Deliver(Value),
    /// Search for a handler starting at the top frame
    Throw(ManagedException),
}

impl From<Result<Value, ManagedException>> for Flow {
    fn from(result: Result<Value, ManagedException>) -> Self {
        match result {
            Ok(value) => Flow::Deliver(value),
            Err(exception) => Flow::Throw(exception),
        }
    }
}

/// Run `method` for a caller outside the managed stack
pub(crate) fn call(
    rt: &Runtime,
    thread: &mut ManagedThread,
    method: Arc<Method>,
    args: &[Value],
    caller: CallerKind,
) -> Result<Value, ManagedException> {
    check_arity(rt, &method, args)?;
    match select_code(rt, &method) {
        Some(code) => compiled::run(rt, thread, CompiledFrame::new(method, code, args, caller)),
        None => interpreter::run(rt, thread, InterpretedFrame::new(method, args, caller)),
    }
}

pub(crate) fn check_arity(
    rt: &Runtime,
    method: &Method,
    args: &[Value],
) -> Result<(), ManagedException> {
    if args.len() == method.arg_count() {
        Ok(())
    } else {
        Err(rt.exception(
            ClassId::ILLEGAL_ARGUMENT_EXCEPTION,
            format!(
                "{} takes {} arguments, got {}",
                method.id(),
                method.arg_count(),
                args.len()
            ),
        ))
    }
}

/// Compiled code to run an invocation of `method` with, if any.
///
/// Counts the invocation; when the counter expires this installs a profile
/// or requests a compilation, depending on how far the method has come.
pub(crate) fn select_code(rt: &Runtime, method: &Arc<Method>) -> Option<Arc<CompiledCode>> {
    if let Some(code) = method.compiled_code() {
        return Some(code);
    }
    if !method.decrement_hotness() {
        return None;
    }
    let options = rt.options();
    if !options.enable_jit {
        method.reset_hotness(options.hotness_threshold);
        return None;
    }
    match method.status() {
        CompilationStatus::NotCompiled => {
            if options.enable_profiling && method.profile().is_none() {
                start_profiling(rt, method);
                return None;
            }
            method.reset_hotness(options.hotness_threshold);
            trace!(method = %method.id(), "method is hot");
            rt.scheduler()
                .request(method, &|| rt.safepoint().poll())
        }
        CompilationStatus::Failed => {
            method.reset_hotness(options.hotness_threshold);
            None
        }
        _ => None,
    }
}

fn start_profiling(rt: &Runtime, method: &Method) -> Option<Arc<profiling::ProfilingRecord>> {
    let (record, installed) = method.install_profile();
    if installed {
        rt.events()
            .record(CompilationEvent::ProfilingStarted { method: method.id() });
        trace!(method = %method.id(), "profiling started");
    }
    method.reset_hotness(rt.options().profiling_threshold);
    Some(record)
}

/// Compiled code to continue `frame` in at loop header `header`, if any.
///
/// Counts the back-edge against the method's counter. The returned code is
/// guaranteed to have an OSR entry at `header`.
pub(crate) fn osr_code(
    rt: &Runtime,
    frame: &mut InterpretedFrame,
    header: u32,
) -> Option<Arc<CompiledCode>> {
    let options = rt.options();
    if !options.enable_jit || !options.enable_osr || !ARCH_SUPPORTS_OSR || frame.deoptimized {
        return None;
    }
    let method = Arc::clone(&frame.method);
    if method.is_osr_disabled() || !method.decrement_hotness() {
        return None;
    }
    let code = match method.compiled_code() {
        Some(code) => code,
        None => {
            if method.status() != CompilationStatus::NotCompiled {
                method.reset_hotness(options.hotness_threshold);
                return None;
            }
            if options.enable_profiling && method.profile().is_none() {
                frame.profile = start_profiling(rt, &method);
                return None;
            }
            method.reset_hotness(options.hotness_threshold);
            rt.scheduler().compile_osr(&method, header)?
        }
    };
    code.osr_entry(header).is_some().then_some(code)
}
