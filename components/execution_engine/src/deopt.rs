//! Deoptimization of running compiled frames
//!
//! The compiled tier keeps every bytecode register in a slot named by the
//! frame mapping, so a compiled frame can be turned back into an interpreted
//! one at any operation boundary.

use crate::bridge::Flow;
use crate::events::CompilationEvent;
use crate::frame::{Frame, FrameScope, InterpretedFrame};
use crate::interpreter;
use crate::runtime::Runtime;
use core_types::Value;
use jit_compiler::{DeoptReason, Deoptimizer};
use tracing::debug;

/// Replace the top compiled frame with an interpreted frame resuming at
/// `resume_pc`, and continue in the interpreter.
///
/// `result` is stored in the accumulator first; lazy deoptimization on return
/// uses it to hand over the callee's value. Reasons that invalidate the code
/// also uninstall it when it is still the method's entry.
pub(crate) fn deoptimize_top(
    rt: &Runtime,
    scope: &mut FrameScope<'_>,
    reason: DeoptReason,
    resume_pc: u32,
    result: Option<Value>,
) -> Flow {
    let Some(Frame::Compiled(mut frame)) = scope.frames.pop() else {
        unreachable!("deoptimizing a frame that is not compiled");
    };
    if let Some(value) = result {
        frame.set_accumulator(value);
    }
    let method = frame.method;
    method.record_deopt(reason, frame.pc);

    let mut invalidated = false;
    if reason.invalidates() && method.deoptimize(Some(&frame.code), rt.events()) {
        method.reset_hotness(rt.options().hotness_threshold);
        invalidated = true;
    }
    rt.events().record(CompilationEvent::Deoptimized {
        method: method.id(),
        reason,
        pc: Some(resume_pc),
        invalidated,
    });
    debug!(
        method = %method.id(),
        reason = reason.as_str(),
        pc = frame.pc,
        resume_pc,
        invalidated,
        "deoptimized compiled frame"
    );

    let state = Deoptimizer::materialize(&frame.code, &frame.slots, resume_pc);
    let interpreted = InterpretedFrame::from_state(method, state, frame.caller);
    interpreter::run(rt, scope, interpreted).into()
}
