//! Exception unwinding
//!
//! One walk serves both representations: frames are asked for a handler
//! through [`UnwindFrame`] and popped when they have none. The walk stops at
//! the base of the current loop's segment; what lies below belongs to an
//! outer loop, which continues the search when the exception drops out.

use crate::events::CompilationEvent;
use crate::frame::{FrameScope, UnwindFrame};
use crate::runtime::Runtime;
use core_types::{ManagedException, StackTraceElement, Value};
use tracing::debug;

/// Result of an unwind
#[derive(Debug)]
pub enum UnwindOutcome {
    /// A handler accepted the exception; the frame at `frame` continues at
    /// `handler`
    Resume {
        /// Stack index of the handling frame
        frame: usize,
        /// Handler pc
        handler: u32,
    },
    /// No frame of the segment handles the exception; it leaves the loop
    BoundaryDrop(ManagedException),
}

/// Search the segment for a handler of `exception`, popping frames without one
pub(crate) fn unwind(
    rt: &Runtime,
    scope: &mut FrameScope<'_>,
    mut exception: ManagedException,
) -> UnwindOutcome {
    let class = exception.class();
    let base = scope.base();
    let mut entry = None;

    while scope.frames.len() > base {
        let index = scope.frames.len() - 1;
        let Some(frame) = scope.frames.get_mut(index) else {
            break;
        };
        let pc = frame.pc();
        let method = frame.method_id();
        exception.push_frame(StackTraceElement {
            method,
            pc,
            tier: frame.tier(),
        });
        if let Some(handler) = frame.handler_for(pc, class, rt.linker()) {
            frame.enter_handler(handler, Value::Object(exception.object));
            rt.events().record(CompilationEvent::ExceptionCaught {
                method,
                class,
                handler,
            });
            return UnwindOutcome::Resume {
                frame: index,
                handler,
            };
        }
        entry = Some((method, frame.caller()));
        scope.frames.pop();
    }

    if let Some((method, caller)) = entry {
        let return_pc = base
            .checked_sub(1)
            .and_then(|below| scope.frames.get(below))
            .map(|frame| frame.pc() + 1);
        rt.events().record(CompilationEvent::BoundaryDrop {
            method,
            caller,
            return_pc,
        });
        debug!(%method, ?caller, ?return_pc, class = %class, "exception left its segment");
    }
    UnwindOutcome::BoundaryDrop(exception)
}
