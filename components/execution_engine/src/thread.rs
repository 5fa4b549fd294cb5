//! Managed threads

use crate::frame::FrameStack;
use core_types::ManagedException;

/// Per-thread execution state.
///
/// Obtained from `Runtime::attach_thread` and passed to every `invoke` on
/// that thread.
#[derive(Debug)]
pub struct ManagedThread {
    id: u32,
    pub(crate) frames: FrameStack,
    stack_overflow_error: ManagedException,
}

impl ManagedThread {
    pub(crate) fn new(id: u32, max_stack_depth: usize, stack_overflow_error: ManagedException) -> Self {
        Self {
            id,
            frames: FrameStack::new(max_stack_depth),
            stack_overflow_error,
        }
    }

    /// Thread id
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Frames currently on the thread's stack
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The thread's frames
    pub fn frames(&self) -> &FrameStack {
        &self.frames
    }

    /// The error thrown when the stack is exhausted, allocated up front
    pub(crate) fn stack_overflow_error(&self) -> ManagedException {
        self.stack_overflow_error.clone()
    }
}
