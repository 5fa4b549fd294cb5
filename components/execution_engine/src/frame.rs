//! Call frames
//!
//! A thread's frames live in one [`FrameStack`]. Each frame is either
//! interpreted or compiled and names its predecessor by index. The stack is
//! cut into segments, one per execution loop on the native stack; a
//! [`FrameScope`] owns a segment and truncates the stack back to its entry
//! when the loop exits, however it exits.

use crate::class_linker::ClassLinker;
use crate::method::Method;
use crate::thread::ManagedThread;
use core_types::{ClassId, FrameTier, MethodId, Value};
use jit_compiler::{CompiledCode, InterpreterState, Slot};
use profiling::ProfilingRecord;
use serde::Serialize;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// What kind of code called a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerKind {
    /// The embedder, through `Runtime::invoke`
    Native,
    /// An interpreted frame
    Interpreted,
    /// A compiled frame
    Compiled,
}

/// A frame executing bytecode
#[derive(Debug)]
pub struct InterpretedFrame {
    /// Method being executed
    pub method: Arc<Method>,
    /// Profile the frame feeds, if profiling was on when it was pushed
    pub profile: Option<Arc<ProfilingRecord>>,
    /// Current instruction; the call instruction while a callee runs
    pub pc: u32,
    /// Accumulator
    pub accumulator: Value,
    /// Register file
    pub registers: Vec<Value>,
    /// Index of the calling frame
    pub previous: Option<usize>,
    /// Kind of the caller
    pub caller: CallerKind,
    /// Rebuilt from a compiled frame; never replaced by OSR
    pub deoptimized: bool,
}

impl InterpretedFrame {
    /// Fresh frame at pc 0 with arguments in the first registers
    pub fn new(method: Arc<Method>, args: &[Value], caller: CallerKind) -> Self {
        let mut registers = vec![Value::Null; method.chunk().register_count as usize];
        for (register, arg) in registers.iter_mut().zip(args) {
            *register = *arg;
        }
        let profile = method.profile();
        Self {
            method,
            profile,
            pc: 0,
            accumulator: Value::Null,
            registers,
            previous: None,
            caller,
            deoptimized: false,
        }
    }

    /// Frame resuming a materialized interpreter state
    pub fn from_state(method: Arc<Method>, state: InterpreterState, caller: CallerKind) -> Self {
        let profile = method.profile();
        Self {
            method,
            profile,
            pc: state.pc,
            accumulator: state.accumulator,
            registers: state.registers,
            previous: None,
            caller,
            deoptimized: true,
        }
    }

    /// Snapshot of the state OSR transfers
    pub fn state(&self) -> InterpreterState {
        InterpreterState {
            pc: self.pc,
            accumulator: self.accumulator,
            registers: self.registers.clone(),
        }
    }
}

/// A frame executing compiled code
#[derive(Debug)]
pub struct CompiledFrame {
    /// Method being executed
    pub method: Arc<Method>,
    /// Code being executed; kept alive even if the method drops it
    pub code: Arc<CompiledCode>,
    /// Current operation; the call operation while a callee runs
    pub pc: u32,
    /// Slot array, accumulator in slot 0
    pub slots: Vec<Value>,
    /// Index of the calling frame
    pub previous: Option<usize>,
    /// Kind of the caller
    pub caller: CallerKind,
}

impl CompiledFrame {
    /// Fresh frame at pc 0 with arguments placed per the frame mapping
    pub fn new(method: Arc<Method>, code: Arc<CompiledCode>, args: &[Value], caller: CallerKind) -> Self {
        let slots = code.frame_mapping.entry_slots(args);
        Self::resume(method, code, slots, 0, caller)
    }

    /// Frame resuming at `pc` with a prepared slot array
    pub fn resume(
        method: Arc<Method>,
        code: Arc<CompiledCode>,
        slots: Vec<Value>,
        pc: u32,
        caller: CallerKind,
    ) -> Self {
        Self {
            method,
            code,
            pc,
            slots,
            previous: None,
            caller,
        }
    }

    /// Accumulator slot
    pub fn accumulator(&self) -> Value {
        self.slots[Slot::ACC.index()]
    }

    /// Write the accumulator slot
    pub fn set_accumulator(&mut self, value: Value) {
        self.slots[Slot::ACC.index()] = value;
    }
}

/// A frame of either representation
#[derive(Debug)]
pub enum Frame {
    /// Interpreted
    Interpreted(InterpretedFrame),
    /// Compiled
    Compiled(CompiledFrame),
}

/// What the unwinder needs from a frame
pub trait UnwindFrame {
    /// Handler pc for an exception of `class` thrown at `pc`
    fn handler_for(&self, pc: u32, class: ClassId, linker: &dyn ClassLinker) -> Option<u32>;

    /// Index of the calling frame
    fn previous(&self) -> Option<usize>;

    /// Kind of the caller
    fn caller(&self) -> CallerKind;

    /// Current pc
    fn pc(&self) -> u32;

    /// Method of the frame
    fn method_id(&self) -> MethodId;

    /// Representation of the frame
    fn tier(&self) -> FrameTier;

    /// Continue at `handler` with `exception` in the accumulator
    fn enter_handler(&mut self, handler: u32, exception: Value);
}

fn accepts(linker: &dyn ClassLinker, catch_class: Option<ClassId>, thrown: ClassId) -> bool {
    catch_class.map_or(true, |declared| linker.is_subclass(thrown, declared))
}

impl UnwindFrame for InterpretedFrame {
    fn handler_for(&self, pc: u32, class: ClassId, linker: &dyn ClassLinker) -> Option<u32> {
        self.method
            .chunk()
            .try_blocks_covering(pc)
            .find(|block| accepts(linker, block.catch_class, class))
            .map(|block| block.handler)
    }

    fn previous(&self) -> Option<usize> {
        self.previous
    }

    fn caller(&self) -> CallerKind {
        self.caller
    }

    fn pc(&self) -> u32 {
        self.pc
    }

    fn method_id(&self) -> MethodId {
        self.method.id()
    }

    fn tier(&self) -> FrameTier {
        FrameTier::Interpreted
    }

    fn enter_handler(&mut self, handler: u32, exception: Value) {
        self.accumulator = exception;
        self.pc = handler;
    }
}

impl UnwindFrame for CompiledFrame {
    fn handler_for(&self, pc: u32, class: ClassId, linker: &dyn ClassLinker) -> Option<u32> {
        self.code
            .handler_for(pc, |catch_class| accepts(linker, catch_class, class))
    }

    fn previous(&self) -> Option<usize> {
        self.previous
    }

    fn caller(&self) -> CallerKind {
        self.caller
    }

    fn pc(&self) -> u32 {
        self.pc
    }

    fn method_id(&self) -> MethodId {
        self.method.id()
    }

    fn tier(&self) -> FrameTier {
        FrameTier::Compiled
    }

    fn enter_handler(&mut self, handler: u32, exception: Value) {
        self.set_accumulator(exception);
        self.pc = handler;
    }
}

impl Frame {
    fn as_unwind(&self) -> &dyn UnwindFrame {
        match self {
            Frame::Interpreted(frame) => frame,
            Frame::Compiled(frame) => frame,
        }
    }

    fn as_unwind_mut(&mut self) -> &mut dyn UnwindFrame {
        match self {
            Frame::Interpreted(frame) => frame,
            Frame::Compiled(frame) => frame,
        }
    }

    fn set_previous(&mut self, previous: Option<usize>) {
        match self {
            Frame::Interpreted(frame) => frame.previous = previous,
            Frame::Compiled(frame) => frame.previous = previous,
        }
    }
}

impl UnwindFrame for Frame {
    fn handler_for(&self, pc: u32, class: ClassId, linker: &dyn ClassLinker) -> Option<u32> {
        self.as_unwind().handler_for(pc, class, linker)
    }

    fn previous(&self) -> Option<usize> {
        self.as_unwind().previous()
    }

    fn caller(&self) -> CallerKind {
        self.as_unwind().caller()
    }

    fn pc(&self) -> u32 {
        self.as_unwind().pc()
    }

    fn method_id(&self) -> MethodId {
        self.as_unwind().method_id()
    }

    fn tier(&self) -> FrameTier {
        self.as_unwind().tier()
    }

    fn enter_handler(&mut self, handler: u32, exception: Value) {
        self.as_unwind_mut().enter_handler(handler, exception)
    }
}

/// Frames beyond the configured depth kept for throwing `StackOverflowError`
pub const STACK_RESERVED_FRAMES: usize = 8;

/// Push failed: the thread is out of frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackOverflow;

/// A thread's frames
#[derive(Debug)]
pub struct FrameStack {
    frames: Vec<Frame>,
    max_depth: usize,
}

impl FrameStack {
    /// Empty stack allowing `max_depth` frames
    pub fn new(max_depth: usize) -> Self {
        Self {
            frames: Vec::with_capacity(max_depth + STACK_RESERVED_FRAMES),
            max_depth,
        }
    }

    /// Push a frame, linking it to the current top
    pub fn push(&mut self, mut frame: Frame) -> Result<usize, StackOverflow> {
        if self.frames.len() >= self.max_depth {
            return Err(StackOverflow);
        }
        frame.set_previous(self.frames.len().checked_sub(1));
        self.frames.push(frame);
        Ok(self.frames.len() - 1)
    }

    /// Remove and return the top frame
    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Drop every frame at or above `len`
    pub fn truncate(&mut self, len: usize) {
        self.frames.truncate(len);
    }

    /// Frame count
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether there are no frames
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Depth limit
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Frame at `index`
    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    /// Mutable frame at `index`
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Frame> {
        self.frames.get_mut(index)
    }

    /// Top frame
    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// Mutable top frame
    pub fn top_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }
}

/// Owner of one loop's stack segment.
///
/// Gives the loop access to its thread; on drop, the stack is truncated to
/// the length it had when the scope was entered.
pub struct FrameScope<'t> {
    thread: &'t mut ManagedThread,
    base: usize,
}

impl<'t> FrameScope<'t> {
    /// Start a segment at the current top of `thread`'s stack
    pub fn enter(thread: &'t mut ManagedThread) -> Self {
        let base = thread.frames.len();
        Self { thread, base }
    }

    /// Index of the segment's first frame
    pub fn base(&self) -> usize {
        self.base
    }

    /// Whether the segment holds no frames
    pub fn is_segment_empty(&self) -> bool {
        self.thread.frames.len() <= self.base
    }
}

impl Deref for FrameScope<'_> {
    type Target = ManagedThread;

    fn deref(&self) -> &ManagedThread {
        self.thread
    }
}

impl DerefMut for FrameScope<'_> {
    fn deref_mut(&mut self) -> &mut ManagedThread {
        self.thread
    }
}

impl Drop for FrameScope<'_> {
    fn drop(&mut self) {
        self.thread.frames.truncate(self.base);
    }
}
