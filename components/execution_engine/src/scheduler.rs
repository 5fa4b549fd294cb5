//! Compilation scheduling
//!
//! A method's status word is the only record of whether anyone is compiling
//! it. The requesting thread claims it with `NOT_COMPILED -> WAITING`; the
//! thread that runs the task moves it on to `COMPILATION` and finally to
//! `COMPILED` or `FAILED`.
//!
//! Tasks run in one of two ways:
//!
//! - **In place**: the requesting thread compiles before continuing. OSR
//!   tasks always run this way.
//! - **Background**: the task is sent over a channel drained by a fixed pool
//!   of compiler threads. Unless asynchronous compilation is allowed the
//!   requester then waits, with backoff, for the status to settle.

use crate::aot::AotManager;
use crate::class_linker::{ClassLinker, LinkerResolver};
use crate::error::VmError;
use crate::events::{CompilationEvent, EventLog};
use crate::method::{CompilationStatus, Method};
use crate::options::{RuntimeOptions, WaitPolicy};
use core_types::GcBarrierSet;
use crossbeam::channel::{self, Receiver, Sender};
use jit_compiler::{BaselineJIT, CompileError, CompileRequest, CompiledCode, MemoryStats, TaskArenas};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

/// Everything a compilation task needs, shared by all tasks of a runtime
pub struct CompilerContext {
    jit: BaselineJIT,
    memory: Arc<MemoryStats>,
    arena_size: usize,
    linker: Arc<dyn ClassLinker>,
    barriers: Arc<dyn GcBarrierSet>,
    events: Arc<EventLog>,
    aot: Arc<AotManager>,
    stats: AtomicSchedulerStats,
}

impl CompilerContext {
    pub(crate) fn new(
        options: &RuntimeOptions,
        linker: Arc<dyn ClassLinker>,
        barriers: Arc<dyn GcBarrierSet>,
        events: Arc<EventLog>,
        aot: Arc<AotManager>,
    ) -> Self {
        Self {
            jit: BaselineJIT::new(options.compiler_config()),
            memory: Arc::new(MemoryStats::new(options.arena_budget)),
            arena_size: options.arena_size,
            linker,
            barriers,
            events,
            aot,
            stats: AtomicSchedulerStats::default(),
        }
    }

    /// The compiler
    pub fn jit(&self) -> &BaselineJIT {
        &self.jit
    }

    /// Arena accounting
    pub fn memory(&self) -> &Arc<MemoryStats> {
        &self.memory
    }
}

/// Scheduler counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Tasks sent to the compiler threads
    pub enqueued: u64,
    /// Tasks whose code was published
    pub completed: u64,
    /// Tasks that failed to compile
    pub failed: u64,
    /// Tasks whose result was thrown away
    pub discarded: u64,
}

#[derive(Debug, Default)]
struct AtomicSchedulerStats {
    enqueued: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    discarded: AtomicU64,
}

/// One compilation of one method
pub struct CompilationTask {
    method: Arc<Method>,
    osr_pc: Option<u32>,
    epoch: u32,
    context: Arc<CompilerContext>,
}

impl CompilationTask {
    /// Task for a method its creator moved to `WAITING`
    pub(crate) fn new(method: Arc<Method>, osr_pc: Option<u32>, context: Arc<CompilerContext>) -> Self {
        let epoch = method.deopt_epoch();
        Self {
            method,
            osr_pc,
            epoch,
            context,
        }
    }

    /// Method being compiled
    pub fn method(&self) -> &Arc<Method> {
        &self.method
    }

    /// Whether the task compiles for entry at a loop header
    pub fn is_osr(&self) -> bool {
        self.osr_pc.is_some()
    }

    /// Compile and publish. Returns the published code.
    pub(crate) fn run(self) -> Option<Arc<CompiledCode>> {
        let events = &self.context.events;
        if !self.method.transition(
            CompilationStatus::Waiting,
            CompilationStatus::Compilation,
            events,
        ) {
            return None;
        }
        trace!(method = %self.method.id(), osr = self.is_osr(), "compiling");
        match TaskArenas::allocate(&self.context.memory, self.context.arena_size) {
            Ok(mut arenas) => {
                let produced = self.produce(&mut arenas);
                self.finalize(Some(arenas), produced)
            }
            Err(error) => self.finalize(None, Err(error)),
        }
    }

    /// Code from a loaded image when one has it, otherwise a fresh compile.
    ///
    /// Image code speculates everywhere, so once a speculation of the method
    /// has failed the JIT compiles it against the deoptimization history.
    fn produce(&self, arenas: &mut TaskArenas) -> Result<CompiledCode, CompileError> {
        let context = &self.context;
        let history = self.method.deopt_history();
        if self.osr_pc.is_none() {
            if history.has_failed_speculation() {
                trace!(method = %self.method.id(), "bypassing AOT code after failed speculation");
            } else if let Some(code) = context.aot.lookup(&self.method) {
                return Ok(code);
            }
        }
        let profile = self.method.profile();
        let resolver = LinkerResolver(context.linker.as_ref());
        let request = CompileRequest {
            method: self.method.id(),
            chunk: self.method.chunk(),
            profile: profile.as_deref(),
            history: &history,
            osr_pc: self.osr_pc,
            barriers: context.barriers.as_ref(),
            resolver: &resolver,
        };
        context.jit.compile(&request, arenas)
    }

    /// Release the arenas and settle the method's status
    fn finalize(
        self,
        arenas: Option<TaskArenas>,
        produced: Result<CompiledCode, CompileError>,
    ) -> Option<Arc<CompiledCode>> {
        if let Some(arenas) = arenas {
            arenas.release();
        }
        let context = &self.context;
        let method = &self.method;
        let osr = self.is_osr();
        match produced {
            Ok(code) => {
                let code = Arc::new(code);
                if !method.publish(Arc::clone(&code), self.epoch, &context.events) {
                    context.stats.discarded.fetch_add(1, Ordering::Relaxed);
                    debug!(method = %method.id(), "compiled code discarded");
                    return None;
                }
                context.stats.completed.fetch_add(1, Ordering::Relaxed);
                context.events.record(CompilationEvent::Compiled {
                    method: method.id(),
                    osr,
                    origin: code.origin,
                    guards: code.guard_count(),
                });
                Some(code)
            }
            Err(error) => {
                context.stats.failed.fetch_add(1, Ordering::Relaxed);
                if osr {
                    method.transition(
                        CompilationStatus::Compilation,
                        CompilationStatus::NotCompiled,
                        &context.events,
                    );
                    method.disable_osr();
                } else {
                    method.transition(
                        CompilationStatus::Compilation,
                        CompilationStatus::Failed,
                        &context.events,
                    );
                    method.release_profile();
                }
                warn!(method = %method.id(), osr, %error, "compilation failed");
                context.events.record(CompilationEvent::CompilationFailed {
                    method: method.id(),
                    osr,
                    error: error.to_string(),
                });
                None
            }
        }
    }
}

/// Keeps the live-worker count accurate however a worker exits
struct LiveWorker(Arc<AtomicUsize>);

impl LiveWorker {
    fn enter(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(count))
    }
}

impl Drop for LiveWorker {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Dispatches compilation tasks
pub struct CompilationScheduler {
    context: Arc<CompilerContext>,
    in_place: bool,
    async_compilation: bool,
    wait_policy: WaitPolicy,
    sender: Option<Sender<CompilationTask>>,
    workers: Vec<JoinHandle<()>>,
    live_workers: Arc<AtomicUsize>,
}

impl CompilationScheduler {
    /// Scheduler with `options.compiler_threads` workers, or none when
    /// compiling in place or with the JIT off
    pub(crate) fn new(context: Arc<CompilerContext>, options: &RuntimeOptions) -> Result<Self, VmError> {
        let mut scheduler = Self {
            context,
            in_place: options.compile_in_place,
            async_compilation: options.async_compilation,
            wait_policy: options.wait_policy.clone(),
            sender: None,
            workers: Vec::new(),
            live_workers: Arc::new(AtomicUsize::new(0)),
        };
        if scheduler.in_place || !options.enable_jit {
            return Ok(scheduler);
        }

        let (sender, receiver) = channel::unbounded();
        for index in 0..options.compiler_threads {
            let worker = spawn_worker(index, receiver.clone(), &scheduler.live_workers)
                .map_err(VmError::Spawn)?;
            scheduler.workers.push(worker);
        }
        scheduler.sender = Some(sender);
        debug!(threads = options.compiler_threads, "compiler threads started");
        Ok(scheduler)
    }

    /// Ask for `method` to be compiled. The caller has seen its counter
    /// expire.
    ///
    /// Returns code the caller can run right away, which happens when the
    /// task ran in place or the caller waited for it. `poll` is called while
    /// waiting so the waiting thread stays responsive to safepoints.
    pub(crate) fn request(&self, method: &Arc<Method>, poll: &dyn Fn()) -> Option<Arc<CompiledCode>> {
        let events = &self.context.events;
        if !method.transition(
            CompilationStatus::NotCompiled,
            CompilationStatus::Waiting,
            events,
        ) {
            return None;
        }
        let task = CompilationTask::new(Arc::clone(method), None, Arc::clone(&self.context));
        if self.in_place {
            return task.run();
        }
        if let Err(task) = self.enqueue(task) {
            return task.run();
        }
        if self.async_compilation {
            return None;
        }
        self.wait(method, poll)
    }

    /// Compile `method` for entry at loop header `header`, in place
    pub(crate) fn compile_osr(&self, method: &Arc<Method>, header: u32) -> Option<Arc<CompiledCode>> {
        if !method.transition(
            CompilationStatus::NotCompiled,
            CompilationStatus::Waiting,
            &self.context.events,
        ) {
            return None;
        }
        CompilationTask::new(Arc::clone(method), Some(header), Arc::clone(&self.context)).run()
    }

    fn enqueue(&self, task: CompilationTask) -> Result<(), CompilationTask> {
        let Some(sender) = &self.sender else {
            return Err(task);
        };
        let method = task.method.id();
        sender.send(task).map_err(|error| error.into_inner())?;
        self.context.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        self.context
            .events
            .record(CompilationEvent::TaskQueued { method });
        trace!(%method, "compilation task queued");
        Ok(())
    }

    fn wait(&self, method: &Method, poll: &dyn Fn()) -> Option<Arc<CompiledCode>> {
        for delay in self.wait_policy.delays() {
            match method.status() {
                CompilationStatus::Waiting | CompilationStatus::Compilation => {}
                _ => return method.compiled_code(),
            }
            if self.live_workers() == 0 {
                warn!(method = %method.id(), "no compiler threads left; interpreting");
                return None;
            }
            poll();
            thread::sleep(delay);
        }
        None
    }

    /// Compiler threads still running
    pub fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::Acquire)
    }

    /// Tasks sent to the compiler threads so far
    pub fn queued_tasks(&self) -> u64 {
        self.context.stats.enqueued.load(Ordering::Relaxed)
    }

    /// Counter snapshot
    pub fn stats(&self) -> SchedulerStats {
        let stats = &self.context.stats;
        SchedulerStats {
            enqueued: stats.enqueued.load(Ordering::Relaxed),
            completed: stats.completed.load(Ordering::Relaxed),
            failed: stats.failed.load(Ordering::Relaxed),
            discarded: stats.discarded.load(Ordering::Relaxed),
        }
    }

    /// Shared compilation context
    pub fn context(&self) -> &Arc<CompilerContext> {
        &self.context
    }

    /// Close the queue and join the compiler threads. Tasks already queued
    /// are compiled first.
    pub fn shutdown(&mut self) {
        if self.sender.take().is_none() && self.workers.is_empty() {
            return;
        }
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("compiler thread panicked");
            }
        }
        info!("compiler threads stopped");
    }
}

impl Drop for CompilationScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_worker(
    index: usize,
    receiver: Receiver<CompilationTask>,
    live_workers: &Arc<AtomicUsize>,
) -> std::io::Result<JoinHandle<()>> {
    let live = LiveWorker::enter(live_workers);
    thread::Builder::new()
        .name(format!("tvm-compiler-{}", index))
        .spawn(move || {
            let _live = live;
            for task in receiver.iter() {
                task.run();
            }
        })
}
