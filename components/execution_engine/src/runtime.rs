//! The runtime handle
//!
//! A [`Runtime`] owns everything shared by the threads executing managed
//! code: options, the class linker, loaded images, the compilation
//! scheduler and its worker threads, the event log and the safepoint. It is
//! passed explicitly to every entry point; there is no global instance.

use crate::aot::AotManager;
use crate::bindings::call_intrinsic;
use crate::bridge;
use crate::class_linker::{ClassLinker, ClassRegistry, LoggingErrorHandler, ResolutionErrorHandler};
use crate::error::VmError;
use crate::events::{CompilationEvent, EventLog};
use crate::frame::CallerKind;
use crate::method::Method;
use crate::options::RuntimeOptions;
use crate::safepoint::Safepoint;
use crate::scheduler::{CompilationScheduler, CompilerContext, SchedulerStats};
use crate::thread::ManagedThread;
use core_types::{
    ArithFault, ClassId, DefaultBarrierSet, GcBarrierSet, IntrinsicId, ManagedException, MethodId,
    ObjectRef, Value,
};
use jit_compiler::{BaselineStats, DeoptReason, MemoryStats};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::info;

/// Shared execution state
pub struct Runtime {
    options: RuntimeOptions,
    linker: Arc<dyn ClassLinker>,
    events: Arc<EventLog>,
    safepoint: Safepoint,
    aot: Arc<AotManager>,
    scheduler: CompilationScheduler,
    resolution_errors: LoggingErrorHandler,
    next_object: AtomicU32,
    next_thread: AtomicU32,
}

impl Runtime {
    /// Create a runtime.
    ///
    /// Images named in the options that fail to load are skipped. Fails on
    /// invalid options or when compiler threads cannot be started.
    pub fn create(
        options: RuntimeOptions,
        linker: Arc<dyn ClassLinker>,
        barriers: Arc<dyn GcBarrierSet>,
    ) -> Result<Runtime, VmError> {
        options.validate()?;
        let aot = Arc::new(AotManager::load(&options.aot_files, options.gc_kind));
        let methods = linker.methods();
        for method in &methods {
            method.prepare(options.hotness_threshold, options.max_deopts);
        }
        let events = Arc::new(EventLog::new(options.compiler_events));
        let context = CompilerContext::new(
            &options,
            Arc::clone(&linker),
            barriers,
            Arc::clone(&events),
            Arc::clone(&aot),
        );
        let scheduler = CompilationScheduler::new(Arc::new(context), &options)?;
        info!(
            methods = methods.len(),
            jit = options.enable_jit,
            compiler_threads = scheduler.live_workers(),
            images = aot.image_count(),
            gc = %options.gc_kind,
            "runtime created"
        );
        Ok(Runtime {
            options,
            linker,
            events,
            safepoint: Safepoint::new(),
            aot,
            scheduler,
            resolution_errors: LoggingErrorHandler,
            next_object: AtomicU32::new(1),
            next_thread: AtomicU32::new(1),
        })
    }

    /// Create a runtime over an in-memory registry with the default barrier
    /// set for the configured collector
    pub fn with_registry(options: RuntimeOptions, registry: ClassRegistry) -> Result<Runtime, VmError> {
        let barriers = Arc::new(DefaultBarrierSet::new(options.gc_kind));
        Self::create(options, Arc::new(registry), barriers)
    }

    /// Stop the compiler threads and release the runtime
    pub fn destroy(mut self) {
        self.scheduler.shutdown();
        info!(events = self.events.len(), "runtime destroyed");
    }

    /// Register a thread for executing managed code
    pub fn attach_thread(&self) -> ManagedThread {
        let id = self.next_thread.fetch_add(1, Ordering::Relaxed);
        let stack_overflow_error = self.exception(
            ClassId::STACK_OVERFLOW_ERROR,
            format!("stack depth limit of {} frames reached", self.options.max_stack_depth),
        );
        ManagedThread::new(id, self.options.max_stack_depth, stack_overflow_error)
    }

    /// Run `method` on `thread`.
    ///
    /// Returns the method's result, or the exception no managed handler
    /// caught.
    pub fn invoke(
        &self,
        thread: &mut ManagedThread,
        method: MethodId,
        args: &[Value],
    ) -> Result<Value, ManagedException> {
        let Some(method) = self.linker.find_method(method) else {
            return Err(self.exception(
                ClassId::NO_SUCH_METHOD_ERROR,
                format!("{} is not defined", method),
            ));
        };
        bridge::call(self, thread, method, args, CallerKind::Native)
    }

    /// Discard `method`'s compiled code.
    ///
    /// New invocations interpret right away. Frames already running the code
    /// finish their current call and are deoptimized when a callee returns
    /// into them. Returns whether code was installed.
    pub fn deoptimize_method(&self, method: MethodId) -> Result<bool, VmError> {
        let target = self
            .linker
            .find_method(method)
            .ok_or(VmError::UnknownMethod(method))?;
        let removed = target.deoptimize(None, &self.events);
        if removed {
            target.reset_hotness(self.options.hotness_threshold);
        }
        self.events.record(CompilationEvent::Deoptimized {
            method,
            reason: DeoptReason::Explicit,
            pc: None,
            invalidated: removed,
        });
        info!(%method, removed, "explicit deoptimization");
        Ok(removed)
    }

    /// Method by id
    pub fn method(&self, method: MethodId) -> Option<Arc<Method>> {
        self.linker.find_method(method)
    }

    /// Options the runtime was created with
    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// Compilation event log
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// The runtime's safepoint
    pub fn safepoint(&self) -> &Safepoint {
        &self.safepoint
    }

    /// Loaded images
    pub fn aot(&self) -> &AotManager {
        &self.aot
    }

    /// Class linker
    pub fn linker(&self) -> &dyn ClassLinker {
        self.linker.as_ref()
    }

    pub(crate) fn scheduler(&self) -> &CompilationScheduler {
        &self.scheduler
    }

    /// Compiler counters
    pub fn compiler_stats(&self) -> BaselineStats {
        self.scheduler.context().jit().stats()
    }

    /// Scheduler counters
    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    /// Compiler threads currently running
    pub fn compiler_threads(&self) -> usize {
        self.scheduler.live_workers()
    }

    /// Arena accounting
    pub fn memory_stats(&self) -> &MemoryStats {
        self.scheduler.context().memory()
    }

    pub(crate) fn allocate(&self, class: ClassId) -> ObjectRef {
        ObjectRef::new(class, self.next_object.fetch_add(1, Ordering::Relaxed))
    }

    /// Fresh exception object of a builtin class
    pub(crate) fn exception(&self, class: ClassId, message: impl Into<String>) -> ManagedException {
        ManagedException::new(self.allocate(class), message)
    }

    pub(crate) fn fault(&self, fault: ArithFault) -> ManagedException {
        match fault {
            ArithFault::DivideByZero => self.exception(ClassId::ARITHMETIC_EXCEPTION, "divide by zero"),
            ArithFault::NotAnInteger => {
                self.exception(ClassId::CLASS_CAST_EXCEPTION, "operand is not an integer")
            }
        }
    }

    /// Exception for a `throw` of `value`
    pub(crate) fn thrown(&self, value: Value) -> ManagedException {
        match value {
            Value::Object(object) if self.linker.is_subclass(object.class, ClassId::THROWABLE) => {
                ManagedException::new(object, "thrown")
            }
            Value::Null => self.exception(ClassId::NULL_POINTER_EXCEPTION, "throw of null"),
            other => self.exception(
                ClassId::CLASS_CAST_EXCEPTION,
                format!("{} is not throwable", other),
            ),
        }
    }

    pub(crate) fn resolve_static(
        &self,
        caller: MethodId,
        method: MethodId,
    ) -> Result<Arc<Method>, ManagedException> {
        self.linker
            .get_method(caller, method, &self.resolution_errors)
            .ok_or_else(|| {
                self.exception(
                    ClassId::NO_SUCH_METHOD_ERROR,
                    format!("{} is not defined", method),
                )
            })
    }

    pub(crate) fn resolve_virtual_call(
        &self,
        caller: MethodId,
        declared: MethodId,
        receiver: Value,
    ) -> Result<Arc<Method>, ManagedException> {
        let class = match receiver {
            Value::Object(object) => object.class,
            Value::Null => {
                return Err(self.exception(
                    ClassId::NULL_POINTER_EXCEPTION,
                    format!("virtual call of {} on null", declared),
                ))
            }
            other => {
                return Err(self.exception(
                    ClassId::CLASS_CAST_EXCEPTION,
                    format!("virtual call of {} on {}", declared, other),
                ))
            }
        };
        match self.linker.resolve_virtual(declared, class) {
            Some(target) => self.resolve_static(caller, target),
            None => {
                self.resolution_errors.method_not_found(caller, declared);
                Err(self.exception(
                    ClassId::NO_SUCH_METHOD_ERROR,
                    format!("{} has no implementation of {}", class, declared),
                ))
            }
        }
    }

    pub(crate) fn new_object(&self, caller: MethodId, class: ClassId) -> Result<Value, ManagedException> {
        match self.linker.get_class(caller, class, &self.resolution_errors) {
            Some(def) => Ok(Value::Object(self.allocate(def.id))),
            None => Err(self.exception(
                ClassId::NO_CLASS_DEF_FOUND_ERROR,
                format!("{} is not defined", class),
            )),
        }
    }

    /// Cast check; null passes every cast
    pub(crate) fn instance_of(&self, value: Value, class: ClassId) -> bool {
        match value {
            Value::Null => true,
            Value::Object(object) => self.linker.is_subclass(object.class, class),
            _ => false,
        }
    }

    pub(crate) fn intrinsic(&self, id: IntrinsicId, args: &[Value]) -> Result<Value, ManagedException> {
        call_intrinsic(id, args).map_err(|fault| match fault {
            Some(fault) => self.fault(fault),
            None => self.exception(
                ClassId::ILLEGAL_ARGUMENT_EXCEPTION,
                format!("{} takes {} arguments, got {}", id.name(), id.arity(), args.len()),
            ),
        })
    }
}
