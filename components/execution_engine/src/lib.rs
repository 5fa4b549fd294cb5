//! Tiered execution engine
//!
//! Runs bytecode methods in an interpreter and moves hot methods into a
//! compiled tier. This crate holds the runtime side of that:
//!
//! - [`Runtime`] - options, class linker, loaded images and compiler threads
//! - the execution bridge choosing interpreted or compiled code per call,
//!   and entering compiled code mid-loop (OSR)
//! - [`CompilationScheduler`] - the per-method compilation state machine and
//!   the in-place and background dispatch modes
//! - exception unwinding across both representations, and deoptimization
//!   back to the interpreter when speculation fails or code is discarded
//! - [`AotManager`] - precompiled code from image files
//!
//! # Example
//!
//! ```
//! use bytecode_system::{BytecodeChunk, Opcode, RegisterId};
//! use core_types::{ClassId, MethodId, Value};
//! use execution_engine::{ClassRegistry, Runtime, RuntimeOptions};
//!
//! let mut registry = ClassRegistry::new();
//! registry.define_class(ClassId(20), "Main", Some(ClassId::OBJECT)).unwrap();
//!
//! // acc = r0 * r0
//! let mut square = BytecodeChunk::new(1, 1);
//! square.emit(Opcode::Lda(RegisterId(0)));
//! square.emit(Opcode::Mul(RegisterId(0)));
//! square.emit(Opcode::Return);
//! registry.define_method(MethodId(1), ClassId(20), "square", square).unwrap();
//!
//! let options = RuntimeOptions::default()
//!     .with_compile_in_place(true)
//!     .with_hotness_threshold(2)
//!     .with_profiling(false, 1);
//! let runtime = Runtime::with_registry(options, registry).unwrap();
//! let mut thread = runtime.attach_thread();
//!
//! for n in 0..4 {
//!     let result = runtime.invoke(&mut thread, MethodId(1), &[Value::Int(n)]);
//!     assert_eq!(result, Ok(Value::Int(n * n)));
//! }
//! assert!(runtime.method(MethodId(1)).unwrap().compiled_code().is_some());
//! runtime.destroy();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aot;
pub mod bindings;
mod bridge;
pub mod class_linker;
mod compiled;
mod deopt;
pub mod error;
pub mod events;
pub mod frame;
mod interpreter;
pub mod method;
pub mod options;
pub mod runtime;
pub mod safepoint;
pub mod scheduler;
pub mod thread;
mod unwinder;

// Re-export main types at crate root
pub use aot::{build_image, AotManager};
pub use bindings::{call_intrinsic, intrinsic_address, intrinsic_at, EngineBindings};
pub use bridge::ARCH_SUPPORTS_OSR;
pub use class_linker::{ClassDef, ClassLinker, ClassRegistry, LoggingErrorHandler, ResolutionErrorHandler};
pub use error::VmError;
pub use events::{CompilationEvent, EventLog};
pub use frame::{CallerKind, CompiledFrame, Frame, FrameStack, InterpretedFrame, UnwindFrame};
pub use method::{CompilationStatus, Method};
pub use options::{RuntimeOptions, WaitPolicy};
pub use runtime::Runtime;
pub use safepoint::Safepoint;
pub use scheduler::{CompilationScheduler, CompilationTask, CompilerContext, SchedulerStats};
pub use thread::ManagedThread;
pub use unwinder::UnwindOutcome;
