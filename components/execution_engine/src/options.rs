//! Runtime configuration
//!
//! Every knob of the tiering machinery lives in [`RuntimeOptions`]. Options
//! deserialize from JSON with missing fields taking their defaults, so a
//! configuration file only needs to name what it changes.

use crate::error::VmError;
use core_types::GcKind;
use jit_compiler::CompilerConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How a thread waits for a compilation it may not run past
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitPolicy {
    /// First sleep, in microseconds
    pub initial_delay_us: u64,
    /// Longest sleep, in microseconds
    pub max_delay_us: u64,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            initial_delay_us: 10,
            max_delay_us: 1_000,
        }
    }
}

impl WaitPolicy {
    /// Sleep durations for successive attempts: doubling, capped at the maximum
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let max = self.max_delay_us.max(1);
        std::iter::successors(Some(self.initial_delay_us.clamp(1, max)), move |us| {
            Some(us.saturating_mul(2).min(max))
        })
        .map(Duration::from_micros)
    }
}

/// Runtime options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    /// Compile hot methods at all
    pub enable_jit: bool,
    /// Invocations (and back-edges) before a method is considered hot
    pub hotness_threshold: i32,
    /// Collect a profile before the first compilation
    pub enable_profiling: bool,
    /// Invocations spent profiling before compilation is requested
    pub profiling_threshold: i32,
    /// Compile on the requesting thread
    pub compile_in_place: bool,
    /// Let the requester keep interpreting while a worker compiles
    pub async_compilation: bool,
    /// Size of the background compiler pool
    pub compiler_threads: usize,
    /// Enter compiled code at loop headers
    pub enable_osr: bool,
    /// Frames a thread may hold before `StackOverflowError`
    pub max_stack_depth: usize,
    /// Collector the runtime runs with
    pub gc_kind: GcKind,
    /// Record compilation events
    pub compiler_events: bool,
    /// Log every compilation at info level
    pub compiler_log: bool,
    /// Bytes per task arena
    pub arena_size: usize,
    /// Bytes all live task arenas may hold together
    pub arena_budget: usize,
    /// Largest method the compiler accepts, in instructions
    pub max_bytecode_size: usize,
    /// Deoptimizations after which a method stops speculating
    pub max_deopts: u32,
    /// Branch samples before a one-sided branch becomes an uncommon trap
    pub uncommon_trap_min_samples: u64,
    /// Backoff for synchronous waits
    pub wait_policy: WaitPolicy,
    /// AOT images to load at startup
    pub aot_files: Vec<PathBuf>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            enable_jit: true,
            hotness_threshold: 1_000,
            enable_profiling: true,
            profiling_threshold: 200,
            compile_in_place: false,
            async_compilation: true,
            compiler_threads: 1,
            enable_osr: true,
            max_stack_depth: 1_024,
            gc_kind: GcKind::default(),
            compiler_events: false,
            compiler_log: false,
            arena_size: 256 * 1024,
            arena_budget: 16 * 1024 * 1024,
            max_bytecode_size: 10_000,
            max_deopts: 10,
            uncommon_trap_min_samples: 16,
            wait_policy: WaitPolicy::default(),
            aot_files: Vec::new(),
        }
    }
}

impl RuntimeOptions {
    /// Parse options from JSON; absent fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self, VmError> {
        let options: RuntimeOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Check the options are usable together
    pub fn validate(&self) -> Result<(), VmError> {
        if self.hotness_threshold < 1 {
            return Err(VmError::InvalidOptions(
                "hotness_threshold must be at least 1".into(),
            ));
        }
        if self.enable_profiling && self.profiling_threshold < 1 {
            return Err(VmError::InvalidOptions(
                "profiling_threshold must be at least 1".into(),
            ));
        }
        if self.enable_jit && !self.compile_in_place && self.compiler_threads == 0 {
            return Err(VmError::InvalidOptions(
                "background compilation needs at least one compiler thread".into(),
            ));
        }
        if self.max_stack_depth == 0 {
            return Err(VmError::InvalidOptions("max_stack_depth must be positive".into()));
        }
        if self.arena_size.saturating_mul(2) > self.arena_budget {
            return Err(VmError::InvalidOptions(format!(
                "arena budget {} cannot hold one task ({} bytes)",
                self.arena_budget,
                self.arena_size.saturating_mul(2)
            )));
        }
        Ok(())
    }

    /// Enable or disable the JIT
    pub fn with_jit(mut self, enable: bool) -> Self {
        self.enable_jit = enable;
        self
    }

    /// Set the hotness threshold
    pub fn with_hotness_threshold(mut self, threshold: i32) -> Self {
        self.hotness_threshold = threshold;
        self
    }

    /// Enable or disable profiling; `threshold` is used when enabling
    pub fn with_profiling(mut self, enable: bool, threshold: i32) -> Self {
        self.enable_profiling = enable;
        self.profiling_threshold = threshold;
        self
    }

    /// Compile on the requesting thread
    pub fn with_compile_in_place(mut self, in_place: bool) -> Self {
        self.compile_in_place = in_place;
        self
    }

    /// Allow or forbid interpreting while a background compilation runs
    pub fn with_async_compilation(mut self, enable: bool) -> Self {
        self.async_compilation = enable;
        self
    }

    /// Set the compiler pool size
    pub fn with_compiler_threads(mut self, threads: usize) -> Self {
        self.compiler_threads = threads;
        self
    }

    /// Enable or disable OSR
    pub fn with_osr(mut self, enable: bool) -> Self {
        self.enable_osr = enable;
        self
    }

    /// Set the stack depth limit
    pub fn with_max_stack_depth(mut self, depth: usize) -> Self {
        self.max_stack_depth = depth;
        self
    }

    /// Set the collector kind
    pub fn with_gc_kind(mut self, kind: GcKind) -> Self {
        self.gc_kind = kind;
        self
    }

    /// Record compilation events
    pub fn with_compiler_events(mut self, enable: bool) -> Self {
        self.compiler_events = enable;
        self
    }

    /// Set per-task arena size and the global budget
    pub fn with_arenas(mut self, arena_size: usize, budget: usize) -> Self {
        self.arena_size = arena_size;
        self.arena_budget = budget;
        self
    }

    /// Set the deoptimization limit
    pub fn with_max_deopts(mut self, max: u32) -> Self {
        self.max_deopts = max;
        self
    }

    /// Add an AOT image to load
    pub fn with_aot_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.aot_files.push(path.into());
        self
    }

    /// Settings handed to the baseline compiler
    pub fn compiler_config(&self) -> CompilerConfig {
        CompilerConfig {
            max_bytecode_size: self.max_bytecode_size,
            uncommon_trap_min_samples: self.uncommon_trap_min_samples,
            speculate: true,
            log: self.compiler_log,
        }
    }
}
