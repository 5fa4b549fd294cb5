//! Baseline JIT compiler
//!
//! Template-based compilation: every bytecode instruction is translated to
//! one compiled operation. Profiling feedback and the method's
//! deoptimization history decide where guarded fast paths are emitted.

use crate::arena::TaskArenas;
use crate::code::{BranchTrap, CodeOrigin, CompiledCode, Const, HandlerEntry, MOp, Slot};
use crate::deopt::Deoptimizer;
use crate::error::CompileError;
use crate::osr::{FrameMapping, OSREntry, RegisterLocation};
use bytecode_system::{ArgRange, BytecodeChunk, Opcode, RegisterId};
use core_types::{ArithOp, BarrierPosition, ClassId, CmpOp, GcBarrierSet, MethodId};
use profiling::ProfilingRecord;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Resolves virtual call targets for guarded dispatch
pub trait VirtualResolver: Send + Sync {
    /// Method a virtual call of `declared` reaches for receivers of `receiver`
    fn resolve_virtual(&self, declared: MethodId, receiver: ClassId) -> Option<MethodId>;
}

/// Compiler settings
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Methods with more instructions fail to compile
    pub max_bytecode_size: usize,
    /// Branch samples needed before a never-taken side becomes a trap
    pub uncommon_trap_min_samples: u64,
    /// Emit guarded fast paths at all
    pub speculate: bool,
    /// Log every compilation at info level
    pub log: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_bytecode_size: 10_000,
            uncommon_trap_min_samples: 16,
            speculate: true,
            log: false,
        }
    }
}

/// Everything one compilation reads
pub struct CompileRequest<'a> {
    /// Method being compiled
    pub method: MethodId,
    /// Its bytecode
    pub chunk: &'a BytecodeChunk,
    /// Its profile, if one was collected
    pub profile: Option<&'a ProfilingRecord>,
    /// Its deoptimization history
    pub history: &'a Deoptimizer,
    /// Loop header an OSR compilation must be enterable at
    pub osr_pc: Option<u32>,
    /// Barrier interface of the configured collector
    pub barriers: &'a dyn GcBarrierSet,
    /// Virtual target resolution
    pub resolver: &'a dyn VirtualResolver,
}

/// Statistics for baseline JIT compilation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaselineStats {
    /// Number of functions compiled
    pub functions_compiled: u64,
    /// Number of those compiled for OSR
    pub osr_compilations: u64,
    /// Number of failed compilations
    pub failures: u64,
    /// Total code size generated
    pub total_code_size: u64,
    /// Guards emitted across all compilations
    pub guards_emitted: u64,
}

#[derive(Debug, Default)]
struct AtomicStats {
    functions_compiled: AtomicU64,
    osr_compilations: AtomicU64,
    failures: AtomicU64,
    total_code_size: AtomicU64,
    guards_emitted: AtomicU64,
}

/// Baseline JIT compiler
///
/// Characteristics:
/// - One compiled operation per bytecode instruction
/// - Accumulator in slot 0, touched registers compacted behind it
/// - Guarded integer arithmetic, casts, monomorphic calls and uncommon
///   branches, each with a deoptimization point
/// - Safe to share between compiler threads
#[derive(Debug, Default)]
pub struct BaselineJIT {
    config: CompilerConfig,
    stats: AtomicStats,
}

impl BaselineJIT {
    /// Create a new baseline JIT compiler
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            stats: AtomicStats::default(),
        }
    }

    /// Compiler settings
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile a method.
    ///
    /// Memory for the result and for scratch data is claimed from the task's
    /// arenas; running out fails the compilation.
    pub fn compile(
        &self,
        request: &CompileRequest<'_>,
        arenas: &mut TaskArenas,
    ) -> Result<CompiledCode, CompileError> {
        match self.compile_inner(request, arenas) {
            Ok(code) => {
                self.stats.functions_compiled.fetch_add(1, Ordering::Relaxed);
                if request.osr_pc.is_some() {
                    self.stats.osr_compilations.fetch_add(1, Ordering::Relaxed);
                }
                self.stats
                    .total_code_size
                    .fetch_add(code.code_size() as u64, Ordering::Relaxed);
                self.stats
                    .guards_emitted
                    .fetch_add(code.guard_count() as u64, Ordering::Relaxed);
                if self.config.log {
                    info!(method = %request.method, ops = code.ops.len(), guards = code.guard_count(), osr = request.osr_pc.is_some(), "compiled method");
                } else {
                    debug!(method = %request.method, ops = code.ops.len(), guards = code.guard_count(), "compiled method");
                }
                Ok(code)
            }
            Err(err) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                if self.config.log {
                    info!(method = %request.method, error = %err, "compilation failed");
                } else {
                    debug!(method = %request.method, error = %err, "compilation failed");
                }
                Err(err)
            }
        }
    }

    fn compile_inner(
        &self,
        request: &CompileRequest<'_>,
        arenas: &mut TaskArenas,
    ) -> Result<CompiledCode, CompileError> {
        let chunk = request.chunk;
        if chunk.instructions.is_empty() {
            return Err(CompileError::EmptyMethod);
        }
        if chunk.instruction_count() > self.config.max_bytecode_size {
            return Err(CompileError::TooLarge {
                size: chunk.instruction_count(),
                limit: self.config.max_bytecode_size,
            });
        }
        chunk.validate()?;

        arenas
            .local
            .alloc(chunk.register_count as usize * std::mem::size_of::<Option<Slot>>())?;
        let (slots, mapping) = allocate_slots(chunk);

        let lowering = Lowering {
            request,
            slots: &slots,
            speculate: self.config.speculate && !request.history.should_disable_optimization(),
            min_samples: self.config.uncommon_trap_min_samples,
        };
        let ops = chunk
            .instructions
            .iter()
            .enumerate()
            .map(|(pc, op)| lowering.lower(pc as u32, op))
            .collect::<Result<Vec<_>, _>>()?;
        arenas
            .general
            .alloc(ops.len() * std::mem::size_of::<MOp>())?;

        let handlers = chunk
            .try_blocks
            .iter()
            .map(|block| HandlerEntry {
                start: block.start,
                end: block.end,
                handler: block.handler,
                catch_class: block.catch_class,
            })
            .collect();
        let osr_entries: Vec<OSREntry> = chunk
            .loop_headers()
            .into_iter()
            .map(|pc| OSREntry::new(pc, pc))
            .collect();
        if let Some(pc) = request.osr_pc {
            if !osr_entries.iter().any(|entry| entry.bytecode_offset == pc) {
                return Err(CompileError::NoOsrEntry(pc));
            }
        }

        let barrier = request.barriers.barrier_kind();
        if let Some(operand) = request
            .barriers
            .barrier_operand(BarrierPosition::Post, "card_table")
        {
            debug!(operand = %operand.name, address = operand.address, "post barrier operand");
        }

        Ok(CompiledCode::new(
            request.method,
            ops,
            mapping.native_frame_size as u16,
            mapping,
            handlers,
            osr_entries,
            barrier,
            CodeOrigin::Jit,
        ))
    }

    /// Get compilation statistics
    pub fn stats(&self) -> BaselineStats {
        BaselineStats {
            functions_compiled: self.stats.functions_compiled.load(Ordering::Relaxed),
            osr_compilations: self.stats.osr_compilations.load(Ordering::Relaxed),
            failures: self.stats.failures.load(Ordering::Relaxed),
            total_code_size: self.stats.total_code_size.load(Ordering::Relaxed),
            guards_emitted: self.stats.guards_emitted.load(Ordering::Relaxed),
        }
    }
}

/// Give every register the method touches a slot behind the accumulator
fn allocate_slots(chunk: &BytecodeChunk) -> (Vec<Option<Slot>>, FrameMapping) {
    let mut used = vec![false; chunk.register_count as usize];
    for op in &chunk.instructions {
        if let Some(RegisterId(r)) = op.register() {
            used[r as usize] = true;
        }
        if let Some(args) = op.args() {
            for r in args.registers() {
                used[r] = true;
            }
        }
    }

    let mut mapping = FrameMapping::new();
    let mut slots = Vec::with_capacity(used.len());
    let mut next = 1u16;
    for is_used in used {
        if is_used {
            slots.push(Some(Slot(next)));
            mapping.add_register(RegisterLocation::Stack(Slot(next)));
            next += 1;
        } else {
            slots.push(None);
            mapping.add_register(RegisterLocation::Constant(Const::Null));
        }
    }
    mapping.set_native_frame_size(next as usize);
    mapping.set_interpreter_frame_size(chunk.register_count as usize);
    (slots, mapping)
}

struct Lowering<'r, 'a> {
    request: &'r CompileRequest<'a>,
    slots: &'r [Option<Slot>],
    speculate: bool,
    min_samples: u64,
}

impl Lowering<'_, '_> {
    fn slot(&self, register: RegisterId) -> Result<Slot, CompileError> {
        self.slots
            .get(register.index())
            .copied()
            .flatten()
            .ok_or_else(|| CompileError::Backend(format!("r{} has no slot", register.0)))
    }

    fn args(&self, args: ArgRange) -> Result<Vec<Slot>, CompileError> {
        args.registers()
            .map(|r| self.slot(RegisterId(r as u16)))
            .collect()
    }

    fn may_speculate(&self, pc: u32) -> bool {
        self.speculate && !self.request.history.is_suppressed(pc)
    }

    fn arith(&self, pc: u32, op: ArithOp, rhs: RegisterId) -> Result<MOp, CompileError> {
        Ok(MOp::IntArith {
            op,
            rhs: self.slot(rhs)?,
            guard: self.may_speculate(pc),
        })
    }

    fn compare(&self, op: CmpOp, rhs: RegisterId) -> Result<MOp, CompileError> {
        Ok(MOp::Compare {
            op,
            rhs: self.slot(rhs)?,
        })
    }

    fn branch_trap(&self, pc: u32) -> BranchTrap {
        let profile = match self.request.profile {
            Some(profile) if self.may_speculate(pc) => profile,
            _ => return BranchTrap::None,
        };
        let counter = profile.branch(pc);
        if counter.total() < self.min_samples {
            BranchTrap::None
        } else if counter.taken() == 0 {
            BranchTrap::OnTaken
        } else if counter.not_taken() == 0 {
            BranchTrap::OnFallthrough
        } else {
            BranchTrap::None
        }
    }

    fn virtual_call(&self, pc: u32, method: MethodId, args: ArgRange) -> Result<MOp, CompileError> {
        let args = self.args(args)?;
        let speculated = self
            .request
            .profile
            .filter(|_| self.may_speculate(pc))
            .and_then(|profile| profile.inline_cache(pc).monomorphic_class())
            .and_then(|expected| {
                self.request
                    .resolver
                    .resolve_virtual(method, expected)
                    .map(|target| (expected, target))
            });
        Ok(match speculated {
            Some((expected, target)) => MOp::CallGuarded {
                method,
                expected,
                target,
                args,
            },
            None => MOp::CallVirtual { method, args },
        })
    }

    fn lower(&self, pc: u32, op: &Opcode) -> Result<MOp, CompileError> {
        Ok(match *op {
            Opcode::Nop => MOp::Nop,
            Opcode::LdaInt(n) => MOp::LoadConst {
                dst: Slot::ACC,
                value: Const::Int(n),
            },
            Opcode::LdaBool(b) => MOp::LoadConst {
                dst: Slot::ACC,
                value: Const::Bool(b),
            },
            Opcode::LdaNull => MOp::LoadConst {
                dst: Slot::ACC,
                value: Const::Null,
            },
            Opcode::Lda(r) => MOp::Move {
                dst: Slot::ACC,
                src: self.slot(r)?,
            },
            Opcode::Sta(r) => MOp::Move {
                dst: self.slot(r)?,
                src: Slot::ACC,
            },
            Opcode::Add(r) => self.arith(pc, ArithOp::Add, r)?,
            Opcode::Sub(r) => self.arith(pc, ArithOp::Sub, r)?,
            Opcode::Mul(r) => self.arith(pc, ArithOp::Mul, r)?,
            Opcode::Div(r) => self.arith(pc, ArithOp::Div, r)?,
            Opcode::CmpLt(r) => self.compare(CmpOp::Lt, r)?,
            Opcode::CmpEq(r) => self.compare(CmpOp::Eq, r)?,
            Opcode::Jmp(target) => MOp::Jump { target },
            Opcode::Jeqz(target) => MOp::Branch {
                target,
                if_zero: true,
                trap: self.branch_trap(pc),
            },
            Opcode::Jnez(target) => MOp::Branch {
                target,
                if_zero: false,
                trap: self.branch_trap(pc),
            },
            Opcode::Call { method, args } => MOp::CallStatic {
                method,
                args: self.args(args)?,
            },
            Opcode::CallVirtual { method, args } => self.virtual_call(pc, method, args)?,
            Opcode::Intrinsic { id, args } => MOp::CallIntrinsic {
                id,
                args: self.args(args)?,
            },
            Opcode::NewObject(class) => MOp::NewObject { class },
            Opcode::CheckCast(class) => MOp::CheckCast {
                class,
                guard: self.may_speculate(pc),
            },
            Opcode::Throw => MOp::Throw,
            Opcode::Return => MOp::Return,
        })
    }
}
