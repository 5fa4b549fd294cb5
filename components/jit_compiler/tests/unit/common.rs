use bytecode_system::{ArgRange, BytecodeChunk, Opcode, ProfileSites, RegisterId};
use core_types::{ClassId, DefaultBarrierSet, GcKind, MethodId};
use jit_compiler::{
    BaselineJIT, CompileError, CompileRequest, CompiledCode, Deoptimizer, MemoryStats,
    TaskArenas, VirtualResolver,
};
use profiling::ProfilingRecord;
use std::sync::Arc;

pub const SHAPE: ClassId = ClassId(20);
pub const CIRCLE: ClassId = ClassId(21);
pub const AREA: MethodId = MethodId(5);
pub const CIRCLE_AREA: MethodId = MethodId(6);

/// Resolves `AREA` on `CIRCLE` only
pub struct ShapeResolver;

impl VirtualResolver for ShapeResolver {
    fn resolve_virtual(&self, declared: MethodId, receiver: ClassId) -> Option<MethodId> {
        (declared == AREA && receiver == CIRCLE).then_some(CIRCLE_AREA)
    }
}

/// `return r0.area()`
pub fn virtual_call_chunk() -> BytecodeChunk {
    let mut chunk = BytecodeChunk::new(1, 1);
    chunk.emit(Opcode::CallVirtual {
        method: AREA,
        args: ArgRange::new(0, 1),
    });
    chunk.emit(Opcode::Return);
    chunk
}

/// `i = 0; while i < r1 { i = i + r2 }; return i`
pub fn loop_chunk() -> BytecodeChunk {
    let mut chunk = BytecodeChunk::new(3, 3);
    chunk.emit(Opcode::LdaInt(0));
    chunk.emit(Opcode::Sta(RegisterId(0)));
    let header = chunk.emit(Opcode::Lda(RegisterId(0)));
    chunk.emit(Opcode::CmpLt(RegisterId(1)));
    let exit = chunk.emit(Opcode::Jeqz(0));
    chunk.emit(Opcode::Lda(RegisterId(0)));
    chunk.emit(Opcode::Add(RegisterId(2)));
    chunk.emit(Opcode::Sta(RegisterId(0)));
    chunk.emit(Opcode::Jmp(header));
    let done = chunk.emit(Opcode::Lda(RegisterId(0)));
    chunk.emit(Opcode::Return);
    chunk.patch_jump(exit, done);
    chunk
}

pub fn profile_for(chunk: &BytecodeChunk) -> ProfilingRecord {
    ProfilingRecord::new(&ProfileSites::scan(chunk))
}

pub struct Harness {
    pub jit: BaselineJIT,
    pub stats: Arc<MemoryStats>,
    pub history: Deoptimizer,
    pub barriers: DefaultBarrierSet,
    pub arena_size: usize,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            jit: BaselineJIT::default(),
            stats: Arc::new(MemoryStats::new(1 << 20)),
            history: Deoptimizer::new(),
            barriers: DefaultBarrierSet::new(GcKind::Generational),
            arena_size: 64 * 1024,
        }
    }

    pub fn compile(
        &self,
        chunk: &BytecodeChunk,
        profile: Option<&ProfilingRecord>,
        osr_pc: Option<u32>,
    ) -> Result<CompiledCode, CompileError> {
        let mut arenas = TaskArenas::allocate(&self.stats, self.arena_size)?;
        let request = CompileRequest {
            method: MethodId(1),
            chunk,
            profile,
            history: &self.history,
            osr_pc,
            barriers: &self.barriers,
            resolver: &ShapeResolver,
        };
        self.jit.compile(&request, &mut arenas)
    }
}
