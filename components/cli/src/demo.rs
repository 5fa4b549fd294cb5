//! The bundled demo program
//!
//! A handful of small methods chosen so that running them repeatedly walks
//! through every tier: a loop hot enough for OSR, a virtual call that goes
//! monomorphic and later misses, a caught division fault and an intrinsic.

use crate::error::{CliError, CliResult};
use bytecode_system::{ArgRange, BytecodeChunk, Opcode, RegisterId, TryBlock};
use core_types::{ClassId, IntrinsicId, MethodId, ObjectRef, Value};
use execution_engine::{ClassRegistry, ManagedThread, Runtime, RuntimeOptions, VmError};
use jit_compiler::CodeOrigin;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

const DEMO: ClassId = ClassId(16);
const SHAPE: ClassId = ClassId(17);
const CIRCLE: ClassId = ClassId(18);
const SQUARE: ClassId = ClassId(19);

/// `sum_to(n)`: sum of `0..n`, computed in a loop
pub const SUM_TO: MethodId = MethodId(1);
/// `square(n)`
pub const SQUARE_OF: MethodId = MethodId(2);
const AREA: MethodId = MethodId(3);
const CIRCLE_AREA: MethodId = MethodId(4);
const SQUARE_AREA: MethodId = MethodId(5);
/// `area_of(shape)`: a virtual call of `Shape.area`
pub const AREA_OF: MethodId = MethodId(6);
/// `checked_div(a, b)`: `a / b`, or 0 when `b` is 0
pub const CHECKED_DIV: MethodId = MethodId(7);
/// `clamp(x, lo, hi)` through the runtime intrinsic
pub const CLAMP: MethodId = MethodId(8);

const METHODS: [MethodId; 6] = [SUM_TO, SQUARE_OF, AREA_OF, CHECKED_DIV, CLAMP, CIRCLE_AREA];

fn r(index: u16) -> RegisterId {
    RegisterId(index)
}

fn chunk(registers: u16, args: u16, ops: &[Opcode]) -> BytecodeChunk {
    let mut chunk = BytecodeChunk::new(registers, args);
    for op in ops {
        chunk.emit(*op);
    }
    chunk
}

fn sum_to() -> BytecodeChunk {
    chunk(
        4,
        1,
        &[
            Opcode::LdaInt(0),
            Opcode::Sta(r(1)),
            Opcode::Sta(r(2)),
            Opcode::LdaInt(1),
            Opcode::Sta(r(3)),
            // loop header
            Opcode::Lda(r(1)),
            Opcode::CmpLt(r(0)),
            Opcode::Jeqz(15),
            Opcode::Lda(r(2)),
            Opcode::Add(r(1)),
            Opcode::Sta(r(2)),
            Opcode::Lda(r(1)),
            Opcode::Add(r(3)),
            Opcode::Sta(r(1)),
            Opcode::Jmp(5),
            Opcode::Lda(r(2)),
            Opcode::Return,
        ],
    )
}

fn checked_div() -> BytecodeChunk {
    let mut chunk = chunk(
        2,
        2,
        &[
            Opcode::Lda(r(0)),
            Opcode::Div(r(1)),
            Opcode::Return,
            Opcode::LdaInt(0),
            Opcode::Return,
        ],
    );
    chunk.add_try_block(TryBlock {
        start: 0,
        end: 3,
        handler: 3,
        catch_class: Some(ClassId::ARITHMETIC_EXCEPTION),
    });
    chunk
}

/// Classes and methods of the demo
pub fn demo_program() -> Result<ClassRegistry, VmError> {
    let mut registry = ClassRegistry::new();
    let classes = [
        (DEMO, "Demo", ClassId::OBJECT),
        (SHAPE, "Shape", ClassId::OBJECT),
        (CIRCLE, "Circle", SHAPE),
        (SQUARE, "Square", SHAPE),
    ];
    let methods = [
        (SUM_TO, DEMO, "sum_to", sum_to()),
        (
            SQUARE_OF,
            DEMO,
            "square",
            chunk(1, 1, &[Opcode::Lda(r(0)), Opcode::Mul(r(0)), Opcode::Return]),
        ),
        (AREA, SHAPE, "area", chunk(1, 1, &[Opcode::LdaInt(0), Opcode::Return])),
        (CIRCLE_AREA, CIRCLE, "area", chunk(1, 1, &[Opcode::LdaInt(3), Opcode::Return])),
        (SQUARE_AREA, SQUARE, "area", chunk(1, 1, &[Opcode::LdaInt(4), Opcode::Return])),
        (
            AREA_OF,
            DEMO,
            "area_of",
            chunk(
                1,
                1,
                &[
                    Opcode::CallVirtual {
                        method: AREA,
                        args: ArgRange::new(0, 1),
                    },
                    Opcode::Return,
                ],
            ),
        ),
        (CHECKED_DIV, DEMO, "checked_div", checked_div()),
        (
            CLAMP,
            DEMO,
            "clamp",
            chunk(
                3,
                3,
                &[
                    Opcode::Intrinsic {
                        id: IntrinsicId::ClampI64,
                        args: ArgRange::new(0, 3),
                    },
                    Opcode::Return,
                ],
            ),
        ),
    ];

    for (id, name, superclass) in classes {
        registry.define_class(id, name, Some(superclass))?;
    }
    for (id, class, name, body) in methods {
        registry.define_method(id, class, name, body)?;
    }
    registry.override_method(CIRCLE, AREA, CIRCLE_AREA)?;
    registry.override_method(SQUARE, AREA, SQUARE_AREA)?;
    Ok(registry)
}

/// How one method ended up
#[derive(Debug, Clone, Serialize)]
pub struct MethodReport {
    /// Method id
    pub id: u32,
    /// Method name
    pub name: String,
    /// Final compilation status
    pub status: String,
    /// Origin of the installed code, if any
    pub origin: Option<CodeOrigin>,
    /// Invocations left before the counter expires again
    pub hotness: i32,
    /// Deoptimizations recorded against the method
    pub deopts: usize,
}

/// What `run-demo` prints
#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    /// Calls made per method
    pub iterations: u32,
    /// Per-method outcome
    pub methods: Vec<MethodReport>,
    /// Number of events of each kind
    pub events: BTreeMap<String, usize>,
    /// Compilations finished by the scheduler
    pub compilations: u64,
    /// Safepoint polls performed
    pub safepoint_polls: u64,
}

impl DemoReport {
    /// Human-readable rendering
    pub fn to_text(&self) -> String {
        let mut out = format!("demo ran {} iterations\n\nmethods:\n", self.iterations);
        for method in &self.methods {
            let origin = match method.origin {
                Some(CodeOrigin::Jit) => "jit",
                Some(CodeOrigin::Aot) => "aot",
                None => "-",
            };
            out.push_str(&format!(
                "  {:<12} {:<13} code={:<4} hotness={:<6} deopts={}\n",
                method.name, method.status, origin, method.hotness, method.deopts
            ));
        }
        out.push_str("\nevents:\n");
        for (kind, count) in &self.events {
            out.push_str(&format!("  {:<18} {}\n", kind, count));
        }
        out.push_str(&format!(
            "\ncompilations: {}\nsafepoint polls: {}\n",
            self.compilations, self.safepoint_polls
        ));
        out
    }
}

fn check(
    rt: &Runtime,
    thread: &mut ManagedThread,
    method: MethodId,
    args: &[i64],
    expected: i64,
) -> CliResult<()> {
    let args: Vec<Value> = args.iter().copied().map(Value::Int).collect();
    check_values(rt, thread, method, &args, expected)
}

fn check_values(
    rt: &Runtime,
    thread: &mut ManagedThread,
    method: MethodId,
    args: &[Value],
    expected: i64,
) -> CliResult<()> {
    let actual = rt.invoke(thread, method, args)?;
    if actual != Value::Int(expected) {
        return Err(CliError::WrongResult {
            method,
            expected: Value::Int(expected),
            actual,
        });
    }
    Ok(())
}

/// Run every demo method `iterations` times and check each result
pub fn run_demo(options: RuntimeOptions, iterations: u32) -> CliResult<DemoReport> {
    let rt = Runtime::with_registry(options.with_compiler_events(true), demo_program()?)?;
    let mut thread = rt.attach_thread();
    let circle = Value::Object(ObjectRef::new(CIRCLE, 1));
    let square = Value::Object(ObjectRef::new(SQUARE, 2));

    for i in 0..i64::from(iterations) {
        let n = i % 64;
        check(&rt, &mut thread, SUM_TO, &[n], n * (n - 1) / 2)?;
        check(&rt, &mut thread, SQUARE_OF, &[i], i * i)?;
        check_values(&rt, &mut thread, AREA_OF, &[circle], 3)?;
        let divisor = i % 5;
        let quotient = if divisor == 0 { 0 } else { 1_000 / divisor };
        check(&rt, &mut thread, CHECKED_DIV, &[1_000, divisor], quotient)?;
        check(&rt, &mut thread, CLAMP, &[i, 10, 100], i.clamp(10, 100))?;
    }
    // A new receiver class breaks the monomorphic call site
    check_values(&rt, &mut thread, AREA_OF, &[square], 4)?;

    let mut events = BTreeMap::new();
    for event in rt.events().snapshot() {
        let kind = serde_json::to_value(&event)?
            .get("event")
            .and_then(|kind| kind.as_str())
            .unwrap_or("unknown")
            .to_string();
        *events.entry(kind).or_insert(0) += 1;
    }

    let methods = METHODS
        .iter()
        .filter_map(|id| rt.method(*id))
        .map(|method| MethodReport {
            id: method.id().as_u32(),
            name: method.name().to_string(),
            status: method.status().to_string(),
            origin: method.compiled_code().map(|code| code.origin),
            hotness: method.hotness(),
            deopts: method.deopt_history().deopt_count(),
        })
        .collect();

    let report = DemoReport {
        iterations,
        methods,
        events,
        compilations: rt.scheduler_stats().completed,
        safepoint_polls: rt.safepoint().poll_count(),
    };
    info!(iterations, compilations = report.compilations, "demo finished");
    rt.destroy();
    Ok(report)
}
