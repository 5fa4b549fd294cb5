//! Bytecode interpreter
//!
//! Fetch/dispatch loop over a segment of interpreted frames. Calls to
//! interpreted callees push a frame and stay in the loop; calls to compiled
//! callees and OSR hand the thread to the compiled loop.

use crate::bridge::{check_arity, osr_code, select_code, Flow};
use crate::compiled;
use crate::events::CompilationEvent;
use crate::frame::{CallerKind, CompiledFrame, Frame, FrameScope, InterpretedFrame};
use crate::method::Method;
use crate::runtime::Runtime;
use crate::thread::ManagedThread;
use crate::unwinder::{unwind, UnwindOutcome};
use bytecode_system::{ArgRange, Opcode, RegisterId};
use core_types::{ArithOp, ClassId, CmpOp, ManagedException, Value};
use jit_compiler::CompiledCode;
use std::sync::Arc;
use tracing::{debug, warn};

/// Interpret `frame` to completion in a new segment
pub(crate) fn run(
    rt: &Runtime,
    thread: &mut ManagedThread,
    frame: InterpretedFrame,
) -> Result<Value, ManagedException> {
    let mut scope = FrameScope::enter(thread);
    if scope.frames.push(Frame::Interpreted(frame)).is_err() {
        return Err(scope.stack_overflow_error());
    }
    rt.safepoint().poll();
    execute(rt, &mut scope)
}

fn execute(rt: &Runtime, scope: &mut FrameScope<'_>) -> Result<Value, ManagedException> {
    let mut flow = Flow::Continue;
    loop {
        flow = match flow {
            Flow::Continue => step(rt, scope),
            Flow::Deliver(value) => {
                if scope.is_segment_empty() {
                    return Ok(value);
                }
                let frame = top(scope);
                frame.accumulator = value;
                frame.pc += 1;
                Flow::Continue
            }
            Flow::Throw(exception) => {
                if scope.is_segment_empty() {
                    return Err(exception);
                }
                match unwind(rt, scope, exception) {
                    UnwindOutcome::Resume { .. } => Flow::Continue,
                    UnwindOutcome::BoundaryDrop(exception) => return Err(exception),
                }
            }
        };
    }
}

fn top<'a>(scope: &'a mut FrameScope<'_>) -> &'a mut InterpretedFrame {
    match scope.frames.top_mut() {
        Some(Frame::Interpreted(frame)) => frame,
        _ => unreachable!("interpreter segment holds a non-interpreted frame"),
    }
}

fn step(rt: &Runtime, scope: &mut FrameScope<'_>) -> Flow {
    let frame = top(scope);
    let pc = frame.pc;
    let op = match frame.method.chunk().get(pc).copied() {
        Some(op) => op,
        // Running off the end returns the accumulator
        None => {
            let value = frame.accumulator;
            scope.frames.pop();
            return Flow::Deliver(value);
        }
    };

    match op {
        Opcode::Nop => {}
        Opcode::LdaInt(n) => frame.accumulator = Value::Int(n),
        Opcode::LdaBool(b) => frame.accumulator = Value::Bool(b),
        Opcode::LdaNull => frame.accumulator = Value::Null,
        Opcode::Lda(r) => frame.accumulator = frame.registers[r.index()],
        Opcode::Sta(r) => frame.registers[r.index()] = frame.accumulator,

        Opcode::Add(r) => return arith(rt, frame, ArithOp::Add, r),
        Opcode::Sub(r) => return arith(rt, frame, ArithOp::Sub, r),
        Opcode::Mul(r) => return arith(rt, frame, ArithOp::Mul, r),
        Opcode::Div(r) => return arith(rt, frame, ArithOp::Div, r),
        Opcode::CmpLt(r) => return compare(rt, frame, CmpOp::Lt, r),
        Opcode::CmpEq(r) => return compare(rt, frame, CmpOp::Eq, r),

        Opcode::Jmp(target) => return jump(rt, scope, target),
        Opcode::Jeqz(target) | Opcode::Jnez(target) => {
            let taken = frame.accumulator.is_zero() == matches!(op, Opcode::Jeqz(_));
            if let Some(profile) = &frame.profile {
                profile.update_branch(pc, taken);
            }
            if taken {
                return jump(rt, scope, target);
            }
        }

        Opcode::Call { method, args } => {
            let caller = frame.method.id();
            let args = gather(frame, args);
            return match rt.resolve_static(caller, method) {
                Ok(callee) => call(rt, scope, callee, &args),
                Err(exception) => Flow::Throw(exception),
            };
        }
        Opcode::CallVirtual { method, args } => {
            let caller = frame.method.id();
            let args = gather(frame, args);
            let receiver = args.first().copied().unwrap_or_default();
            if let (Some(profile), Some(class)) = (&frame.profile, receiver.class()) {
                profile.update_inline_cache(pc, class);
            }
            return match rt.resolve_virtual_call(caller, method, receiver) {
                Ok(callee) => call(rt, scope, callee, &args),
                Err(exception) => Flow::Throw(exception),
            };
        }
        Opcode::Intrinsic { id, args } => {
            let args = gather(frame, args);
            match rt.intrinsic(id, &args) {
                Ok(value) => frame.accumulator = value,
                Err(exception) => return Flow::Throw(exception),
            }
        }

        Opcode::NewObject(class) => match rt.new_object(frame.method.id(), class) {
            Ok(value) => frame.accumulator = value,
            Err(exception) => return Flow::Throw(exception),
        },
        Opcode::CheckCast(class) => {
            if !rt.instance_of(frame.accumulator, class) {
                return Flow::Throw(cast_failure(rt, frame.accumulator, class));
            }
        }
        Opcode::Throw => {
            if let Some(profile) = &frame.profile {
                profile.update_throw(pc);
            }
            return Flow::Throw(rt.thrown(frame.accumulator));
        }
        Opcode::Return => {
            let value = frame.accumulator;
            scope.frames.pop();
            return Flow::Deliver(value);
        }
    }

    frame.pc += 1;
    Flow::Continue
}

fn gather(frame: &InterpretedFrame, args: ArgRange) -> Vec<Value> {
    frame.registers[args.registers()].to_vec()
}

fn arith(rt: &Runtime, frame: &mut InterpretedFrame, op: ArithOp, rhs: RegisterId) -> Flow {
    match Value::arith(op, frame.accumulator, frame.registers[rhs.index()]) {
        Ok(value) => {
            frame.accumulator = value;
            frame.pc += 1;
            Flow::Continue
        }
        Err(fault) => Flow::Throw(rt.fault(fault)),
    }
}

fn compare(rt: &Runtime, frame: &mut InterpretedFrame, op: CmpOp, rhs: RegisterId) -> Flow {
    match Value::compare(op, frame.accumulator, frame.registers[rhs.index()]) {
        Ok(value) => {
            frame.accumulator = value;
            frame.pc += 1;
            Flow::Continue
        }
        Err(fault) => Flow::Throw(rt.fault(fault)),
    }
}

pub(crate) fn cast_failure(rt: &Runtime, value: Value, class: ClassId) -> ManagedException {
    rt.exception(
        ClassId::CLASS_CAST_EXCEPTION,
        format!("{} cannot be cast to {}", value, class),
    )
}

/// Move to `target`; backward jumps are safepoints and OSR candidates
fn jump(rt: &Runtime, scope: &mut FrameScope<'_>, target: u32) -> Flow {
    let frame = top(scope);
    let backward = target <= frame.pc;
    frame.pc = target;
    if !backward {
        return Flow::Continue;
    }
    rt.safepoint().poll();
    match osr_code(rt, top(scope), target) {
        Some(code) => enter_osr(rt, scope, code, target),
        None => Flow::Continue,
    }
}

/// Replace the top interpreted frame with a compiled frame at `header`
fn enter_osr(rt: &Runtime, scope: &mut FrameScope<'_>, code: Arc<CompiledCode>, header: u32) -> Flow {
    let frame = top(scope);
    let Some(entry) = code.osr_entry(header) else {
        return Flow::Continue;
    };
    let (slots, pc) = match entry.enter_at(&code.frame_mapping, &frame.state()) {
        Ok(entered) => entered,
        Err(error) => {
            warn!(method = %frame.method.id(), %error, "OSR entry rejected frame");
            frame.method.disable_osr();
            return Flow::Continue;
        }
    };
    let Some(Frame::Interpreted(frame)) = scope.frames.pop() else {
        unreachable!("OSR source frame vanished");
    };
    let method: Arc<Method> = frame.method;
    rt.events().record(CompilationEvent::OsrEntered {
        method: method.id(),
        pc: header,
    });
    debug!(method = %method.id(), pc = header, "entering compiled code through OSR");
    let compiled = CompiledFrame::resume(method, code, slots, pc, frame.caller);
    compiled::run(rt, scope, compiled).into()
}

/// Invoke `callee` from the top interpreted frame
fn call(rt: &Runtime, scope: &mut FrameScope<'_>, callee: Arc<Method>, args: &[Value]) -> Flow {
    if let Err(exception) = check_arity(rt, &callee, args) {
        return Flow::Throw(exception);
    }
    match select_code(rt, &callee) {
        Some(code) => {
            let frame = CompiledFrame::new(callee, code, args, CallerKind::Interpreted);
            compiled::run(rt, scope, frame).into()
        }
        None => {
            let frame = InterpretedFrame::new(callee, args, CallerKind::Interpreted);
            if scope.frames.push(Frame::Interpreted(frame)).is_err() {
                return Flow::Throw(scope.stack_overflow_error());
            }
            rt.safepoint().poll();
            Flow::Continue
        }
    }
}
