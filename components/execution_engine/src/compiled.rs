//! Compiled-code execution loop
//!
//! Runs the register-machine operations of [`CompiledCode`] over a segment
//! of compiled frames. Guards that fail hand the frame to the deoptimizer;
//! calls into interpreted callees recurse into the interpreter.

use crate::bindings::intrinsic_at;
use crate::bridge::{check_arity, select_code, Flow};
use crate::deopt::deoptimize_top;
use crate::frame::{CallerKind, CompiledFrame, Frame, FrameScope, InterpretedFrame};
use crate::interpreter::{self, cast_failure};
use crate::method::Method;
use crate::runtime::Runtime;
use crate::thread::ManagedThread;
use crate::unwinder::{unwind, UnwindOutcome};
use core_types::{IntrinsicId, ManagedException, Value};
use jit_compiler::{BranchTrap, CompiledCode, DeoptReason, MOp, Slot};
use std::sync::Arc;

/// Execute `frame` to completion in a new segment
pub(crate) fn run(
    rt: &Runtime,
    thread: &mut ManagedThread,
    frame: CompiledFrame,
) -> Result<Value, ManagedException> {
    let mut scope = FrameScope::enter(thread);
    if scope.frames.push(Frame::Compiled(frame)).is_err() {
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
                deliver(rt, scope, value)
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

fn top<'a>(scope: &'a mut FrameScope<'_>) -> &'a mut CompiledFrame {
    match scope.frames.top_mut() {
        Some(Frame::Compiled(frame)) => frame,
        _ => unreachable!("compiled segment holds a non-compiled frame"),
    }
}

/// Return `value` into the top frame, deoptimizing it if its code was
/// invalidated while the callee ran
fn deliver(rt: &Runtime, scope: &mut FrameScope<'_>, value: Value) -> Flow {
    let frame = top(scope);
    if frame.code.is_invalidated() {
        let resume_pc = frame.pc + 1;
        return deoptimize_top(rt, scope, DeoptReason::Explicit, resume_pc, Some(value));
    }
    frame.set_accumulator(value);
    frame.pc += 1;
    Flow::Continue
}

fn gather(slots: &[Value], args: &[Slot]) -> Vec<Value> {
    args.iter().map(|slot| slots[slot.index()]).collect()
}

fn step(rt: &Runtime, scope: &mut FrameScope<'_>) -> Flow {
    let frame = top(scope);
    let pc = frame.pc;
    let caller = frame.method.id();
    let CompiledFrame { code, slots, .. } = frame;
    let acc = slots[Slot::ACC.index()];

    match *code.op(pc) {
        MOp::Nop => {}
        MOp::LoadConst { dst, value } => slots[dst.index()] = value.value(),
        MOp::Move { dst, src } => slots[dst.index()] = slots[src.index()],

        MOp::IntArith { op, rhs, guard } => {
            let rhs = slots[rhs.index()];
            let result = if guard {
                match (acc, rhs) {
                    (Value::Int(a), Value::Int(b)) => match Value::checked_arith(op, a, b) {
                        Ok(Some(n)) => Ok(Value::Int(n)),
                        Ok(None) => {
                            return deoptimize_top(rt, scope, DeoptReason::Overflow, pc, None)
                        }
                        Err(fault) => Err(fault),
                    },
                    _ => return deoptimize_top(rt, scope, DeoptReason::TypeGuard, pc, None),
                }
            } else {
                Value::arith(op, acc, rhs)
            };
            match result {
                Ok(value) => slots[Slot::ACC.index()] = value,
                Err(fault) => return Flow::Throw(rt.fault(fault)),
            }
        }
        MOp::Compare { op, rhs } => match Value::compare(op, acc, slots[rhs.index()]) {
            Ok(value) => slots[Slot::ACC.index()] = value,
            Err(fault) => return Flow::Throw(rt.fault(fault)),
        },

        MOp::Jump { target } => return jump(rt, top(scope), pc, target),
        MOp::Branch {
            target,
            if_zero,
            trap,
        } => {
            let taken = acc.is_zero() == if_zero;
            let trapped = match trap {
                BranchTrap::None => false,
                BranchTrap::OnTaken => taken,
                BranchTrap::OnFallthrough => !taken,
            };
            if trapped {
                return deoptimize_top(rt, scope, DeoptReason::UncommonTrap, pc, None);
            }
            if taken {
                return jump(rt, top(scope), pc, target);
            }
        }

        MOp::CallStatic { method, ref args } => {
            let args = gather(slots, args);
            return match rt.resolve_static(caller, method) {
                Ok(callee) => call(rt, scope, callee, &args),
                Err(exception) => Flow::Throw(exception),
            };
        }
        MOp::CallVirtual { method, ref args } => {
            let args = gather(slots, args);
            let receiver = args.first().copied().unwrap_or_default();
            return match rt.resolve_virtual_call(caller, method, receiver) {
                Ok(callee) => call(rt, scope, callee, &args),
                Err(exception) => Flow::Throw(exception),
            };
        }
        MOp::CallGuarded {
            expected,
            target,
            ref args,
            ..
        } => {
            let args = gather(slots, args);
            let receiver = args.first().copied().unwrap_or_default();
            if receiver.class() != Some(expected) {
                return deoptimize_top(rt, scope, DeoptReason::InlineCacheMiss, pc, None);
            }
            return match rt.resolve_static(caller, target) {
                Ok(callee) => call(rt, scope, callee, &args),
                Err(exception) => Flow::Throw(exception),
            };
        }
        MOp::CallIntrinsic { id, ref args } => {
            let args = gather(slots, args);
            let id = patched_intrinsic(code, id);
            match rt.intrinsic(id, &args) {
                Ok(value) => slots[Slot::ACC.index()] = value,
                Err(exception) => return Flow::Throw(exception),
            }
        }

        MOp::NewObject { class } => {
            match rt.new_object(caller, class) {
                Ok(value) => top(scope).set_accumulator(value),
                Err(exception) => return Flow::Throw(exception),
            }
        }
        MOp::CheckCast { class, guard } => {
            if !rt.instance_of(acc, class) {
                if guard {
                    return deoptimize_top(rt, scope, DeoptReason::BadCast, pc, None);
                }
                return Flow::Throw(cast_failure(rt, acc, class));
            }
        }
        MOp::Throw => return Flow::Throw(rt.thrown(acc)),
        MOp::Return => {
            scope.frames.pop();
            return Flow::Deliver(acc);
        }
    }

    top(scope).pc += 1;
    Flow::Continue
}

/// Intrinsic actually called at a call site.
///
/// Code from an image calls through the image's patched table; JIT code
/// calls the intrinsic it names.
fn patched_intrinsic(code: &CompiledCode, id: IntrinsicId) -> IntrinsicId {
    let Some(table) = code.intrinsic_table() else {
        return id;
    };
    let address = table.get(id.index()).copied().unwrap_or_default();
    intrinsic_at(address).unwrap_or_else(|| {
        tracing::warn!(address, intrinsic = id.name(), "unpatched intrinsic table entry");
        id
    })
}

fn jump(rt: &Runtime, frame: &mut CompiledFrame, pc: u32, target: u32) -> Flow {
    frame.pc = target;
    if target <= pc {
        rt.safepoint().poll();
    }
    Flow::Continue
}

/// Invoke `callee` from the top compiled frame
fn call(rt: &Runtime, scope: &mut FrameScope<'_>, callee: Arc<Method>, args: &[Value]) -> Flow {
    if let Err(exception) = check_arity(rt, &callee, args) {
        return Flow::Throw(exception);
    }
    match select_code(rt, &callee) {
        Some(code) => {
            let frame = CompiledFrame::new(callee, code, args, CallerKind::Compiled);
            if scope.frames.push(Frame::Compiled(frame)).is_err() {
                return Flow::Throw(scope.stack_overflow_error());
            }
            rt.safepoint().poll();
            Flow::Continue
        }
        None => {
            let frame = InterpretedFrame::new(callee, args, CallerKind::Compiled);
            interpreter::run(rt, scope, frame).into()
        }
    }
}
