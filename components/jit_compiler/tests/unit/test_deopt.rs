use super::common::*;
use core_types::Value;
use jit_compiler::{Deoptimizer, InterpreterState};

#[test]
fn test_materialize_rebuilds_interpreter_frame() {
    let code = Harness::new().compile(&loop_chunk(), None, None).unwrap();
    let slots = vec![Value::Int(7), Value::Int(3), Value::Int(10), Value::Int(1)];
    let state = Deoptimizer::materialize(&code, &slots, 6);
    assert_eq!(
        state,
        InterpreterState {
            pc: 6,
            accumulator: Value::Int(7),
            registers: vec![Value::Int(3), Value::Int(10), Value::Int(1)],
        }
    );
}

#[test]
fn test_osr_then_deopt_preserves_state() {
    let code = Harness::new().compile(&loop_chunk(), None, Some(2)).unwrap();
    let state = InterpreterState {
        pc: 2,
        accumulator: Value::Bool(true),
        registers: vec![Value::Int(4), Value::Int(100), Value::Int(2)],
    };
    let entry = code.osr_entry(2).unwrap();
    let (slots, pc) = entry.enter_at(&code.frame_mapping, &state).unwrap();
    assert_eq!(pc, 2);
    assert_eq!(Deoptimizer::materialize(&code, &slots, pc), state);
}
