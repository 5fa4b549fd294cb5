use super::common::*;
use core_types::{ClassId, FrameTier, StackTraceElement, Value};
use execution_engine::{CallerKind, CompilationEvent, CompilationStatus};

#[test]
fn test_exception_crosses_into_interpreted_caller() {
    let rt = runtime(eager_options(2));
    let mut thread = rt.attach_thread();
    for _ in 0..2 {
        let error = rt.invoke(&mut thread, THROWER, &[]).unwrap_err();
        assert_eq!(error.class(), ClassId::ARITHMETIC_EXCEPTION);
    }
    assert_eq!(rt.method(THROWER).unwrap().status(), CompilationStatus::Compiled);
    rt.events().clear();

    assert_eq!(rt.invoke(&mut thread, GUARDED_CALL, &[]), Ok(Value::Int(-1)));
    assert_eq!(
        rt.method(GUARDED_CALL).unwrap().status(),
        CompilationStatus::NotCompiled
    );
    assert_eq!(
        rt.events().snapshot(),
        vec![
            CompilationEvent::BoundaryDrop {
                method: THROWER,
                caller: CallerKind::Interpreted,
                return_pc: Some(1),
            },
            CompilationEvent::ExceptionCaught {
                method: GUARDED_CALL,
                class: ClassId::ARITHMETIC_EXCEPTION,
                handler: 2,
            },
        ]
    );
    assert_eq!(thread.depth(), 0);
}

#[test]
fn test_uncaught_exception_reaches_embedder() {
    let rt = runtime(eager_options(1));
    let mut thread = rt.attach_thread();
    let error = rt.invoke(&mut thread, THROWER, &[]).unwrap_err();
    assert_eq!(
        error.stack,
        vec![StackTraceElement {
            method: THROWER,
            pc: 1,
            tier: FrameTier::Compiled,
        }]
    );
    assert!(rt.events().snapshot().contains(&CompilationEvent::BoundaryDrop {
        method: THROWER,
        caller: CallerKind::Native,
        return_pc: None,
    }));
}

#[test]
fn test_compiled_handler_catches() {
    let rt = runtime(eager_options(1));
    let mut thread = rt.attach_thread();
    assert_eq!(rt.invoke(&mut thread, SAFE_DIVIDE, &ints(&[4])), Ok(Value::Int(25)));
    assert!(rt.method(SAFE_DIVIDE).unwrap().compiled_code().is_some());

    assert_eq!(rt.invoke(&mut thread, SAFE_DIVIDE, &ints(&[0])), Ok(Value::Int(0)));
    assert_eq!(
        rt.events()
            .count(|event| matches!(event, CompilationEvent::ExceptionCaught { handler: 3, .. })),
        1
    );
    assert_eq!(
        rt.events()
            .count(|event| matches!(event, CompilationEvent::Deoptimized { .. })),
        0
    );
}

#[test]
fn test_compiled_recursion_overflows() {
    let rt = runtime(eager_options(1).with_max_stack_depth(32));
    let mut thread = rt.attach_thread();
    let error = rt.invoke(&mut thread, RECURSE, &[]).unwrap_err();
    assert_eq!(error.class(), ClassId::STACK_OVERFLOW_ERROR);
    assert_eq!(thread.depth(), 0);

    // The thread is usable afterwards
    assert_eq!(rt.invoke(&mut thread, ADD, &ints(&[1, 2])), Ok(Value::Int(3)));
}

#[test]
fn test_arity_mismatch() {
    let rt = runtime(eager_options(1));
    let mut thread = rt.attach_thread();
    let error = rt.invoke(&mut thread, ADD, &ints(&[1])).unwrap_err();
    assert_eq!(error.class(), ClassId::ILLEGAL_ARGUMENT_EXCEPTION);
    assert!(rt.method(ADD).unwrap().compiled_code().is_none());
}
