use super::common::*;
use core_types::Value;
use execution_engine::{CompilationEvent, CompilationStatus};

#[test]
fn test_hot_loop_enters_compiled_code() {
    let rt = runtime(eager_options(5));
    let mut thread = rt.attach_thread();
    assert_eq!(
        rt.invoke(&mut thread, COUNT_UP, &ints(&[0, 100, 1])),
        Ok(Value::Int(100))
    );

    let events = rt.events().for_method(COUNT_UP);
    assert!(events.contains(&CompilationEvent::OsrEntered {
        method: COUNT_UP,
        pc: 2,
    }));
    assert!(events
        .iter()
        .any(|event| matches!(event, CompilationEvent::Compiled { osr: true, .. })));
    assert_eq!(thread.depth(), 0);

    // The next call starts in the code the loop was compiled to
    let method = rt.method(COUNT_UP).unwrap();
    assert_eq!(method.status(), CompilationStatus::Compiled);
    assert_eq!(
        rt.invoke(&mut thread, COUNT_UP, &ints(&[0, 10, 3])),
        Ok(Value::Int(12))
    );
}

#[test]
fn test_osr_disabled_keeps_loop_interpreted() {
    let rt = runtime(eager_options(5).with_osr(false));
    let mut thread = rt.attach_thread();
    assert_eq!(
        rt.invoke(&mut thread, COUNT_UP, &ints(&[0, 50, 5])),
        Ok(Value::Int(50))
    );
    assert_eq!(
        rt.events()
            .count(|event| matches!(event, CompilationEvent::OsrEntered { .. })),
        0
    );
    assert_eq!(rt.method(COUNT_UP).unwrap().status(), CompilationStatus::NotCompiled);
}

#[test]
fn test_failed_osr_compilation_disables_osr() {
    let mut options = eager_options(3);
    options.max_bytecode_size = 4;
    let rt = runtime(options);
    let mut thread = rt.attach_thread();
    assert_eq!(
        rt.invoke(&mut thread, COUNT_UP, &ints(&[0, 20, 1])),
        Ok(Value::Int(20))
    );

    let method = rt.method(COUNT_UP).unwrap();
    assert!(method.is_osr_disabled());
    assert_eq!(method.status(), CompilationStatus::NotCompiled);
    assert_eq!(
        rt.events()
            .count(|event| matches!(event, CompilationEvent::CompilationFailed { osr: true, .. })),
        1
    );
}
