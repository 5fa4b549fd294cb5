//! Full Pipeline Integration Tests
//!
//! Tests the complete flow: bytecode -> profiling -> compilation (JIT or
//! image) -> compiled execution, checked against pure interpretation.

use core_types::{MethodId, Value};
use execution_engine::{build_image, CompilationStatus, Runtime, RuntimeOptions};
use jit_compiler::CodeOrigin;
use tvm_cli::demo::{demo_program, AREA_OF, CHECKED_DIV, CLAMP, SQUARE_OF, SUM_TO};

fn calls() -> Vec<(MethodId, Vec<Value>)> {
    let mut calls = Vec::new();
    for i in 0..120i64 {
        calls.push((SUM_TO, vec![Value::Int(i % 40)]));
        calls.push((SQUARE_OF, vec![Value::Int(i - 60)]));
        calls.push((CHECKED_DIV, vec![Value::Int(i * 7), Value::Int(i % 3)]));
        calls.push((CLAMP, vec![Value::Int(i), Value::Int(20), Value::Int(80)]));
    }
    calls
}

fn run_all(options: RuntimeOptions) -> (Runtime, Vec<Value>) {
    let rt = Runtime::with_registry(options, demo_program().unwrap()).unwrap();
    let mut thread = rt.attach_thread();
    let results = calls()
        .iter()
        .map(|(method, args)| rt.invoke(&mut thread, *method, args).unwrap())
        .collect();
    drop(thread);
    (rt, results)
}

fn tiered() -> RuntimeOptions {
    RuntimeOptions::default()
        .with_compile_in_place(true)
        .with_hotness_threshold(8)
        .with_profiling(true, 4)
        .with_compiler_events(true)
}

/// Test: every tier computes what the interpreter computes
#[test]
fn test_full_pipeline_matches_interpreter() {
    let (_, expected) = run_all(RuntimeOptions::default().with_jit(false));
    let (rt, actual) = run_all(tiered());
    assert_eq!(actual, expected);

    for method in [SUM_TO, SQUARE_OF, CHECKED_DIV, CLAMP] {
        let method = rt.method(method).unwrap();
        assert_eq!(method.status(), CompilationStatus::Compiled, "{:?}", method);
        assert_eq!(method.compiled_code().unwrap().origin, CodeOrigin::Jit);
    }
    assert!(rt.compiler_stats().functions_compiled >= 4);
    rt.destroy();
}

/// Test: background compilation converges on the same results
#[test]
fn test_full_pipeline_background_compiler() {
    let (_, expected) = run_all(RuntimeOptions::default().with_jit(false));
    let options = tiered()
        .with_compile_in_place(false)
        .with_async_compilation(true)
        .with_compiler_threads(2);
    let (rt, actual) = run_all(options);
    assert_eq!(actual, expected);
    assert_eq!(rt.compiler_threads(), 2);
    rt.destroy();
}

/// Test: code from an image gives the same results
#[test]
fn test_full_pipeline_from_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("demo.img");
    build_image(&demo_program().unwrap(), &RuntimeOptions::default())
        .unwrap()
        .write_to_file(&path)
        .unwrap();

    let (_, expected) = run_all(RuntimeOptions::default().with_jit(false));
    // OSR compiles loops with the JIT; keep every method on image code
    let (rt, actual) = run_all(tiered().with_osr(false).with_aot_file(&path));
    assert_eq!(actual, expected);
    for method in [SUM_TO, SQUARE_OF, CHECKED_DIV, CLAMP] {
        let code = rt.method(method).unwrap().compiled_code().unwrap();
        assert_eq!(code.origin, CodeOrigin::Aot);
    }
    assert_eq!(rt.compiler_stats().functions_compiled, 0);
    // Never called, so never looked up
    assert!(rt.method(AREA_OF).unwrap().compiled_code().is_none());
}
