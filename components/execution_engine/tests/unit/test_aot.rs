use super::common::*;
use core_types::{GcKind, IntrinsicId, Value};
use execution_engine::{build_image, CompilationEvent, CompilationStatus, Runtime};
use jit_compiler::CodeOrigin;

#[test]
fn test_image_code_replaces_compilation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("program.img");
    let options = eager_options(1);
    build_image(&program(), &options)
        .unwrap()
        .write_to_file(&path)
        .unwrap();

    let rt = Runtime::with_registry(options.with_aot_file(&path), program()).unwrap();
    assert_eq!(rt.aot().image_count(), 1);

    let mut thread = rt.attach_thread();
    assert_eq!(rt.invoke(&mut thread, POW, &ints(&[2, 10])), Ok(Value::Int(1024)));

    let method = rt.method(POW).unwrap();
    assert_eq!(method.status(), CompilationStatus::Compiled);
    let code = method.compiled_code().unwrap();
    assert_eq!(code.origin, CodeOrigin::Aot);
    assert_eq!(code.intrinsic_table().unwrap().len(), IntrinsicId::COUNT);
    assert!(rt.events().snapshot().contains(&CompilationEvent::Compiled {
        method: POW,
        osr: false,
        origin: CodeOrigin::Aot,
        guards: 0,
    }));
    assert_eq!(rt.compiler_stats().functions_compiled, 0);

    // Calls out of image code resolve through the linker
    assert_eq!(rt.invoke(&mut thread, TRIPLE, &ints(&[5])), Ok(Value::Int(15)));
    assert_eq!(
        rt.method(TRIPLE).unwrap().compiled_code().unwrap().origin,
        CodeOrigin::Aot
    );
}

#[test]
fn test_image_for_other_collector_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("program.img");
    let options = eager_options(1).with_gc_kind(GcKind::Generational);
    build_image(&program(), &options)
        .unwrap()
        .write_to_file(&path)
        .unwrap();

    let options = eager_options(1)
        .with_gc_kind(GcKind::MarkSweep)
        .with_aot_file(&path);
    let rt = Runtime::with_registry(options, program()).unwrap();
    assert_eq!(rt.aot().image_count(), 0);

    let mut thread = rt.attach_thread();
    assert_eq!(rt.invoke(&mut thread, POW, &ints(&[3, 3])), Ok(Value::Int(27)));
    assert_eq!(
        rt.method(POW).unwrap().compiled_code().unwrap().origin,
        CodeOrigin::Jit
    );
}

fn installs(rt: &Runtime, method: core_types::MethodId) -> Vec<CodeOrigin> {
    rt.events()
        .snapshot()
        .into_iter()
        .filter_map(|event| match event {
            CompilationEvent::Compiled { method: m, origin, .. } if m == method => Some(origin),
            _ => None,
        })
        .collect()
}

#[test]
fn test_failed_guard_in_image_code_falls_back_to_jit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("program.img");
    let options = eager_options(1).with_max_deopts(2);
    build_image(&program(), &options)
        .unwrap()
        .write_to_file(&path)
        .unwrap();
    let rt = Runtime::with_registry(options.with_aot_file(&path), program()).unwrap();
    let mut thread = rt.attach_thread();

    assert_eq!(rt.invoke(&mut thread, ADD, &ints(&[2, 3])), Ok(Value::Int(5)));
    let method = rt.method(ADD).unwrap();
    let image_code = method.compiled_code().unwrap();
    assert_eq!(image_code.origin, CodeOrigin::Aot);
    assert!(image_code.guard_count() > 0);

    let bad = [Value::Bool(true), Value::Int(2)];
    let error = rt.invoke(&mut thread, ADD, &bad).unwrap_err();
    assert_eq!(error.class(), core_types::ClassId::CLASS_CAST_EXCEPTION);
    assert!(image_code.is_invalidated());

    // The next tier-up compiles against the history instead of reusing the image
    for _ in 0..20 {
        let error = rt.invoke(&mut thread, ADD, &bad).unwrap_err();
        assert_eq!(error.class(), core_types::ClassId::CLASS_CAST_EXCEPTION);
    }
    assert_eq!(rt.invoke(&mut thread, ADD, &ints(&[20, 22])), Ok(Value::Int(42)));
    let code = method.compiled_code().unwrap();
    assert_eq!(code.origin, CodeOrigin::Jit);
    assert_eq!(code.guard_count(), 0);
    assert_eq!(installs(&rt, ADD), vec![CodeOrigin::Aot, CodeOrigin::Jit]);
    assert_eq!(method.deopt_history().deopt_count(), 1);
    assert_eq!(rt.compiler_stats().functions_compiled, 1);
}
