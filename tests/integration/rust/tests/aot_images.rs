//! AOT Image Integration Tests
//!
//! Images built by the execution engine, read back by the loader, and
//! rejected or accepted by a runtime depending on how they were built.

use aot_loader::{AotImage, LoadError, SlotKind};
use core_types::{ClassId, GcKind, IntrinsicId, Value};
use execution_engine::{build_image, intrinsic_address, EngineBindings, Runtime, RuntimeOptions};
use tvm_cli::demo::{demo_program, CLAMP, SQUARE_OF};

fn options(gc_kind: GcKind) -> RuntimeOptions {
    RuntimeOptions::default()
        .with_gc_kind(gc_kind)
        .with_compile_in_place(true)
        .with_hotness_threshold(1)
        .with_profiling(false, 1)
}

/// Test: the loader sees what the engine wrote, and patching fills the tables
#[test]
fn test_image_tables_are_patched() {
    let options = options(GcKind::Generational);
    let writer = build_image(&demo_program().unwrap(), &options).unwrap();
    let mut image = AotImage::from_bytes(writer.to_bytes(), options.gc_kind, false).unwrap();
    assert!(!image.is_patched());

    let slots = image.slots().unwrap();
    assert!(slots
        .iter()
        .any(|slot| slot.kind == SlotKind::VtableIndex));
    assert!(image.get_class(ClassId(16)).is_some());

    image.initialize_slot_table(&EngineBindings).unwrap();
    image.patch_intrinsic_table(&EngineBindings);
    assert!(image.is_patched());
    for id in IntrinsicId::ALL {
        assert_eq!(image.intrinsic_address(id), intrinsic_address(id));
    }
}

/// Test: a foreign build is refused for execution but still dumpable
#[test]
fn test_foreign_image_only_dumps() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("foreign.img");
    build_image(&demo_program().unwrap(), &options(GcKind::Generational))
        .unwrap()
        .with_checksum(0xDEAD_BEEF)
        .write_to_file(&path)
        .unwrap();

    assert!(matches!(
        AotImage::open(&path, GcKind::Generational, false),
        Err(LoadError::ChecksumMismatch { image: 0xDEAD_BEEF, .. })
    ));
    let summary = AotImage::open(&path, GcKind::Generational, true)
        .unwrap()
        .summary()
        .unwrap();
    assert!(!summary.checksum_matches);

    // The runtime skips it and compiles instead
    let rt = Runtime::with_registry(
        options(GcKind::Generational).with_aot_file(&path),
        demo_program().unwrap(),
    )
    .unwrap();
    assert_eq!(rt.aot().image_count(), 0);
}

/// Test: images load per collector
#[test]
fn test_one_image_per_collector() {
    let dir = tempfile::tempdir().unwrap();
    let paths: Vec<_> = [GcKind::MarkSweep, GcKind::Concurrent]
        .into_iter()
        .map(|kind| {
            let path = dir.path().join(format!("{}.img", kind.name()));
            build_image(&demo_program().unwrap(), &options(kind))
                .unwrap()
                .write_to_file(&path)
                .unwrap();
            path
        })
        .collect();

    let mut options = options(GcKind::Concurrent);
    for path in &paths {
        options = options.with_aot_file(path);
    }
    let rt = Runtime::with_registry(options, demo_program().unwrap()).unwrap();
    assert_eq!(rt.aot().image_count(), 1);

    let mut thread = rt.attach_thread();
    let clamped = rt
        .invoke(&mut thread, CLAMP, &[Value::Int(5), Value::Int(10), Value::Int(20)])
        .unwrap();
    assert_eq!(clamped, Value::Int(10));
    assert_eq!(
        rt.invoke(&mut thread, SQUARE_OF, &[Value::Int(9)]).unwrap(),
        Value::Int(81)
    );
}
