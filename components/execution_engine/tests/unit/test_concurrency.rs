use super::common::*;
use core_types::Value;
use execution_engine::{CompilationEvent, CompilationStatus, RuntimeOptions};
use std::sync::Barrier;
use std::time::{Duration, Instant};

fn background_options() -> RuntimeOptions {
    RuntimeOptions::default()
        .with_compile_in_place(false)
        .with_async_compilation(true)
        .with_compiler_threads(1)
        .with_hotness_threshold(1)
        .with_profiling(false, 1)
        .with_compiler_events(true)
}

fn wait_for(status: CompilationStatus, method: &execution_engine::Method) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if method.status() == status {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    false
}

#[test]
fn test_racing_threads_queue_one_task() {
    let rt = runtime(background_options());
    assert_eq!(rt.compiler_threads(), 1);
    let barrier = Barrier::new(2);
    let (rt, barrier) = (&rt, &barrier);

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                scope.spawn(move || {
                    let mut thread = rt.attach_thread();
                    barrier.wait();
                    rt.invoke(&mut thread, SQUARE_OF, &ints(&[7]))
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });
    assert!(results.iter().all(|result| *result == Ok(Value::Int(49))));

    let method = rt.method(SQUARE_OF).unwrap();
    assert!(wait_for(CompilationStatus::Compiled, &method));
    assert_eq!(
        rt.events().transitions(SQUARE_OF),
        vec![
            (CompilationStatus::NotCompiled, CompilationStatus::Waiting),
            (CompilationStatus::Waiting, CompilationStatus::Compilation),
            (CompilationStatus::Compilation, CompilationStatus::Compiled),
        ]
    );
    assert_eq!(
        rt.events()
            .count(|event| matches!(event, CompilationEvent::TaskQueued { .. })),
        1
    );
    assert_eq!(rt.scheduler_stats().enqueued, 1);
}

#[test]
fn test_synchronous_request_waits_for_worker() {
    let options = background_options().with_async_compilation(false);
    let rt = runtime(options);
    let mut thread = rt.attach_thread();
    assert_eq!(rt.invoke(&mut thread, DOUBLE, &ints(&[21])), Ok(Value::Int(42)));

    let method = rt.method(DOUBLE).unwrap();
    assert_eq!(method.status(), CompilationStatus::Compiled);
    assert!(method.compiled_code().is_some());
}

#[test]
fn test_threads_share_compiled_code() {
    let rt = runtime(eager_options(1));
    std::thread::scope(|scope| {
        for n in 0..4 {
            let rt = &rt;
            scope.spawn(move || {
                let mut thread = rt.attach_thread();
                for _ in 0..10 {
                    assert_eq!(
                        rt.invoke(&mut thread, TRIPLE, &ints(&[n])),
                        Ok(Value::Int(3 * n))
                    );
                }
            });
        }
    });
    assert_eq!(
        rt.events()
            .count(|event| matches!(event, CompilationEvent::Compiled { method, .. } if *method == TRIPLE)),
        1
    );
}

#[test]
fn test_destroy_joins_compiler_threads() {
    let rt = runtime(background_options().with_compiler_threads(2));
    assert_eq!(rt.compiler_threads(), 2);
    let mut thread = rt.attach_thread();
    rt.invoke(&mut thread, SQUARE_OF, &ints(&[2])).unwrap();
    rt.destroy();
}
