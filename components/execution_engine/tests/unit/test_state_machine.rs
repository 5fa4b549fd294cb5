use super::common::*;
use core_types::{MethodId, Value};
use execution_engine::{CompilationEvent, CompilationStatus, Runtime};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Invoke(MethodId, Vec<Value>),
    Deoptimize(MethodId),
}

fn arg() -> impl Strategy<Value = i64> {
    prop_oneof![
        8 => -50i64..50,
        1 => Just(i64::MAX),
        1 => Just(0),
    ]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (arg(), arg()).prop_map(|(a, b)| Op::Invoke(ADD, ints(&[a, b]))),
        2 => arg().prop_map(|n| Op::Invoke(ABS, ints(&[n]))),
        2 => arg().prop_map(|n| Op::Invoke(TRIPLE, ints(&[n]))),
        2 => arg().prop_map(|n| Op::Invoke(SAFE_DIVIDE, ints(&[n]))),
        2 => (0i64..40, 1i64..5).prop_map(|(limit, step)| Op::Invoke(COUNT_UP, ints(&[0, limit, step]))),
        2 => prop::bool::ANY.prop_map(|square| {
            let shape = if square { object(SQUARE, 1) } else { object(CIRCLE, 2) };
            Op::Invoke(AREA_OF, vec![shape])
        }),
        1 => prop::sample::select(vec![ADD, ABS, TRIPLE, DOUBLE, SAFE_DIVIDE, COUNT_UP, AREA_OF])
            .prop_map(Op::Deoptimize),
    ]
}

fn reference_runtime() -> Runtime {
    runtime(eager_options(1).with_jit(false))
}

fn tiered_runtime() -> Runtime {
    let mut options = eager_options(2).with_profiling(true, 2);
    options.uncommon_trap_min_samples = 2;
    runtime(options)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 48,
        .. ProptestConfig::default()
    })]
    #[test]
    fn tiers_agree_and_transitions_chain(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let reference = reference_runtime();
        let tiered = tiered_runtime();
        let mut reference_thread = reference.attach_thread();
        let mut tiered_thread = tiered.attach_thread();

        for op in &ops {
            match op {
                Op::Invoke(method, args) => {
                    let expected = reference.invoke(&mut reference_thread, *method, args);
                    let actual = tiered.invoke(&mut tiered_thread, *method, args);
                    prop_assert_eq!(
                        actual.as_ref().map_err(|exception| exception.class()),
                        expected.as_ref().map_err(|exception| exception.class())
                    );
                    prop_assert_eq!(tiered_thread.depth(), 0);
                }
                Op::Deoptimize(method) => {
                    tiered.deoptimize_method(*method).unwrap();
                }
            }
        }

        for method in [ADD, ABS, TRIPLE, DOUBLE, SAFE_DIVIDE, COUNT_UP, AREA_OF] {
            let transitions = tiered.events().transitions(method);
            let mut current = CompilationStatus::NotCompiled;
            for (from, to) in transitions {
                prop_assert_eq!(from, current);
                prop_assert!(from.can_transition(to), "{} -> {}", from, to);
                current = to;
            }
            prop_assert_eq!(tiered.method(method).unwrap().status(), current);
            let installed = tiered.method(method).unwrap().compiled_code().is_some();
            prop_assert_eq!(installed, current == CompilationStatus::Compiled);
        }

        let deopts = tiered
            .events()
            .count(|event| matches!(event, CompilationEvent::Deoptimized { .. }));
        prop_assert!(deopts >= ops.iter().filter(|op| matches!(op, Op::Deoptimize(_))).count());
    }
}
