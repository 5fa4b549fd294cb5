//! Unit tests for collector identity and barrier queries

use core_types::{BarrierKind, BarrierPosition, DefaultBarrierSet, GcBarrierSet, GcKind};

#[test]
fn test_gc_kind_names() {
    assert_eq!(GcKind::MarkSweep.to_string(), "mark-sweep");
    assert_eq!(GcKind::default(), GcKind::Generational);
}

#[test]
fn test_concurrent_collector_needs_both_barriers() {
    let barriers = DefaultBarrierSet::new(GcKind::Concurrent);
    assert_eq!(barriers.barrier_kind(), BarrierKind::PrePost);
    let pre = barriers
        .barrier_operand(BarrierPosition::Pre, "satb_queue")
        .expect("pre operand");
    assert_eq!(pre.name, "satb_queue");
}

#[test]
fn test_epsilon_has_no_operands() {
    let barriers = DefaultBarrierSet::new(GcKind::Epsilon);
    assert_eq!(barriers.barrier_kind(), BarrierKind::None);
    assert!(barriers
        .barrier_operand(BarrierPosition::Post, "card_table")
        .is_none());
}

#[test]
fn test_gc_kind_serde_uses_kebab_case() {
    let json = serde_json::to_string(&GcKind::MarkSweep).unwrap();
    assert_eq!(json, "\"mark-sweep\"");
}
