//! Property tests for inline cache state transitions

use core_types::ClassId;
use profiling::{CallSiteKind, InlineCache, INLINE_CACHE_CAPACITY};
use proptest::prelude::*;
use std::collections::BTreeSet;

proptest! {
    #[test]
    fn classification_matches_distinct_classes(ids in prop::collection::vec(0u32..12, 0..24)) {
        let cache = InlineCache::new(0);
        for id in &ids {
            cache.update(ClassId(*id));
        }
        let distinct: BTreeSet<u32> = ids.iter().copied().collect();
        let expected = match distinct.len() {
            0 => CallSiteKind::Unknown,
            1 => CallSiteKind::Monomorphic,
            n if n <= INLINE_CACHE_CAPACITY => CallSiteKind::Polymorphic,
            _ => CallSiteKind::Megamorphic,
        };
        prop_assert_eq!(cache.classify(), expected);
    }

    #[test]
    fn receivers_are_first_distinct_in_order(ids in prop::collection::vec(0u32..12, 0..24)) {
        let cache = InlineCache::new(0);
        for id in &ids {
            cache.update(ClassId(*id));
        }
        let mut first_seen: Vec<u32> = Vec::new();
        for id in &ids {
            if !first_seen.contains(id) {
                first_seen.push(*id);
            }
        }
        first_seen.truncate(INLINE_CACHE_CAPACITY);
        let receivers: Vec<u32> = cache.receivers().iter().map(|c| c.as_u32()).collect();
        prop_assert_eq!(receivers, first_seen);
    }

    #[test]
    fn second_update_never_changes_contents(ids in prop::collection::vec(0u32..8, 1..8), repeat in 0usize..8) {
        let cache = InlineCache::new(0);
        for id in &ids {
            cache.update(ClassId(*id));
        }
        let before = (cache.receivers(), cache.classify());
        cache.update(ClassId(ids[repeat % ids.len()]));
        prop_assert_eq!((cache.receivers(), cache.classify()), before);
    }
}
