//! Concurrent writers on a shared inline cache

use core_types::ClassId;
use profiling::{CallSiteKind, InlineCache};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

#[test]
fn test_concurrent_writers_never_duplicate() {
    for _ in 0..50 {
        let cache = Arc::new(InlineCache::new(0));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..3 {
                        cache.update(ClassId(100 + (t + i) % 3));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let receivers = cache.receivers();
        let distinct: BTreeSet<_> = receivers.iter().collect();
        assert_eq!(receivers.len(), 3);
        assert_eq!(distinct.len(), 3);
        assert_eq!(cache.classify(), CallSiteKind::Polymorphic);
    }
}

#[test]
fn test_concurrent_overflow_goes_megamorphic() {
    let cache = Arc::new(InlineCache::new(0));
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.update(ClassId(200 + t)))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(cache.classify(), CallSiteKind::Megamorphic);
}
