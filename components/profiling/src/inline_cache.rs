//! Concurrent inline caches for virtual call sites
//!
//! Provides mono/poly/megamorphic receiver tracking. A cache fills its slots
//! in order and never forgets a class; once a class arrives that does not fit,
//! the site is marked megamorphic for good.

use arrayvec::ArrayVec;
use core_types::ClassId;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Number of receiver classes a call site remembers
pub const INLINE_CACHE_CAPACITY: usize = 4;

const EMPTY: u64 = 0;

fn encode(class: ClassId) -> u64 {
    class.as_u32() as u64 + 1
}

fn decode(raw: u64) -> Option<ClassId> {
    (raw != EMPTY).then(|| ClassId((raw - 1) as u32))
}

/// Observed polymorphism of a call site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum CallSiteKind {
    /// No receiver recorded yet
    Unknown,
    /// Exactly one receiver class
    Monomorphic,
    /// Between two and four receiver classes
    Polymorphic,
    /// More receiver classes than the cache can hold
    Megamorphic,
}

/// Receiver-class cache for one call site
///
/// Slots only ever go from empty to a class, through a single
/// compare-exchange, so concurrent writers cannot lose or duplicate a class.
#[derive(Debug)]
pub struct InlineCache {
    pc: u32,
    classes: [AtomicU64; INLINE_CACHE_CAPACITY],
    megamorphic: AtomicBool,
}

impl InlineCache {
    /// Create an empty cache for the call site at `pc`
    pub fn new(pc: u32) -> Self {
        Self {
            pc,
            classes: Default::default(),
            megamorphic: AtomicBool::new(false),
        }
    }

    /// Instruction index of the call site
    pub fn pc(&self) -> u32 {
        self.pc
    }

    /// Record a receiver class
    ///
    /// Transitions cache state as needed:
    /// - Unknown → Monomorphic
    /// - Monomorphic → Polymorphic (if different class)
    /// - Polymorphic → Megamorphic (on a fifth distinct class)
    pub fn update(&self, class: ClassId) {
        if self.megamorphic.load(Ordering::Acquire) {
            return;
        }
        let wanted = encode(class);
        for slot in &self.classes {
            let mut current = slot.load(Ordering::Acquire);
            if current == EMPTY {
                match slot.compare_exchange(EMPTY, wanted, Ordering::AcqRel, Ordering::Acquire) {
                    Ok(_) => return,
                    // Lost the race; the winner's class is now in this slot
                    Err(actual) => current = actual,
                }
            }
            if current == wanted {
                return;
            }
        }
        self.megamorphic.store(true, Ordering::Release);
    }

    /// Whether the site has seen too many receiver classes
    pub fn is_megamorphic(&self) -> bool {
        self.megamorphic.load(Ordering::Acquire)
    }

    /// Recorded receiver classes in recording order
    pub fn receivers(&self) -> ArrayVec<ClassId, INLINE_CACHE_CAPACITY> {
        self.classes
            .iter()
            .map_while(|slot| decode(slot.load(Ordering::Acquire)))
            .collect()
    }

    /// Classify the site
    pub fn classify(&self) -> CallSiteKind {
        if self.is_megamorphic() {
            return CallSiteKind::Megamorphic;
        }
        match self.receivers().len() {
            0 => CallSiteKind::Unknown,
            1 => CallSiteKind::Monomorphic,
            _ => CallSiteKind::Polymorphic,
        }
    }

    /// The receiver class if the site is monomorphic
    pub fn monomorphic_class(&self) -> Option<ClassId> {
        match self.classify() {
            CallSiteKind::Monomorphic => self.receivers().first().copied(),
            _ => None,
        }
    }
}
