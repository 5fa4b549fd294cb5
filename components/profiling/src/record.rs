//! The per-method profiling record.

use crate::counters::{BranchCounter, ThrowCounter};
use crate::inline_cache::{CallSiteKind, InlineCache};
use bytecode_system::ProfileSites;
use core_types::ClassId;
use serde::Serialize;

/// Feedback for every profiled site of one method.
///
/// The site tables are fixed at construction. Looking up a pc that was not
/// part of the scan is a caller bug and panics.
#[derive(Debug)]
pub struct ProfilingRecord {
    inline_caches: Box<[InlineCache]>,
    branches: Box<[BranchCounter]>,
    throws: Box<[ThrowCounter]>,
}

impl ProfilingRecord {
    /// Build an empty record from a site scan
    pub fn new(sites: &ProfileSites) -> Self {
        debug_assert!(sites.calls.windows(2).all(|w| w[0] < w[1]));
        debug_assert!(sites.branches.windows(2).all(|w| w[0] < w[1]));
        debug_assert!(sites.throws.windows(2).all(|w| w[0] < w[1]));
        Self {
            inline_caches: sites.calls.iter().map(|&pc| InlineCache::new(pc)).collect(),
            branches: sites.branches.iter().map(|&pc| BranchCounter::new(pc)).collect(),
            throws: sites.throws.iter().map(|&pc| ThrowCounter::new(pc)).collect(),
        }
    }

    /// Inline cache for the call site at `pc`
    ///
    /// # Panics
    ///
    /// Panics if `pc` is not a registered call site.
    pub fn inline_cache(&self, pc: u32) -> &InlineCache {
        match self.inline_caches.binary_search_by_key(&pc, InlineCache::pc) {
            Ok(index) => &self.inline_caches[index],
            Err(_) => panic!("no inline cache registered at @{}", pc),
        }
    }

    /// Branch counter for the branch at `pc`
    ///
    /// # Panics
    ///
    /// Panics if `pc` is not a registered branch.
    pub fn branch(&self, pc: u32) -> &BranchCounter {
        match self.branches.binary_search_by_key(&pc, BranchCounter::pc) {
            Ok(index) => &self.branches[index],
            Err(_) => panic!("no branch counter registered at @{}", pc),
        }
    }

    /// Throw counter for the throw at `pc`
    ///
    /// # Panics
    ///
    /// Panics if `pc` is not a registered throw.
    pub fn throw_site(&self, pc: u32) -> &ThrowCounter {
        match self.throws.binary_search_by_key(&pc, ThrowCounter::pc) {
            Ok(index) => &self.throws[index],
            Err(_) => panic!("no throw counter registered at @{}", pc),
        }
    }

    /// Record a receiver class at a call site
    pub fn update_inline_cache(&self, pc: u32, class: ClassId) {
        self.inline_cache(pc).update(class);
    }

    /// Classify a call site
    pub fn classify(&self, pc: u32) -> CallSiteKind {
        self.inline_cache(pc).classify()
    }

    /// Record a branch outcome
    pub fn update_branch(&self, pc: u32, taken: bool) {
        self.branch(pc).record(taken);
    }

    /// Record a throw
    pub fn update_throw(&self, pc: u32) {
        self.throw_site(pc).record();
    }

    /// Number of call sites
    pub fn call_site_count(&self) -> usize {
        self.inline_caches.len()
    }

    /// Copy the current feedback into plain values
    pub fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            call_sites: self
                .inline_caches
                .iter()
                .map(|cache| CallSiteSnapshot {
                    pc: cache.pc(),
                    kind: cache.classify(),
                    receivers: cache.receivers().iter().map(|c| c.as_u32()).collect(),
                })
                .collect(),
            branches: self
                .branches
                .iter()
                .map(|branch| BranchSnapshot {
                    pc: branch.pc(),
                    taken: branch.taken(),
                    not_taken: branch.not_taken(),
                })
                .collect(),
            throws: self.throws.iter().map(|t| (t.pc(), t.count())).collect(),
        }
    }
}

/// Plain copy of one call site's feedback
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallSiteSnapshot {
    /// Call site
    pub pc: u32,
    /// Classification at snapshot time
    pub kind: CallSiteKind,
    /// Recorded receiver class ids
    pub receivers: Vec<u32>,
}

/// Plain copy of one branch's counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchSnapshot {
    /// Branch
    pub pc: u32,
    /// Times taken
    pub taken: u64,
    /// Times not taken
    pub not_taken: u64,
}

/// Plain copy of a whole record, for tooling
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileSnapshot {
    /// Call sites in pc order
    pub call_sites: Vec<CallSiteSnapshot>,
    /// Branches in pc order
    pub branches: Vec<BranchSnapshot>,
    /// `(pc, count)` per throw site
    pub throws: Vec<(u32, u64)>,
}
