//! Collector identity and the barrier query interface.
//!
//! The collector itself lives outside the engine. Compiled code only needs to
//! know which collector an image was built for and what shape of write
//! barrier to emit, so that is all this module describes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Collector implementation a runtime (or an AOT image) is configured for.
///
/// The numeric tag is recorded in AOT image headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GcKind {
    /// Stop-the-world mark and sweep
    MarkSweep,
    /// Generational copying young space with mark-compact old space
    #[default]
    Generational,
    /// Concurrent marking with incremental update barriers
    Concurrent,
    /// No collection at all
    Epsilon,
}

impl GcKind {
    /// Tag written into image headers
    pub const fn tag(self) -> u32 {
        match self {
            GcKind::MarkSweep => 1,
            GcKind::Generational => 2,
            GcKind::Concurrent => 3,
            GcKind::Epsilon => 4,
        }
    }

    /// Inverse of [`GcKind::tag`]
    pub const fn from_tag(tag: u32) -> Option<GcKind> {
        match tag {
            1 => Some(GcKind::MarkSweep),
            2 => Some(GcKind::Generational),
            3 => Some(GcKind::Concurrent),
            4 => Some(GcKind::Epsilon),
            _ => None,
        }
    }

    /// Stable name used in diagnostics and configuration
    pub const fn name(self) -> &'static str {
        match self {
            GcKind::MarkSweep => "mark-sweep",
            GcKind::Generational => "generational",
            GcKind::Concurrent => "concurrent",
            GcKind::Epsilon => "epsilon",
        }
    }
}

impl fmt::Display for GcKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shape of the write barrier compiled code must emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarrierKind {
    /// No barrier
    None,
    /// Card marking after the store
    CardMarking,
    /// Snapshot-at-the-beginning before the store
    Satb,
    /// Both pre and post barriers
    PrePost,
}

/// Where a barrier sits relative to the guarded store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarrierPosition {
    /// Before the store
    Pre,
    /// After the store
    Post,
}

/// An operand a barrier needs, as reported by the collector
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BarrierOperand {
    /// Operand name as the collector calls it
    pub name: String,
    /// Address of the operand in the collector's data
    pub address: u64,
}

/// Barrier query interface the compiler consults.
pub trait GcBarrierSet: Send + Sync {
    /// Barrier shape for the current collector
    fn barrier_kind(&self) -> BarrierKind;

    /// Look up a named barrier operand; `None` if the collector has none
    fn barrier_operand(&self, position: BarrierPosition, name: &str) -> Option<BarrierOperand>;
}

/// Barrier set reporting the conventional shape for each collector kind.
#[derive(Debug, Clone, Copy)]
pub struct DefaultBarrierSet {
    kind: GcKind,
}

impl DefaultBarrierSet {
    /// Barrier set for the given collector
    pub fn new(kind: GcKind) -> Self {
        Self { kind }
    }
}

impl GcBarrierSet for DefaultBarrierSet {
    fn barrier_kind(&self) -> BarrierKind {
        match self.kind {
            GcKind::MarkSweep | GcKind::Epsilon => BarrierKind::None,
            GcKind::Generational => BarrierKind::CardMarking,
            GcKind::Concurrent => BarrierKind::PrePost,
        }
    }

    fn barrier_operand(&self, position: BarrierPosition, name: &str) -> Option<BarrierOperand> {
        let address = match (self.barrier_kind(), position, name) {
            (BarrierKind::CardMarking, BarrierPosition::Post, "card_table") => 0x1000,
            (BarrierKind::PrePost, BarrierPosition::Pre, "satb_queue") => 0x2000,
            (BarrierKind::PrePost, BarrierPosition::Post, "card_table") => 0x1000,
            _ => return None,
        };
        Some(BarrierOperand {
            name: name.to_string(),
            address,
        })
    }
}
