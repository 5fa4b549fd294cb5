//! The reverse-growing slot table and the intrinsic table.
//!
//! Both live in the data section between `aot_end` and `code`, viewed as
//! little-endian u64 words. The intrinsic table occupies the last
//! `IntrinsicId::COUNT` words. The slot table grows downward from the word
//! just below it: each entry is a tag word `(id << 8) | kind` followed, at
//! lower addresses, by the kind's payload words. A zero tag terminates it.

use crate::error::LoadError;
use arrayvec::ArrayVec;
use core_types::IntrinsicId;

/// Kinds of runtime-patched slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[repr(u8)]
pub enum SlotKind {
    /// Static call through a lazily resolved stub
    Plt = 1,
    /// Virtual call through a lazily resolved stub
    VtableIndex = 2,
    /// Resolved class reference
    Class = 3,
    /// Interned string reference
    String = 4,
    /// Inline cache storage owned by compiled code
    InlineCache = 5,
    /// Other lazily initialized constant
    Common = 6,
}

impl SlotKind {
    /// Decode the kind byte of a tag word
    pub fn from_tag(tag: u64) -> Option<SlotKind> {
        match tag & 0xff {
            1 => Some(SlotKind::Plt),
            2 => Some(SlotKind::VtableIndex),
            3 => Some(SlotKind::Class),
            4 => Some(SlotKind::String),
            5 => Some(SlotKind::InlineCache),
            6 => Some(SlotKind::Common),
            _ => None,
        }
    }

    /// Number of payload words following the tag
    pub const fn payload_words(self) -> usize {
        match self {
            SlotKind::Plt | SlotKind::VtableIndex | SlotKind::Class => 2,
            SlotKind::String | SlotKind::InlineCache | SlotKind::Common => 1,
        }
    }

    /// Whether initialization wires the slot to a resolver stub
    pub const fn is_resolver_wired(self) -> bool {
        matches!(self, SlotKind::Plt | SlotKind::VtableIndex)
    }

    /// Build a tag word
    pub const fn tag(self, id: u64) -> u64 {
        (id << 8) | self as u64
    }
}

/// Addresses the runtime supplies when an image is patched
pub trait RuntimeBindings {
    /// Stub resolving a static call on first use
    fn plt_resolver_stub(&self) -> u64;

    /// Stub resolving a virtual call on first use
    fn virtual_resolver_stub(&self) -> u64;

    /// Entry point of an intrinsic
    fn intrinsic_address(&self, id: IntrinsicId) -> u64;
}

/// A decoded slot table entry
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SlotEntry {
    /// Slot kind
    pub kind: SlotKind,
    /// Identifier carried in the tag
    pub id: u64,
    /// Word index of the tag in the data section
    pub tag_index: usize,
    /// Payload words, nearest the tag first
    pub payload: ArrayVec<u64, 2>,
}

/// First tag word index, or `None` if the section cannot hold the tables
pub(crate) fn first_tag_index(words: usize) -> Option<usize> {
    words.checked_sub(IntrinsicId::COUNT + 1)
}

/// Walk the slot table, calling `visit` with each entry's kind, id and tag
/// index
pub(crate) fn walk(
    words: &[u64],
    mut visit: impl FnMut(SlotKind, u64, usize),
) -> Result<usize, LoadError> {
    let mut index = first_tag_index(words.len())
        .ok_or_else(|| LoadError::malformed("data section too small for intrinsic table"))?;
    let mut count = 0;
    loop {
        let tag = words[index];
        if tag == 0 {
            return Ok(count);
        }
        let kind = SlotKind::from_tag(tag).ok_or_else(|| {
            LoadError::malformed(format!("unknown slot tag {:#x} at word {}", tag, index))
        })?;
        let payload = kind.payload_words();
        // Payload plus at least one more word for the next tag or terminator
        if index < payload + 1 {
            return Err(LoadError::malformed(format!(
                "slot at word {} runs off the data section",
                index
            )));
        }
        visit(kind, tag >> 8, index);
        count += 1;
        index -= payload + 1;
    }
}

/// Decode every entry without modifying anything
pub(crate) fn decode(words: &[u64]) -> Result<Vec<SlotEntry>, LoadError> {
    let mut entries = Vec::new();
    walk(words, |kind, id, tag_index| {
        let payload = (1..=kind.payload_words())
            .map(|offset| words[tag_index - offset])
            .collect();
        entries.push(SlotEntry {
            kind,
            id,
            tag_index,
            payload,
        });
    })?;
    Ok(entries)
}

/// Rewrite every slot's payload to its initial value
pub(crate) fn initialize(words: &mut [u64], bindings: &dyn RuntimeBindings) -> Result<usize, LoadError> {
    let mut positions = Vec::new();
    let count = walk(words, |kind, _, tag_index| positions.push((kind, tag_index)))?;
    for (kind, tag_index) in positions {
        let first = match kind {
            SlotKind::Plt => bindings.plt_resolver_stub(),
            SlotKind::VtableIndex => bindings.virtual_resolver_stub(),
            SlotKind::Class | SlotKind::String | SlotKind::Common => 0,
            SlotKind::InlineCache => continue,
        };
        words[tag_index - 1] = first;
        if kind.payload_words() == 2 {
            words[tag_index - 2] = 0;
        }
    }
    Ok(count)
}
