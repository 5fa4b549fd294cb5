//! Slot table initialization and intrinsic table patching

use super::common::{sample_writer, TestBindings, PLT_STUB, VIRTUAL_STUB};
use aot_loader::{AotImage, SlotKind, UNINITIALIZED_SLOT_WORD};
use core_types::{GcKind, IntrinsicId};

fn load() -> AotImage {
    AotImage::from_bytes(sample_writer().to_bytes(), GcKind::Generational, false).unwrap()
}

#[test]
fn test_slots_before_initialization() {
    let image = load();
    let slots = image.slots().unwrap();
    let kinds: Vec<SlotKind> = slots.iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![
            SlotKind::Plt,
            SlotKind::VtableIndex,
            SlotKind::Class,
            SlotKind::String,
            SlotKind::InlineCache,
            SlotKind::Common,
        ]
    );
    assert!(slots
        .iter()
        .all(|s| s.payload.iter().all(|w| *w & UNINITIALIZED_SLOT_WORD != 0)));
    assert!(!image.is_patched());
}

#[test]
fn test_first_tag_sits_below_intrinsic_table() {
    let image = load();
    let words = image.data_words().len();
    let slots = image.slots().unwrap();
    assert_eq!(slots[0].tag_index, words - (IntrinsicId::COUNT + 1));
}

#[test]
fn test_initialize_slot_table_values_per_kind() {
    let mut image = load();
    let count = image.initialize_slot_table(&TestBindings).unwrap();
    assert_eq!(count, 6);

    for slot in image.slots().unwrap() {
        let expected: Vec<u64> = match slot.kind {
            SlotKind::Plt => vec![PLT_STUB, 0],
            SlotKind::VtableIndex => vec![VIRTUAL_STUB, 0],
            SlotKind::Class => vec![0, 0],
            SlotKind::String | SlotKind::Common => vec![0],
            SlotKind::InlineCache => vec![UNINITIALIZED_SLOT_WORD],
        };
        assert_eq!(slot.payload.to_vec(), expected, "slot {:?}", slot.kind);
    }
}

#[test]
fn test_patch_intrinsic_table() {
    let mut image = load();
    assert!(image.intrinsic_table().iter().all(|w| *w == 0));
    image.patch_intrinsic_table(&TestBindings);
    for id in IntrinsicId::ALL {
        assert_eq!(image.intrinsic_address(id), 0x7100_0000 + id.index() as u64 * 0x10);
    }
    image.initialize_slot_table(&TestBindings).unwrap();
    assert!(image.is_patched());
}

#[test]
fn test_patching_leaves_slot_tags_intact() {
    let mut image = load();
    let before: Vec<(SlotKind, u64)> = image.slots().unwrap().iter().map(|s| (s.kind, s.id)).collect();
    image.patch_intrinsic_table(&TestBindings);
    image.initialize_slot_table(&TestBindings).unwrap();
    let after: Vec<(SlotKind, u64)> = image.slots().unwrap().iter().map(|s| (s.kind, s.id)).collect();
    assert_eq!(before, after);
}
