//! Shared image fixtures

use aot_loader::{ImageWriter, RuntimeBindings, SlotKind};
use core_types::{ClassId, GcKind, IntrinsicId, MethodId};

pub const PLT_STUB: u64 = 0x7000_0010;
pub const VIRTUAL_STUB: u64 = 0x7000_0020;

pub struct TestBindings;

impl RuntimeBindings for TestBindings {
    fn plt_resolver_stub(&self) -> u64 {
        PLT_STUB
    }

    fn virtual_resolver_stub(&self) -> u64 {
        VIRTUAL_STUB
    }

    fn intrinsic_address(&self, id: IntrinsicId) -> u64 {
        0x7100_0000 + id.index() as u64 * 0x10
    }
}

/// Two classes, a few methods, one slot of every kind
pub fn sample_writer() -> ImageWriter {
    let mut writer = ImageWriter::new(GcKind::Generational);
    writer
        .add_method(ClassId(20), 0, MethodId(100), vec![1, 2, 3, 4])
        .add_method(ClassId(20), 3, MethodId(103), vec![5, 6])
        .add_method(ClassId(20), 9, MethodId(109), vec![7])
        .add_method(ClassId(17), 1, MethodId(50), vec![8, 8, 8]);
    writer
        .add_slot(SlotKind::Plt, 100)
        .add_slot(SlotKind::VtableIndex, 2)
        .add_slot(SlotKind::Class, 20)
        .add_slot(SlotKind::String, 4)
        .add_slot(SlotKind::InlineCache, 7)
        .add_slot(SlotKind::Common, 1);
    writer
}
