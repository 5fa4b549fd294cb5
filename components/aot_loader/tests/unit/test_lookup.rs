//! Class and method lookup in loaded images

use super::common::sample_writer;
use aot_loader::{AotImage, ImageWriter};
use core_types::{ClassId, GcKind, MethodId};

fn load() -> AotImage {
    AotImage::from_bytes(sample_writer().to_bytes(), GcKind::Generational, false).unwrap()
}

#[test]
fn test_classes_sorted_by_id() {
    let image = load();
    let ids: Vec<u32> = image.classes().iter().map(|c| c.class_id().as_u32()).collect();
    assert_eq!(ids, vec![17, 20]);
    assert_eq!(image.header().method_count, 4);
}

#[test]
fn test_absent_class() {
    assert!(load().get_class(ClassId(18)).is_none());
}

#[test]
fn test_bitmap_ordinals() {
    let image = load();
    let class = image.get_class(ClassId(20)).unwrap();
    assert_eq!(class.find_method_code(0).unwrap().method_id, MethodId(100));
    assert!(class.find_method_code(1).is_none());
    assert!(class.find_method_code(2).is_none());
    assert_eq!(class.find_method_code(3).unwrap().method_id, MethodId(103));
    assert_eq!(class.find_method_code(9).unwrap().method_id, MethodId(109));
    assert!(class.find_method_code(10).is_none());
    assert!(class.find_method_code(1000).is_none());
}

#[test]
fn test_code_bytes() {
    let image = load();
    let class = image.get_class(ClassId(20)).unwrap();
    let span = class.find_method_code(3).unwrap();
    assert_eq!(image.code(&span), &[5, 6]);
    let other = image.get_class(ClassId(17)).unwrap();
    let span = other.find_method_code(1).unwrap();
    assert_eq!(image.code(&span), &[8, 8, 8]);
}

#[test]
fn test_wide_bitmap() {
    let mut writer = ImageWriter::new(GcKind::Generational);
    for index in (0..40).step_by(3) {
        writer.add_method(ClassId(30), index, MethodId(1000 + index), vec![index as u8]);
    }
    let image = AotImage::from_bytes(writer.to_bytes(), GcKind::Generational, false).unwrap();
    let class = image.get_class(ClassId(30)).unwrap();
    for index in 0..40 {
        let span = class.find_method_code(index);
        if index % 3 == 0 {
            let span = span.unwrap();
            assert_eq!(span.method_id, MethodId(1000 + index));
            assert_eq!(image.code(&span), &[index as u8]);
        } else {
            assert!(span.is_none());
        }
    }
}

#[test]
fn test_summary_lists_methods() {
    let summary = load().summary().unwrap();
    assert_eq!(summary.classes.len(), 2);
    let indices: Vec<u32> = summary.classes[1].methods.iter().map(|m| m.index).collect();
    assert_eq!(indices, vec![0, 3, 9]);
    assert_eq!(summary.gc_kind, Some("generational"));
    assert!(summary.checksum_matches);
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["slots"].as_array().unwrap().len(), 6);
}
