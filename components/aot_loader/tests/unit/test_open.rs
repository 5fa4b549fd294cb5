//! Validation order and failure modes of image loading

use super::common::sample_writer;
use aot_loader::{AotImage, ImageWriter, LoadError};
use core_types::GcKind;
use std::io::Write;

fn open(writer: &ImageWriter, gc: GcKind, for_dump: bool) -> Result<AotImage, LoadError> {
    AotImage::from_bytes(writer.to_bytes(), gc, for_dump)
}

#[test]
fn test_valid_image_opens_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&sample_writer().to_bytes()).unwrap();
    let image = AotImage::open(file.path(), GcKind::Generational, false).unwrap();
    assert_eq!(image.path(), file.path());
    assert_eq!(image.classes().len(), 2);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = AotImage::open(dir.path().join("absent.img"), GcKind::Generational, false);
    assert!(matches!(result, Err(LoadError::Io(_))));
}

#[test]
fn test_gc_kind_mismatch_names_both_kinds() {
    let writer = ImageWriter::new(GcKind::Concurrent);
    match open(&writer, GcKind::MarkSweep, false) {
        Err(LoadError::GcKindMismatch { image, runtime }) => {
            assert_eq!(image, "concurrent");
            assert_eq!(runtime, "mark-sweep");
        }
        other => panic!("expected GcKindMismatch, got {:?}", other),
    }
}

#[test]
fn test_unknown_gc_tag_in_mismatch() {
    let writer = ImageWriter::new(GcKind::Concurrent).with_gc_tag(42);
    let err = open(&writer, GcKind::Generational, false).unwrap_err();
    assert_eq!(
        err.to_string(),
        "image built for unknown(42) collector, runtime configured for generational"
    );
}

#[test]
fn test_dump_mode_skips_environment_checks() {
    let writer = ImageWriter::new(GcKind::Concurrent).with_checksum(1);
    assert!(open(&writer, GcKind::MarkSweep, true).is_ok());
    assert!(matches!(
        open(&writer, GcKind::Concurrent, false),
        Err(LoadError::ChecksumMismatch { image: 1, .. })
    ));
}

#[test]
fn test_bad_magic_and_version() {
    let writer = ImageWriter::new(GcKind::Generational).with_magic(0xDEAD_BEEF);
    assert!(matches!(
        open(&writer, GcKind::Generational, true),
        Err(LoadError::BadMagic { found: 0xDEAD_BEEF })
    ));
    let writer = ImageWriter::new(GcKind::Generational).with_version(9);
    assert!(matches!(
        open(&writer, GcKind::Generational, true),
        Err(LoadError::UnsupportedVersion { found: 9, expected: 1 })
    ));
}

#[test]
fn test_code_end_before_code_is_invalid_symbols() {
    // Every header check would also fail; symbols must be reported first
    let writer = ImageWriter::new(GcKind::Concurrent)
        .with_magic(0)
        .with_version(0)
        .with_checksum(0)
        .with_symbol("code_end", Some(0));
    assert!(matches!(
        open(&writer, GcKind::Generational, false),
        Err(LoadError::InvalidSymbols(_))
    ));
}

#[test]
fn test_empty_metadata_is_invalid_symbols() {
    let bytes = ImageWriter::new(GcKind::Generational).to_bytes();
    let aot = aot_loader::SymbolTable::parse(&bytes).unwrap().get("aot").unwrap();
    let writer = ImageWriter::new(GcKind::Generational)
        .with_checksum(0)
        .with_symbol("aot_end", Some(aot));
    assert!(matches!(
        open(&writer, GcKind::Generational, false),
        Err(LoadError::InvalidSymbols(_))
    ));
}

#[test]
fn test_missing_symbol() {
    let writer = sample_writer().with_symbol("code", None);
    assert!(matches!(
        open(&writer, GcKind::Generational, false),
        Err(LoadError::MissingSymbol("code"))
    ));
}

#[test]
fn test_truncated_file_is_malformed() {
    let bytes = sample_writer().to_bytes();
    let result = AotImage::from_bytes(bytes[..10].to_vec(), GcKind::Generational, false);
    assert!(matches!(result, Err(LoadError::Malformed(_))));
}

#[test]
fn test_truncated_payload_is_invalid_symbols() {
    let mut bytes = sample_writer().to_bytes();
    bytes.truncate(bytes.len() - 1);
    let result = AotImage::from_bytes(bytes, GcKind::Generational, false);
    assert!(matches!(result, Err(LoadError::InvalidSymbols(_))));
}

#[test]
fn test_class_without_methods_is_malformed() {
    let writer = sample_writer().with_empty_class(core_types::ClassId(99));
    for for_dump in [false, true] {
        match open(&writer, GcKind::Generational, for_dump) {
            Err(LoadError::Malformed(message)) => {
                assert!(message.contains("no compiled methods"), "{}", message)
            }
            other => panic!("expected Malformed, got {:?}", other.map(|_| ())),
        }
    }
}
