//! Tests for ProfilingRecord built from real chunks

use bytecode_system::{ArgRange, BytecodeChunk, Opcode, ProfileSites, RegisterId};
use core_types::{ClassId, MethodId};
use profiling::{CallSiteKind, ProfilingRecord};

fn dispatching_chunk() -> BytecodeChunk {
    let mut chunk = BytecodeChunk::new(2, 2);
    chunk.emit(Opcode::Lda(RegisterId(1)));
    chunk.emit(Opcode::Jeqz(4));
    chunk.emit(Opcode::CallVirtual {
        method: MethodId(5),
        args: ArgRange::new(0, 1),
    });
    chunk.emit(Opcode::Return);
    chunk.emit(Opcode::Throw);
    chunk
}

#[test]
fn test_record_from_scan() {
    let record = ProfilingRecord::new(&ProfileSites::scan(&dispatching_chunk()));
    assert_eq!(record.call_site_count(), 1);
    assert_eq!(record.inline_cache(2).pc(), 2);
    assert_eq!(record.branch(1).total(), 0);
    assert_eq!(record.throw_site(4).count(), 0);
}

#[test]
fn test_branch_updates() {
    let record = ProfilingRecord::new(&ProfileSites::scan(&dispatching_chunk()));
    for _ in 0..10 {
        record.update_branch(1, false);
    }
    record.update_branch(1, true);
    assert_eq!(record.branch(1).taken(), 1);
    assert_eq!(record.branch(1).not_taken(), 10);
}

#[test]
fn test_snapshot_serializes() {
    let record = ProfilingRecord::new(&ProfileSites::scan(&dispatching_chunk()));
    record.update_inline_cache(2, ClassId(40));
    let json = serde_json::to_value(record.snapshot()).unwrap();
    assert_eq!(json["call_sites"][0]["kind"], "Monomorphic");
    assert_eq!(json["call_sites"][0]["receivers"][0], 40);
}

#[test]
fn test_repeated_update_is_idempotent() {
    let record = ProfilingRecord::new(&ProfileSites::scan(&dispatching_chunk()));
    record.update_inline_cache(2, ClassId(40));
    let before = record.inline_cache(2).receivers();
    record.update_inline_cache(2, ClassId(40));
    assert_eq!(record.inline_cache(2).receivers(), before);
    assert_eq!(record.classify(2), CallSiteKind::Monomorphic);
}
