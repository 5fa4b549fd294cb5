//! Tests for ProfileSites

use bytecode_system::{ArgRange, BytecodeChunk, Opcode, ProfileSites};
use core_types::{IntrinsicId, MethodId};

#[test]
fn test_static_calls_are_not_inline_cache_sites() {
    let mut chunk = BytecodeChunk::new(1, 1);
    chunk.emit(Opcode::Call {
        method: MethodId(1),
        args: ArgRange::new(0, 1),
    });
    chunk.emit(Opcode::Intrinsic {
        id: IntrinsicId::AbsI64,
        args: ArgRange::new(0, 1),
    });
    chunk.emit(Opcode::CallVirtual {
        method: MethodId(2),
        args: ArgRange::new(0, 1),
    });
    chunk.emit(Opcode::Return);

    let sites = ProfileSites::scan(&chunk);
    assert_eq!(sites.calls, vec![2]);
    assert!(sites.branches.is_empty());
}
