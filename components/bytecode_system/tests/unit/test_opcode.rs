//! Tests for Opcode

use bytecode_system::{ArgRange, Opcode, RegisterId};
use core_types::{ClassId, IntrinsicId, MethodId};

#[test]
fn test_branch_classification() {
    assert!(Opcode::Jeqz(0).is_branch());
    assert!(Opcode::Jnez(0).is_branch());
    assert!(!Opcode::Jmp(0).is_branch());
}

#[test]
fn test_call_classification() {
    let call = Opcode::Call {
        method: MethodId(3),
        args: ArgRange::new(0, 2),
    };
    let intrinsic = Opcode::Intrinsic {
        id: IntrinsicId::MaxI64,
        args: ArgRange::new(0, 2),
    };
    assert!(call.is_call());
    assert!(intrinsic.is_call());
    assert!(!Opcode::NewObject(ClassId(20)).is_call());
    assert_eq!(call.args(), Some(ArgRange::new(0, 2)));
}

#[test]
fn test_block_terminators() {
    assert!(Opcode::Return.ends_block());
    assert!(Opcode::Throw.ends_block());
    assert!(Opcode::Jmp(0).ends_block());
    assert!(!Opcode::Jeqz(0).ends_block());
}

#[test]
fn test_register_operand() {
    assert_eq!(Opcode::CmpLt(RegisterId(2)).register(), Some(RegisterId(2)));
    assert_eq!(Opcode::LdaInt(5).register(), None);
}

#[test]
fn test_display_virtual_call() {
    let op = Opcode::CallVirtual {
        method: MethodId(9),
        args: ArgRange::new(1, 1),
    };
    assert_eq!(op.to_string(), "call.virtual method#9 r1+1");
}
