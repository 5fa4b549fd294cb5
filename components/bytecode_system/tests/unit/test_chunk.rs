//! Tests for BytecodeChunk

use bytecode_system::{ArgRange, BytecodeChunk, ChunkError, Opcode, RegisterId, TryBlock};
use core_types::{ClassId, MethodId};

#[test]
fn test_chunk_creation() {
    let chunk = BytecodeChunk::new(4, 2);
    assert_eq!(chunk.instruction_count(), 0);
    assert_eq!(chunk.register_count, 4);
    assert_eq!(chunk.arg_count, 2);
    assert!(chunk.try_blocks.is_empty());
}

#[test]
fn test_emit_returns_instruction_index() {
    let mut chunk = BytecodeChunk::new(0, 0);
    assert_eq!(chunk.emit(Opcode::Nop), 0);
    assert_eq!(chunk.emit(Opcode::LdaNull), 1);
    assert_eq!(chunk.next_pc(), 2);
}

#[test]
fn test_empty_chunk_is_invalid() {
    assert_eq!(BytecodeChunk::new(0, 0).validate(), Err(ChunkError::Empty));
}

#[test]
fn test_arguments_must_fit() {
    let mut chunk = BytecodeChunk::new(1, 2);
    chunk.emit(Opcode::Return);
    assert!(matches!(
        chunk.validate(),
        Err(ChunkError::ArgumentsExceedRegisters { args: 2, registers: 1 })
    ));
}

#[test]
fn test_call_arguments_must_fit() {
    let mut chunk = BytecodeChunk::new(2, 0);
    chunk.emit(Opcode::Call {
        method: MethodId(1),
        args: ArgRange::new(1, 2),
    });
    chunk.emit(Opcode::Return);
    assert!(matches!(
        chunk.validate(),
        Err(ChunkError::RegisterOutOfRange { pc: 0, .. })
    ));
}

#[test]
fn test_jump_out_of_range() {
    let mut chunk = BytecodeChunk::new(0, 0);
    chunk.emit(Opcode::Jmp(10));
    assert_eq!(
        chunk.validate(),
        Err(ChunkError::JumpOutOfRange { pc: 0, target: 10 })
    );
}

#[test]
fn test_try_block_out_of_range() {
    let mut chunk = BytecodeChunk::new(0, 0);
    chunk.emit(Opcode::Return);
    chunk.add_try_block(TryBlock {
        start: 0,
        end: 1,
        handler: 4,
        catch_class: None,
    });
    assert_eq!(
        chunk.validate(),
        Err(ChunkError::TryBlockOutOfRange { index: 0 })
    );
}

#[test]
fn test_operand_check_accepts_open_ended_chunks() {
    assert_eq!(BytecodeChunk::new(0, 0).check_operands(), Ok(()));

    let mut chunk = BytecodeChunk::new(1, 1);
    chunk.emit(Opcode::Lda(RegisterId(0)));
    assert_eq!(chunk.check_operands(), Ok(()));
    assert_eq!(chunk.validate(), Err(ChunkError::FallsOffEnd));

    chunk.emit(Opcode::Sta(RegisterId(1)));
    assert_eq!(
        chunk.check_operands(),
        Err(ChunkError::RegisterOutOfRange { pc: 1, register: 1 })
    );
}

#[test]
fn test_try_blocks_covering_innermost_first() {
    let mut chunk = BytecodeChunk::new(0, 0);
    for _ in 0..6 {
        chunk.emit(Opcode::Nop);
    }
    chunk.emit(Opcode::Return);
    let inner = TryBlock {
        start: 1,
        end: 3,
        handler: 5,
        catch_class: Some(ClassId::ARITHMETIC_EXCEPTION),
    };
    let outer = TryBlock {
        start: 0,
        end: 4,
        handler: 6,
        catch_class: None,
    };
    chunk.add_try_block(inner);
    chunk.add_try_block(outer);

    let covering: Vec<&TryBlock> = chunk.try_blocks_covering(2).collect();
    assert_eq!(covering, vec![&inner, &outer]);
    let covering: Vec<&TryBlock> = chunk.try_blocks_covering(3).collect();
    assert_eq!(covering, vec![&outer]);
    assert_eq!(chunk.try_blocks_covering(4).count(), 0);
}

#[test]
fn test_forward_jumps_are_not_loop_headers() {
    let mut chunk = BytecodeChunk::new(0, 0);
    chunk.emit(Opcode::Jmp(2));
    chunk.emit(Opcode::Nop);
    chunk.emit(Opcode::Return);
    assert!(chunk.loop_headers().is_empty());
}

#[test]
fn test_self_loop_is_loop_header() {
    let mut chunk = BytecodeChunk::new(1, 0);
    chunk.emit(Opcode::Lda(RegisterId(0)));
    chunk.emit(Opcode::Jnez(1));
    chunk.emit(Opcode::Return);
    assert_eq!(chunk.loop_headers(), vec![1]);
}

#[test]
fn test_disassemble_lists_handlers() {
    let mut chunk = BytecodeChunk::new(0, 0);
    chunk.emit(Opcode::Throw);
    chunk.emit(Opcode::Return);
    chunk.add_try_block(TryBlock {
        start: 0,
        end: 1,
        handler: 1,
        catch_class: None,
    });
    let listing = chunk.disassemble();
    assert!(listing.contains("0: throw"));
    assert!(listing.contains("try [0, 1) -> @1 catch any"));
}
