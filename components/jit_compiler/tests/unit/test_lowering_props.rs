use super::common::*;
use bytecode_system::{BytecodeChunk, Opcode, RegisterId};
use jit_compiler::MOp;
use proptest::prelude::*;

fn straight_line() -> impl Strategy<Value = Vec<Opcode>> {
    let op = prop_oneof![
        any::<i64>().prop_map(Opcode::LdaInt),
        (0u16..4).prop_map(|r| Opcode::Lda(RegisterId(r))),
        (0u16..4).prop_map(|r| Opcode::Sta(RegisterId(r))),
        (0u16..4).prop_map(|r| Opcode::Add(RegisterId(r))),
        (0u16..4).prop_map(|r| Opcode::Mul(RegisterId(r))),
        (0u16..4).prop_map(|r| Opcode::CmpEq(RegisterId(r))),
    ];
    prop::collection::vec(op, 0..40)
}

proptest! {
    #[test]
    fn compiled_pcs_match_bytecode_pcs(body in straight_line()) {
        let mut chunk = BytecodeChunk::new(4, 0);
        for op in body {
            chunk.emit(op);
        }
        chunk.emit(Opcode::Return);

        let code = Harness::new().compile(&chunk, None, None).unwrap();
        prop_assert_eq!(code.ops.len(), chunk.instruction_count());
        for point in &code.deopt_points {
            let is_arith = matches!(code.ops[point.pc as usize], MOp::IntArith { guard: true, .. });
            prop_assert!(is_arith);
        }
        prop_assert!(code.slot_count as usize <= 5);
    }
}
