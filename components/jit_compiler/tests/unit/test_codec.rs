use super::common::*;
use jit_compiler::{decode, encode, CodeOrigin};

#[test]
fn test_decoded_code_is_aot_and_valid() {
    let code = Harness::new().compile(&loop_chunk(), None, None).unwrap();
    code.invalidate();
    let bytes = encode(&code).unwrap();
    let decoded = decode(&bytes).unwrap();

    assert_eq!(decoded.origin, CodeOrigin::Aot);
    assert!(!decoded.is_invalidated());
    assert!(decoded.intrinsic_table().is_none());
    assert_eq!(decoded.ops, code.ops);
    assert_eq!(decoded.frame_mapping, code.frame_mapping);
    assert_eq!(decoded.deopt_points, code.deopt_points);
    assert_eq!(decoded.osr_entries, code.osr_entries);
}
