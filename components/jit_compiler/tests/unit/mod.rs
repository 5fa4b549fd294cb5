//! Unit tests for the jit_compiler crate

mod common;
mod test_codec;
mod test_deopt;
mod test_lowering_props;
