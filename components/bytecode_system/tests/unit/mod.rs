//! Unit test suite for bytecode_system

mod test_chunk;
mod test_opcode;
mod test_sites;
