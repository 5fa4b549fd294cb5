//! Unit test suite for aot_loader

mod common;
mod test_lookup;
mod test_open;
mod test_patching;
