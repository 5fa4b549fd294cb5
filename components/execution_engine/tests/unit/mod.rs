//! Unit tests for the execution_engine crate

mod test_aot;
mod test_concurrency;
mod test_exceptions;
mod test_osr;
mod test_state_machine;
