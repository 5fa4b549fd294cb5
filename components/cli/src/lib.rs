//! Tooling for the tiered bytecode VM
//!
//! Backs the `tvm` binary: inspecting AOT images, building an image of the
//! bundled demo program, and running the demo to show methods tiering up.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod commands;
pub mod demo;
pub mod error;

pub use cli::{Cli, Command};
pub use demo::{demo_program, DemoReport, MethodReport};
pub use error::{CliError, CliResult};
