//! Command-line arguments

use crate::error::CliResult;
use clap::{Parser, Subcommand};
use execution_engine::RuntimeOptions;
use std::path::PathBuf;
use tracing::Level;

/// Tiered bytecode VM tools
#[derive(Debug, Parser)]
#[command(name = "tvm", version, about)]
pub struct Cli {
    /// Diagnostic log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: Level,

    /// JSON file with runtime options; absent fields keep their defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// What to do
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the metadata of an AOT image without loading it for execution
    Inspect {
        /// Image file
        image: PathBuf,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Compile the demo program into an AOT image
    BuildImage {
        /// Output file
        out: PathBuf,
    },
    /// Run the demo program and report how its methods tiered
    RunDemo {
        /// Calls per demo method
        #[arg(long, default_value_t = 200)]
        iterations: u32,
        /// Interpret only
        #[arg(long)]
        no_jit: bool,
        /// Load this AOT image before running
        #[arg(long)]
        image: Option<PathBuf>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Runtime options from `--config`, or the defaults
    pub fn runtime_options(&self) -> CliResult<RuntimeOptions> {
        match &self.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)?;
                Ok(RuntimeOptions::from_json(&json)?)
            }
            None => Ok(RuntimeOptions::default()),
        }
    }
}
