//! `tvm`: tiered bytecode VM tools
//!
//! Parses CLI arguments, installs logging and delegates to the subcommand.

use clap::Parser;
use tvm_cli::{commands, Cli, CliResult, Command};

fn run(cli: &Cli) -> CliResult<String> {
    let options = cli.runtime_options()?;
    match &cli.command {
        Command::Inspect { image, json } => commands::inspect(image, &options, *json),
        Command::BuildImage { out } => commands::build_demo_image(out, &options),
        Command::RunDemo {
            iterations,
            no_jit,
            image,
            json,
        } => commands::demo(options, *iterations, *no_jit, image.as_deref(), *json),
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(output) => print!("{}", output),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
