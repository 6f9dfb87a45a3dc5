//! Agent Registry CLI Binary
//!
//! Command-line interface for resolution, validation and bulk import.

use agent_registry::logging::init_logging;
use agent_registry::tooling::cli::{Cli, CliContext};
use anyhow::Context;
use clap::Parser;
use std::process;

fn run(cli: &Cli) -> anyhow::Result<String> {
    let config = cli.load_config().context("Error loading configuration")?;
    init_logging(Some(&cli.logging_config(&config.logging))).context("Error initializing logging")?;

    let context = CliContext::from_config(&config, &cli.format).context("Error opening registry")?;
    Ok(context.execute(&cli.command)?)
}

fn main() {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
