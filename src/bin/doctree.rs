//! Doctree CLI Binary
//!
//! Command-line interface for the hierarchical document store.

use anyhow::Context;
use clap::Parser;
use doctree::config::ConfigLoader;
use doctree::logging::init_logging;
use doctree::tooling::cli::{Cli, CliContext};
use std::process;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config =
        ConfigLoader::load_optional(cli.config.as_deref()).context("loading configuration")?;
    cli.apply_overrides(&mut config);

    init_logging(Some(&config.logging)).context("initializing logging")?;

    let context = CliContext::from_config(config).context("opening document store")?;
    let output = context.execute(&cli.command)?;
    println!("{}", output);
    Ok(())
}
