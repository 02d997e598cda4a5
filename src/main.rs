//! # Bundle Publish CLI
//!
//! Binary entry point of the `bundle-publish` command-line tool. It parses the
//! arguments, sets up logging and dispatches to a command; everything else
//! lives in the library crate.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
