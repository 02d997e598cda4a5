//! # Watch Command Implementation
//!
//! Connects to a publish started with `--listen` and prints every progress
//! message until the publisher closes the session.

use anyhow::{Context as _, Result};
use clap::Args;

use bundle_publish::session::SessionReader;

use super::Context;

/// Follow the progress of a publish started with --listen
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Port printed by `publish --listen`.
    pub port: u16,
}

/// Execute the `watch` command.
pub fn execute(args: WatchArgs, _ctx: &Context) -> Result<()> {
    let reader = SessionReader::connect(args.port)
        .with_context(|| format!("Nothing is listening on port {}", args.port))?;
    reader.read_frames(|frame| println!("{}", frame))?;
    Ok(())
}
