//! # Resolve Command Implementation
//!
//! Prints the content a bundle resolves to at a revision, or writes it to a
//! file. Binary bundles are only written to files.

use anyhow::{Context as _, Result};
use clap::Args;
use std::io::Write;
use std::path::PathBuf;

use super::{open_publisher, Context};

/// Print the resolved content of a bundle
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Repository identifier.
    pub repo: String,

    /// Revision to resolve at, e.g. `HEAD`.
    pub revision: String,

    /// Bundle name as declared in concatfile.json.
    pub bundle: String,

    /// Write the content to this file instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Execute the `resolve` command.
pub fn execute(args: ResolveArgs, ctx: &Context) -> Result<()> {
    let publisher = open_publisher(&ctx.settings()?)?;
    let content = publisher.resolve(&args.repo, &args.revision, &args.bundle)?;

    match &args.output {
        Some(path) => std::fs::write(path, content.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            if content.is_binary() {
                anyhow::bail!("{} is binary, use --output to save it", args.bundle);
            }
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}
