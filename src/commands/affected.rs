//! # Affected Command Implementation
//!
//! Shows the propagated bundle set of one changeset, and optionally the
//! repositories it would cascade into. Read-only.

use anyhow::Result;
use clap::Args;

use bundle_publish::output::{emoji, render_diff};

use super::{open_publisher, Context};

/// Show the bundles affected by a changeset
#[derive(Args, Debug)]
pub struct AffectedArgs {
    /// Repository identifier.
    pub repo: String,

    /// Revision to inspect.
    #[arg(default_value = "HEAD")]
    pub revision: String,

    /// Also list the repositories that would be republished.
    #[arg(long)]
    pub cascades: bool,
}

/// Execute the `affected` command.
pub fn execute(args: AffectedArgs, ctx: &Context) -> Result<()> {
    let out = ctx.output();
    let publisher = open_publisher(&ctx.settings()?)?;

    if args.cascades {
        let preview = publisher.preview(&args.repo, &args.revision)?;
        for line in render_diff(&out, &preview.affected) {
            println!("{}", line);
        }
        for (target, diff) in &preview.cascades {
            println!("{} {}", emoji(&out, "🔁", "->"), target);
            for line in render_diff(&out, diff) {
                println!("   {}", line);
            }
        }
        return Ok(());
    }

    let affected = publisher.affected(&args.repo, &args.revision)?;
    if affected.is_empty() {
        println!("No bundles affected");
    }
    for line in render_diff(&out, &affected) {
        println!("{}", line);
    }
    Ok(())
}
