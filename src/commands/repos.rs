//! # Repos Command Implementation
//!
//! Lists the registered repositories with their mirror location and the last
//! published changeset.

use anyhow::Result;
use clap::Args;

use super::{open_registry, Context};

/// List registered repositories and their last published changeset
#[derive(Args, Debug)]
pub struct ReposArgs {
    /// Print only the repository identifiers.
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the `repos` command.
pub fn execute(args: ReposArgs, ctx: &Context) -> Result<()> {
    let registry = open_registry(&ctx.settings()?)?;
    let repos = registry.repositories()?;
    if repos.is_empty() && !args.quiet {
        println!("No repositories registered, run `bundle-publish configure` first");
    }

    for repo in repos {
        if args.quiet {
            println!("{}", repo);
            continue;
        }
        let published = registry
            .last_published(&repo)?
            .unwrap_or_else(|| "never published".to_string());
        let location = registry
            .location(&repo)?
            .map(|path| path.display().to_string())
            .unwrap_or_default();
        println!("{}\t{}\t{}", repo, published, location);
    }
    Ok(())
}
