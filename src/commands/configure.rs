//! # Configure Command Implementation
//!
//! Mirror-clones every source repository listed in the settings that is not
//! mirrored yet (a few at a time), fetches the ones that are, and records
//! their locations in the registry. Running it again is safe.

use anyhow::{Context as _, Result};
use clap::Args;
use std::fs;

use bundle_publish::git;
use bundle_publish::output::emoji;
use bundle_publish::repository::RepositoryManager;

use super::{open_registry, Context};

/// Mirror the configured source repositories and register them
#[derive(Args, Debug)]
pub struct ConfigureArgs {
    /// Also fetch repositories that are already mirrored.
    #[arg(long)]
    pub fetch: bool,
}

/// Execute the `configure` command.
pub fn execute(args: ConfigureArgs, ctx: &Context) -> Result<()> {
    let out = ctx.output();
    let settings = ctx.settings()?;

    if !git::is_available() {
        anyhow::bail!("git is not installed or not on PATH");
    }
    if settings.sources.repos.is_empty() {
        anyhow::bail!("No source repositories configured in {}", ctx.config.display());
    }

    fs::create_dir_all(settings.mirrors_dir()).with_context(|| {
        format!("Failed to create workspace {}", settings.workspace.display())
    })?;

    let manager = RepositoryManager::new(open_registry(&settings)?, settings.concurrency);
    let repos = manager.configure(&settings)?;
    if args.fetch {
        manager.fetch_all(&repos)?;
    }

    for repo in &repos {
        let registry = manager.registry();
        match registry.location(repo)? {
            Some(location) => println!(
                "{} {} -> {}",
                emoji(&out, "✅", "[OK]"),
                repo,
                location.display()
            ),
            None => println!("{} {} is not mirrored", emoji(&out, "⚠️", "[WARN]"), repo),
        }
    }
    println!(
        "{} {} repositories configured in {}",
        emoji(&out, "📦", "[DONE]"),
        repos.len(),
        settings.workspace.display()
    );
    Ok(())
}
