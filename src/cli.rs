//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use bundle_publish::defaults::SETTINGS_FILE;

use crate::commands;

/// Bundle Publish - Rebuild and republish concatenated bundles from git repositories
#[derive(Parser, Debug)]
#[command(name = "bundle-publish")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Path to the server settings file
    #[arg(
        short,
        long,
        global = true,
        value_name = "FILE",
        env = "BUNDLE_PUBLISH_CONFIG",
        default_value = SETTINGS_FILE
    )]
    config: PathBuf,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace); RUST_LOG wins when set
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Mirror the configured source repositories and register them
    Configure(commands::configure::ConfigureArgs),

    /// Publish the new changesets of a repository
    Publish(commands::publish::PublishArgs),

    /// Show the bundles affected by a changeset
    Affected(commands::affected::AffectedArgs),

    /// Print the resolved content of a bundle
    Resolve(commands::resolve::ResolveArgs),

    /// List registered repositories and their last published changeset
    Repos(commands::repos::ReposArgs),

    /// Follow the progress of a publish started with --listen
    Watch(commands::watch::WatchArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);
        let ctx = commands::Context {
            config: self.config,
            color: self.color,
        };

        match self.command {
            Commands::Configure(args) => commands::configure::execute(args, &ctx),
            Commands::Publish(args) => commands::publish::execute(args, &ctx),
            Commands::Affected(args) => commands::affected::execute(args, &ctx),
            Commands::Resolve(args) => commands::resolve::execute(args, &ctx),
            Commands::Repos(args) => commands::repos::execute(args, &ctx),
            Commands::Watch(args) => commands::watch::execute(args, &ctx),
        }
    }
}

fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}
