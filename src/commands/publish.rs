//! # Publish Command Implementation
//!
//! Fetches a registered repository and publishes every changeset after the
//! last published one, oldest first, cascading into the repositories that
//! embed its files.
//!
//! With `--listen` the progress is streamed over TCP instead of the log: the
//! command prints the port it listens on and waits for `bundle-publish watch`
//! (or any client reading `@@@`-delimited frames) to connect before it starts.
//! With `--preview` nothing is published; the affected bundles and cascades
//! of every pending changeset are printed instead.

use anyhow::Result;
use clap::Args;
use std::sync::Arc;
use std::time::Duration;

use bundle_publish::output::{emoji, render_diff, OutputConfig};
use bundle_publish::publish::{CascadeReport, ChangesetReport, Publisher};
use bundle_publish::session::SessionListener;

use super::{open_publisher, Context};

/// Publish the new changesets of a repository
#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Repository identifier, as registered by `configure`.
    pub repo: String,

    /// Publish the changesets after this revision instead of after the last
    /// published one.
    #[arg(long, value_name = "REV")]
    pub skip: Option<String>,

    /// Only show what would be published.
    #[arg(long)]
    pub preview: bool,

    /// Stream progress to a consumer connecting over TCP.
    #[arg(long)]
    pub listen: bool,
}

/// Execute the `publish` command.
pub fn execute(args: PublishArgs, ctx: &Context) -> Result<()> {
    let out = ctx.output();
    let settings = ctx.settings()?;
    let mut publisher = open_publisher(&settings)?;

    if args.preview {
        return preview(&publisher, &args, &out);
    }

    if args.listen {
        let listener = SessionListener::bind(Duration::from_secs(settings.session_timeout_secs))?;
        println!("Listening on port {}", listener.port()?);
        publisher = publisher.with_progress(Arc::new(listener.accept()?));
    }

    let reports = publisher.publish_range(&args.repo, args.skip.as_deref())?;
    if reports.is_empty() {
        println!("{} {} is up to date", emoji(&out, "✅", "[OK]"), args.repo);
    }
    for report in &reports {
        print_report(&out, report, 0);
    }
    Ok(())
}

fn preview(publisher: &Publisher, args: &PublishArgs, out: &OutputConfig) -> Result<()> {
    let repo = &args.repo;
    let backend = publisher.repos().backend(repo)?;
    backend.fetch()?;
    let since = match &args.skip {
        Some(rev) => Some(rev.clone()),
        None => publisher.repos().registry().last_published(repo)?,
    };

    for revision in backend.revisions(since.as_deref())? {
        let preview = publisher.preview(repo, &revision)?;
        println!("{} {}@{}", emoji(out, "🔍", "[SCAN]"), repo, revision);
        for line in render_diff(out, &preview.affected) {
            println!("   {}", line);
        }
        for (target, diff) in &preview.cascades {
            println!("   {} republish {}", emoji(out, "🔁", "->"), target);
            for line in render_diff(out, diff) {
                println!("      {}", line);
            }
        }
    }
    Ok(())
}

fn print_report(out: &OutputConfig, report: &ChangesetReport, depth: usize) {
    let indent = "   ".repeat(depth);
    let commit = report.commit.as_deref().unwrap_or("nothing to commit");
    println!(
        "{}{} {}@{} ({} outputs, {})",
        indent,
        emoji(out, "📦", "[PUB]"),
        report.repo,
        report.revision,
        report.affected.len(),
        commit
    );
    for cascade in &report.cascades {
        print_cascade(out, cascade, depth + 1);
    }
}

fn print_cascade(out: &OutputConfig, cascade: &CascadeReport, depth: usize) {
    match &cascade.outcome {
        Ok(report) => print_report(out, report, depth),
        Err(message) => println!(
            "{}{} {} ({}): {}",
            "   ".repeat(depth),
            emoji(out, "❌", "[ERR]"),
            cascade.target,
            cascade.trail,
            message
        ),
    }
}
