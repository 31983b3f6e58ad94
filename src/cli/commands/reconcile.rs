//! Reconcile command implementation
//!
//! Runs every configured source through normalization, staging and pushing.

use super::{connect_remote, connect_store, load, parse_sources};
use crate::adapters::feed::SourceFeed;
use crate::core::run::{ReconcileCoordinator, RunSummary};
use clap::Args;
use tokio::sync::watch;

/// Arguments for the reconcile command
#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Normalize and classify without staging, creating sites or pushing
    #[arg(long)]
    pub dry_run: bool,

    /// Sources to reconcile, comma-separated (defaults to sources.order)
    #[arg(long, value_name = "LIST")]
    pub source: Option<String>,

    /// Read `{source}.json` files from this directory instead of sources.inbox_dir
    #[arg(long, value_name = "DIR")]
    pub inbox: Option<String>,
}

impl ReconcileArgs {
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting reconcile command");

        let mut config = match load(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };

        let sources = match &self.source {
            Some(list) => match parse_sources(list) {
                Ok(sources) if !sources.is_empty() => sources,
                Ok(_) => {
                    println!("❌ --source names no sources");
                    return Ok(2);
                }
                Err(e) => {
                    println!("❌ {e}");
                    return Ok(2);
                }
            },
            None => config.sources.order.clone(),
        };

        if let Some(inbox) = &self.inbox {
            tracing::info!(inbox = %inbox, "Overriding inbox directory from CLI");
            config.sources.inbox_dir = inbox.clone();
        }

        let dry_run = self.dry_run || config.application.dry_run;
        if dry_run {
            tracing::info!("Dry run mode enabled - nothing will be written");
            println!("🔍 DRY RUN MODE - No records will be staged or pushed");
            println!();
        }

        let remote = match connect_remote(&config) {
            Ok(r) => r,
            Err(code) => return Ok(code),
        };
        let store = match connect_store(&config).await {
            Ok(s) => s,
            Err(code) => return Ok(code),
        };

        let feed = SourceFeed::new(&config.sources.inbox_dir);
        let coordinator = ReconcileCoordinator::new(config, remote, store)
            .with_dry_run(dry_run)
            .with_feed(feed)
            .with_shutdown_signal(shutdown_signal);

        println!("🚀 Reconciling {} source(s)...", sources.len());
        println!();

        let summary = match coordinator.run(&sources).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Run aborted before any source was processed");
                println!("❌ Run aborted: {e}");
                return Ok(4);
            }
        };

        summary.log_summary();
        print_summary(&summary);

        let exit_code = if summary.is_successful() {
            println!("✅ Reconciliation completed successfully!");
            0
        } else {
            println!("⚠️  Reconciliation completed with failures");
            1
        };
        Ok(exit_code)
    }
}

fn print_summary(summary: &RunSummary) {
    println!("📊 Run Summary ({}):", summary.run_id);
    for source in &summary.sources {
        println!();
        println!("  {} [{}]", source.source, source.final_state);
        println!("    Rows: {}", source.rows_loaded);
        println!("    Normalized: {}", source.normalized);
        println!("    Skipped: {}", source.skipped);
        println!("    Complete: {}", source.complete);
        println!("    Incomplete: {}", source.incomplete);
        println!("    Duplicates Skipped: {}", source.duplicates_skipped);
        println!("    Staged: {}", source.staged);
        println!("    Pushed: {}", source.pushed);
        println!("    Rejected: {}", source.rejected);
        println!("    Lookup Misses: {}", source.lookup_misses);
        println!("    Sites Created: {}", source.sites_created);
        println!("    Duration: {:.2}s", source.duration.as_secs_f64());

        if !source.errors.is_empty() {
            println!("    ⚠️  Errors:");
            for error in source.errors.iter().take(10) {
                println!("      - {:?}: {}", error.kind, error.message);
                if let Some(context) = &error.context {
                    println!("        Context: {context}");
                }
            }
            if source.errors.len() > 10 {
                println!("      ... and {} more errors", source.errors.len() - 10);
            }
        }
    }
    println!();
    println!(
        "  Total: {} pushed, {} staged, {} rejected in {:.2}s",
        summary.total_pushed(),
        summary.total_staged(),
        summary.total_rejected(),
        summary.duration.as_secs_f64()
    );
    if summary.dry_run {
        println!("  (dry run: counts show what would have happened)");
    }
    println!();
}
