//! Stage command implementation
//!
//! The ad-hoc upload path: incomplete records from a raw file go to staging
//! for review, under the same dedup rules as a run.

use super::{connect_remote, connect_store, load};
use crate::adapters::feed::load_rows;
use crate::core::normalize::SourceKind;
use crate::core::review::ReviewService;
use clap::Args;
use std::path::Path;

/// Arguments for the stage command
#[derive(Args, Debug)]
pub struct StageArgs {
    /// Source whose mapper to use (crl, i3screen, escreen)
    #[arg(long)]
    pub source: SourceKind,

    /// JSON array of raw rows
    #[arg(long, value_name = "FILE")]
    pub file: String,

    /// Report what would be staged without writing
    #[arg(long)]
    pub dry_run: bool,
}

impl StageArgs {
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(source = %self.source, file = %self.file, "Staging uploaded file");

        let config = match load(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };

        let rows = match load_rows(Path::new(&self.file)).await {
            Ok(loaded) => {
                if loaded.malformed > 0 {
                    println!("⚠️  Skipped {} malformed rows", loaded.malformed);
                }
                loaded.rows
            }
            Err(e) => {
                println!("❌ {e}");
                return Ok(5);
            }
        };

        let remote = match connect_remote(&config) {
            Ok(r) => r,
            Err(code) => return Ok(code),
        };
        let store = match connect_store(&config).await {
            Ok(s) => s,
            Err(code) => return Ok(code),
        };

        let service = ReviewService::new(config, remote, store).with_dry_run(self.dry_run);
        let report = match service.stage_upload(self.source, &rows).await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "Staging upload failed");
                println!("❌ Staging failed: {e}");
                return Ok(5);
            }
        };

        println!("📥 Upload Summary ({}):", self.source);
        println!("  Rows: {}", report.rows);
        println!("  Normalized: {}", report.normalized);
        println!("  Skipped: {}", report.skipped);
        println!("  Duplicates: {}", report.duplicates);
        println!("  Complete (not staged): {}", report.complete);
        println!("  Staged: {}", report.staged);
        if report.already_present > 0 {
            println!("  Already staged: {}", report.already_present);
        }
        println!();
        Ok(0)
    }
}
