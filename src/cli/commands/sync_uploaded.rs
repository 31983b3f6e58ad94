//! Sync-uploaded command implementation
//!
//! Pulls every CCFID from the CRM records module and adds the ones missing
//! from the local uploaded set.

use super::{connect_remote, connect_store, load};
use crate::core::dedup::sync_uploaded;
use clap::Args;

/// Arguments for the sync-uploaded command
#[derive(Args, Debug)]
pub struct SyncUploadedArgs {
    /// Report missing CCFIDs without writing them
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncUploadedArgs {
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Reconciling uploaded set with the CRM");

        let config = match load(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };
        let dry_run = self.dry_run || config.application.dry_run;

        let remote = match connect_remote(&config) {
            Ok(r) => r,
            Err(code) => return Ok(code),
        };
        let store = match connect_store(&config).await {
            Ok(s) => s,
            Err(code) => return Ok(code),
        };

        println!("🔄 Fetching CCFIDs from {}...", config.crm.records_module);
        let report = match sync_uploaded(remote.as_ref(), store.as_ref(), dry_run).await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "Uploaded set reconciliation failed");
                println!("❌ Failed: {e}");
                return Ok(4);
            }
        };

        println!();
        println!("📊 Uploaded Set:");
        println!("  Remote CCFIDs: {}", report.remote);
        println!("  Local CCFIDs: {}", report.local);
        println!("  Missing locally: {}", report.missing);
        if dry_run {
            println!("  🔍 DRY RUN - nothing was written");
        } else {
            println!("  Added: {}", report.added);
        }
        println!();
        Ok(0)
    }
}
