//! Worklist command implementation

use super::{connect_store, load};
use crate::adapters::database::StagingStore;
use crate::core::classify::ClassifierRules;
use clap::Args;

/// Arguments for the worklist command
#[derive(Args, Debug)]
pub struct WorklistArgs {
    /// Print the records as JSON
    #[arg(long)]
    pub json: bool,
}

impl WorklistArgs {
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };
        let store = match connect_store(&config).await {
            Ok(s) => s,
            Err(code) => return Ok(code),
        };

        let records = match store.list_unreviewed().await {
            Ok(r) => r,
            Err(e) => {
                println!("❌ Failed to list staged records: {e}");
                return Ok(5);
            }
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&records)?);
            return Ok(0);
        }

        println!("📋 Records awaiting review: {}", records.len());
        println!();
        let rules = ClassifierRules::from(&config.pipeline);
        for staged in &records {
            let missing: Vec<&str> = rules
                .missing_fields(&staged.record)
                .iter()
                .map(|f| f.api_name())
                .collect();
            println!(
                "  {:<16} {:<9} {:<30} missing: {}",
                staged.ccfid(),
                staged.source,
                staged.record.company,
                if missing.is_empty() {
                    "-".to_string()
                } else {
                    missing.join(", ")
                }
            );
        }
        Ok(0)
    }
}
