//! Normalize command implementation
//!
//! Maps one raw source file to canonical records and writes them as JSON,
//! with each record's completeness. Nothing is staged or pushed.

use super::{connect_remote, load};
use crate::adapters::feed::load_rows;
use crate::core::classify::{ClassifierRules, CompletenessClass};
use crate::core::normalize::{normalize, MapperContext, SourceKind};
use crate::domain::record::CanonicalRecord;
use clap::Args;
use serde::Serialize;
use std::path::Path;

/// Arguments for the normalize command
#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Source whose mapper to use (crl, i3screen, escreen)
    #[arg(long)]
    pub source: SourceKind,

    /// JSON array of raw rows
    #[arg(long, value_name = "FILE")]
    pub file: String,

    /// Write output here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<String>,

    /// Skip the CRM account lookup (i3screen codes and eScreen companies stay unresolved)
    #[arg(long)]
    pub offline: bool,
}

/// One normalized record with its classification
#[derive(Debug, Serialize)]
struct NormalizedRecord<'a> {
    complete: bool,
    missing: Vec<&'static str>,
    #[serde(flatten)]
    record: &'a CanonicalRecord,
}

impl NormalizeArgs {
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(source = %self.source, file = %self.file, "Normalizing source file");

        let config = match load(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };

        let accounts = if self.offline {
            tracing::warn!("Offline mode: account lookups disabled");
            Vec::new()
        } else {
            let remote = match connect_remote(&config) {
                Ok(r) => r,
                Err(code) => return Ok(code),
            };
            match remote.fetch_reference().await {
                Ok(snapshot) => snapshot.accounts,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to fetch CRM accounts");
                    eprintln!("❌ Failed to fetch CRM accounts: {e}");
                    eprintln!("   Use --offline to normalize without them");
                    return Ok(4);
                }
            }
        };

        let rows = match load_rows(Path::new(&self.file)).await {
            Ok(loaded) => {
                if loaded.malformed > 0 {
                    eprintln!("⚠️  Skipped {} malformed rows", loaded.malformed);
                }
                loaded.rows
            }
            Err(e) => {
                eprintln!("❌ {e}");
                return Ok(5);
            }
        };

        let ctx = MapperContext::new(&config.sources, &config.pipeline, &accounts);
        let rules = ClassifierRules::from(&config.pipeline);
        let output = normalize(self.source, &rows, &ctx);

        let records: Vec<NormalizedRecord<'_>> = output
            .records
            .iter()
            .map(|record| {
                let missing = rules.missing_fields(record);
                NormalizedRecord {
                    complete: rules.classify(record) == CompletenessClass::Complete,
                    missing: missing.iter().map(|f| f.api_name()).collect(),
                    record,
                }
            })
            .collect();
        let json = serde_json::to_string_pretty(&records)?;

        match &self.output {
            Some(path) => {
                tokio::fs::write(path, json).await?;
                let complete = records.iter().filter(|r| r.complete).count();
                println!("✅ Wrote {} records to {path}", records.len());
                println!("   Complete: {complete}");
                println!("   Incomplete: {}", records.len() - complete);
                println!(
                    "   Skipped rows: {}",
                    output.skipped + output.duplicates_in_batch
                );
            }
            None => println!("{json}"),
        }
        Ok(0)
    }
}
