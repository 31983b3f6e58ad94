//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the ccfsync configuration file.

use crate::config::load_config;
use clap::Args;
use secrecy::ExposeSecret;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates after parsing and applying overrides
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration is invalid");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let sources: Vec<&str> = config.sources.order.iter().map(|s| s.as_str()).collect();
        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Environment: {:?}", config.environment);
        println!("  Log Level: {}", config.application.log_level);
        println!("  Dry Run: {}", config.application.dry_run);
        println!("  CRM: {}", config.crm.base_url);
        println!("  Records Module: {}", config.crm.records_module);
        println!("  Push Batch Size: {}", config.crm.push_batch_size);
        println!(
            "  PostgreSQL: {}",
            config
                .postgresql
                .connection_string
                .expose_secret()
                .as_ref()
                .split('@')
                .next_back()
                .unwrap_or("***")
        );
        println!("  Inbox: {}", config.sources.inbox_dir);
        println!("  Sources: {}", sources.join(", "));
        println!("  Min Collection Date: {}", config.sources.min_collection_date);
        println!("  Site-Required Code: {}", config.pipeline.site_required_code);
        println!();
        Ok(0)
    }
}
