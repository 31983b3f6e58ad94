//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "ccfsync.toml")]
    pub output: String,

    /// Include every option with comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing ccfsync configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. Create a .env file with your credentials:");
                println!("     - ZOHO_CLIENT_ID, ZOHO_CLIENT_SECRET, ZOHO_REFRESH_TOKEN");
                println!("     - DATABASE_URL");
                println!("  3. Validate configuration: ccfsync validate-config");
                println!("  4. Preview a run: ccfsync reconcile --dry-run");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {}", e);
                Ok(5)
            }
        }
    }

    fn generate_minimal_config() -> String {
        r#"# ccfsync configuration

environment = "development"

[application]
log_level = "info"
dry_run = false

[crm]
base_url = "https://www.zohoapis.com"
accounts_url = "https://accounts.zoho.com"
client_id = "${ZOHO_CLIENT_ID}"
client_secret = "${ZOHO_CLIENT_SECRET}"
refresh_token = "${ZOHO_REFRESH_TOKEN}"
records_module = "Results_2025"

[postgresql]
connection_string = "${DATABASE_URL}"

[sources]
inbox_dir = "./inbox"
order = ["crl", "i3screen", "escreen"]

[logging]
local_enabled = true
local_path = "./logs"
local_rotation = "daily"
"#
        .to_string()
    }

    fn generate_config_with_examples() -> String {
        r#"# ccfsync configuration
#
# Values of the form ${VAR} are read from the environment (or a .env file).
# Any key can also be overridden with CCFSYNC_<SECTION>_<KEY>.

# Runtime environment: development | staging | production
# Production refuses crm.tls_verify = false.
environment = "development"

# ============================================================================
# Application Settings
# ============================================================================
[application]
# Log level (trace, debug, info, warn, error)
log_level = "info"

# Normalize and classify only: no staging, site creation or record pushes
dry_run = false

# ============================================================================
# CRM
# ============================================================================
[crm]
base_url = "https://www.zohoapis.com"
accounts_url = "https://accounts.zoho.com"

# OAuth refresh-token grant
client_id = "${ZOHO_CLIENT_ID}"
client_secret = "${ZOHO_CLIENT_SECRET}"
refresh_token = "${ZOHO_REFRESH_TOKEN}"
auth_scheme = "Zoho-oauthtoken"

timeout_seconds = 60
tls_verify = true

# Refresh the token when fewer than this many seconds remain
token_refresh_margin_seconds = 60
# Lifetime assumed when the token response has no expires_in
default_token_ttl_seconds = 3500

# Modules
records_module = "Results_2025"
accounts_module = "Accounts"
labs_module = "Laboratories"
sites_module = "Collection_Sites"

# Reference fields
account_code_field = "Account_Code"
account_name_field = "Account_Name"
account_i3_field = "i3_Code"
lab_name_field = "Name"
site_id_field = "Collection_Site_ID"

# Paging and batching (API maximums: 200 per page, 100 per write)
page_size = 200
push_batch_size = 100

# Retries apply to reads only; writes are never retried
[crm.retry]
max_retries = 3
initial_delay_ms = 1000
max_delay_ms = 30000
backoff_multiplier = 2.0

# ============================================================================
# PostgreSQL (staging, uploaded set, collection sites)
# ============================================================================
[postgresql]
connection_string = "${DATABASE_URL}"
max_connections = 10
connection_timeout_seconds = 30
statement_timeout_seconds = 60
# disable | allow | prefer | require | verify-ca | verify-full
ssl_mode = "prefer"

# ============================================================================
# Sources
# ============================================================================
[sources]
# Directory holding crl.json, i3screen.json and escreen.json
inbox_dir = "./inbox"

# Reconciliation order
order = ["crl", "i3screen", "escreen"]

# CRL rows collected before this date are dropped
min_collection_date = "2025-01-01"

# Minimum similarity (0-100) for eScreen company name matching
fuzzy_threshold = 70

# ============================================================================
# Completeness Rules
# ============================================================================
[pipeline]
# Records for this company code must carry a Location
site_required_code = "A1310"

# Test types that never go to a laboratory
lab_exempt_test_types = ["POCT Urine Test", "Alcohol Breath Test"]

# ============================================================================
# Logging
# ============================================================================
[logging]
# JSON log files next to console output
local_enabled = true
local_path = "./logs"
# daily | hourly | never
local_rotation = "daily"
local_max_size_mb = 100
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CcfsyncConfig;

    #[test]
    fn test_init_args_defaults() {
        let args = InitArgs {
            output: "ccfsync.toml".to_string(),
            with_examples: false,
            force: false,
        };

        assert_eq!(args.output, "ccfsync.toml");
        assert!(!args.with_examples);
        assert!(!args.force);
    }

    #[test]
    fn test_generate_minimal_config() {
        let config = InitArgs::generate_minimal_config();
        assert!(config.contains("[crm]"));
        assert!(config.contains("[postgresql]"));
        assert!(config.contains("[sources]"));
    }

    #[test]
    fn test_sample_configs_parse() {
        for sample in [
            InitArgs::generate_minimal_config(),
            InitArgs::generate_config_with_examples(),
        ] {
            let sample = sample
                .replace("${DATABASE_URL}", "postgres://localhost/ccfsync")
                .replace("${ZOHO_CLIENT_ID}", "id")
                .replace("${ZOHO_CLIENT_SECRET}", "secret")
                .replace("${ZOHO_REFRESH_TOKEN}", "refresh");
            let config: CcfsyncConfig = toml::from_str(&sample).unwrap();
            assert!(config.validate().is_ok());
        }
    }
}
