//! CLI command implementations
//!
//! Each command returns a process exit code: 0 ok, 1 partial failure,
//! 2 configuration error, 4 connection error, 5 fatal.

pub mod init;
pub mod normalize;
pub mod reconcile;
pub mod review;
pub mod stage;
pub mod sync_uploaded;
pub mod validate;
pub mod worklist;

use crate::adapters::crm::{CrmClient, RemoteSystem};
use crate::adapters::database::{create_store, Store};
use crate::config::{load_config, CcfsyncConfig};
use crate::core::normalize::SourceKind;
use std::sync::Arc;

/// Load the configuration, printing the failure as exit code 2
pub(crate) fn load(config_path: &str) -> Result<CcfsyncConfig, i32> {
    load_config(config_path).map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        println!("❌ Failed to load configuration file");
        println!("   Error: {e}");
        2
    })
}

/// Build the CRM client; an unusable base URL is a configuration error
pub(crate) fn connect_remote(config: &CcfsyncConfig) -> Result<Arc<dyn RemoteSystem>, i32> {
    match CrmClient::new(config.crm.clone()) {
        Ok(client) => Ok(Arc::new(client)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to create CRM client");
            println!("❌ Failed to create CRM client");
            println!("   Error: {e}");
            Err(2)
        }
    }
}

pub(crate) async fn connect_store(config: &CcfsyncConfig) -> Result<Arc<dyn Store>, i32> {
    create_store(&config.postgresql).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to connect to PostgreSQL");
        println!("❌ Failed to connect to database");
        println!("   Error: {e}");
        4
    })
}

/// Parse a comma-separated source list
pub(crate) fn parse_sources(list: &str) -> Result<Vec<SourceKind>, String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}
