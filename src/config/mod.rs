//! Configuration management for ccfsync.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! ccfsync uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `CCFSYNC_<SECTION>_<KEY>` overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ccfsync::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("ccfsync.toml")?;
//!
//! println!("CRM: {}", config.crm.base_url);
//! println!("Inbox: {}", config.sources.inbox_dir);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - log level and dry-run switch
//! - [`CrmConfig`] - CRM connection, OAuth, modules, batching and [`RetryConfig`]
//! - [`PostgreSQLConfig`] - local staging database
//! - [`SourcesConfig`] - inbox directory, source order and mapper knobs
//! - [`PipelineConfig`] - completeness rules
//! - [`LoggingConfig`] - file logging
//!
//! # Example Configuration
//!
//! ```toml
//! [crm]
//! base_url = "https://www.zohoapis.com"
//! client_id = "1000.XXXX"
//! client_secret = "${ZOHO_CLIENT_SECRET}"
//! refresh_token = "${ZOHO_REFRESH_TOKEN}"
//!
//! [postgresql]
//! connection_string = "${DATABASE_URL}"
//!
//! [sources]
//! inbox_dir = "/srv/ccfsync/inbox"
//! order = ["crl", "i3screen", "escreen"]
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::load_config;
pub use schema::{
    ApplicationConfig, CcfsyncConfig, CrmConfig, Environment, LoggingConfig, PipelineConfig,
    PostgreSQLConfig, RetryConfig, SourcesConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
