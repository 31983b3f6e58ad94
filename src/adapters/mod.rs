//! External system integrations.
//!
//! - [`crm`] - CRM reference reads, site creation and record submission
//! - [`database`] - storage traits, the in-memory store and the store factory
//! - [`postgresql`] - PostgreSQL implementation of the storage traits
//! - [`feed`] - raw source rows dropped in the inbox
//!
//! # Design Pattern
//!
//! Adapters isolate external dependencies so the reconciliation core can run
//! against fakes. The core only sees [`crm::RemoteSystem`] and
//! [`database::Store`].
//!
//! ```rust,no_run
//! use ccfsync::adapters::crm::CrmClient;
//! use ccfsync::config::{secret_string, CrmConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CrmConfig::new(
//!     "https://www.zohoapis.com",
//!     "client-id",
//!     secret_string("client-secret".to_string()),
//!     secret_string("refresh-token".to_string()),
//! );
//! let client = CrmClient::new(config)?;
//! # let _ = client;
//! # Ok(())
//! # }
//! ```

pub mod crm;
pub mod database;
pub mod feed;
pub mod postgresql;
