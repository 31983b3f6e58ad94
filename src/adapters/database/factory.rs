//! Store factory
//!
//! Builds the storage backend from configuration.

use crate::adapters::database::traits::Store;
use crate::adapters::postgresql::{PostgreSQLClient, PostgresStore};
use crate::config::schema::PostgreSQLConfig;
use crate::domain::Result;
use std::sync::Arc;

/// Create the PostgreSQL-backed store
///
/// Connects, verifies the connection and applies the embedded schema.
///
/// # Errors
///
/// Returns an error if the pool cannot be built, the database is unreachable or
/// the schema cannot be applied.
pub async fn create_store(config: &PostgreSQLConfig) -> Result<Arc<dyn Store>> {
    tracing::info!("Creating PostgreSQL store");
    let client = PostgreSQLClient::new(config.clone()).await?;
    client.test_connection().await?;
    client.ensure_schema().await?;

    Ok(Arc::new(PostgresStore::new(client)) as Arc<dyn Store>)
}
