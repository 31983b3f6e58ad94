//! PostgreSQL database integration
//!
//! Staging records, the uploaded CCFID set and the collection-site tables
//! live in PostgreSQL.

pub mod client;
pub mod models;
pub mod store;

pub use client::PostgreSQLClient;
pub use store::PostgresStore;
