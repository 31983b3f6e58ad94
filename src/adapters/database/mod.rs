//! Database abstraction layer
//!
//! Trait-based storage seams with a PostgreSQL backend and an in-memory one.

pub mod factory;
pub mod memory;
pub mod traits;

pub use factory::create_store;
pub use memory::MemoryStore;
pub use traits::{SiteStore, StageResult, StagedRecord, StagingStore, Store, UploadedStore};
