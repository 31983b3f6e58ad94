//! Domain models and types for ccfsync.
//!
//! The domain layer provides:
//! - **Canonical record model** ([`CanonicalRecord`], [`CanonicalField`], [`RawRow`])
//! - **Strongly-typed identifiers** ([`Ccfid`], [`RemoteId`])
//! - **Error types** ([`ReconcileError`], [`RemoteError`], [`RunErrorKind`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, ReconcileError>`]:
//!
//! ```rust,no_run
//! use ccfsync::domain::Result;
//!
//! fn example() -> Result<()> {
//!     let config = ccfsync::config::load_config("ccfsync.toml")?;
//!     println!("{}", config.crm.base_url);
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod ids;
pub mod record;
pub mod result;

// Re-export commonly used types for convenience
pub use errors::{ReconcileError, RemoteError, RunErrorKind};
pub use ids::{Ccfid, RemoteId};
pub use record::{CanonicalField, CanonicalRecord, RawRow};
pub use result::Result;
