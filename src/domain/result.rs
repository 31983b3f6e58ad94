//! Crate-wide `Result` alias over [`ReconcileError`]

use super::errors::ReconcileError;

/// Result type alias for ccfsync operations
///
/// ```
/// use ccfsync::domain::{Ccfid, ReconcileError, Result};
///
/// fn parse(raw: &str) -> Result<Ccfid> {
///     Ccfid::new(raw).map_err(ReconcileError::Validation)
/// }
///
/// assert!(parse("0012345").is_ok());
/// assert!(parse("  ").is_err());
/// ```
pub type Result<T> = std::result::Result<T, ReconcileError>;
