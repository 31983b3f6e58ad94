//! Domain error types
//!
//! This module defines the error hierarchy for ccfsync. Errors are domain-specific
//! and don't expose third-party types; HTTP and database failures are carried as
//! messages so adapters can be swapped without touching callers.

use thiserror::Error;

/// Main ccfsync error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Remote CRM errors
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Database-related errors (connection, pool, query)
    #[error("Database error: {0}")]
    Database(String),

    /// Staging transaction failed and was rolled back
    #[error("Staging persistence error: {0}")]
    Staging(String),

    /// Raw source input could not be loaded
    #[error("Source load error: {0}")]
    Source(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Remote CRM errors
///
/// Errors that occur when talking to the CRM REST API or its OAuth endpoint.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Token refresh failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The call itself failed (DNS, TLS, timeout, connection reset)
    #[error("Transport failure: {0}")]
    TransportFailed(String),

    /// Response body did not have the expected shape
    #[error("Invalid response from CRM: {0}")]
    InvalidResponse(String),

    /// Server error (5xx)
    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    /// Client error (4xx)
    #[error("Client error: {status} - {message}")]
    ClientError { status: u16, message: String },

    /// Business rejection of a single record
    #[error("Record rejected: {0}")]
    Rejected(String),
}

impl RemoteError {
    /// Build the error for a non-success HTTP status
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => RemoteError::AuthenticationFailed(format!("{status}: {message}")),
            500..=599 => RemoteError::ServerError { status, message },
            _ => RemoteError::ClientError { status, message },
        }
    }

    /// Whether a read may be retried after this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RemoteError::TransportFailed(_) | RemoteError::ServerError { .. }
        ) || matches!(self, RemoteError::ClientError { status: 429, .. })
    }
}

/// Error taxonomy used by run summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunErrorKind {
    /// Malformed raw row, dropped before canonical form
    ValidationSkip,
    /// Reference id could not be resolved; field omitted
    LookupMiss,
    /// Token refresh failed
    RemoteAuthFailure,
    /// Network/HTTP failure during push or site creation
    RemoteTransportFailure,
    /// Per-record business rejection
    RemoteRejection,
    /// Local staging transaction rolled back
    StagingPersistenceFailure,
    /// Raw input for a source could not be read
    SourceLoadFailure,
    /// Anything else (database connectivity, configuration)
    Other,
}

impl ReconcileError {
    /// Classify this error for run summaries
    pub fn kind(&self) -> RunErrorKind {
        match self {
            ReconcileError::Remote(RemoteError::AuthenticationFailed(_)) => {
                RunErrorKind::RemoteAuthFailure
            }
            ReconcileError::Remote(RemoteError::Rejected(_)) => RunErrorKind::RemoteRejection,
            ReconcileError::Remote(_) => RunErrorKind::RemoteTransportFailure,
            ReconcileError::Staging(_) => RunErrorKind::StagingPersistenceFailure,
            ReconcileError::Source(_) | ReconcileError::Io(_) => RunErrorKind::SourceLoadFailure,
            ReconcileError::Validation(_) => RunErrorKind::ValidationSkip,
            _ => RunErrorKind::Other,
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for ReconcileError {
    fn from(err: std::io::Error) -> Self {
        ReconcileError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for ReconcileError {
    fn from(err: serde_json::Error) -> Self {
        ReconcileError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for ReconcileError {
    fn from(err: toml::de::Error) -> Self {
        ReconcileError::Configuration(format!("TOML parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconcile_error_display() {
        let err = ReconcileError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");
    }

    #[test]
    fn test_remote_error_conversion() {
        let remote_err = RemoteError::TransportFailed("connection reset".to_string());
        let err: ReconcileError = remote_err.into();
        assert!(matches!(err, ReconcileError::Remote(_)));
        assert_eq!(err.kind(), RunErrorKind::RemoteTransportFailure);
    }

    #[test]
    fn test_from_status_classification() {
        assert!(matches!(
            RemoteError::from_status(401, "expired"),
            RemoteError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            RemoteError::from_status(502, "bad gateway"),
            RemoteError::ServerError { status: 502, .. }
        ));
        assert!(matches!(
            RemoteError::from_status(400, "bad"),
            RemoteError::ClientError { status: 400, .. }
        ));
    }

    #[test]
    fn test_retryable() {
        assert!(RemoteError::TransportFailed("timeout".into()).is_retryable());
        assert!(RemoteError::from_status(503, "busy").is_retryable());
        assert!(RemoteError::from_status(429, "slow down").is_retryable());
        assert!(!RemoteError::from_status(400, "bad").is_retryable());
        assert!(!RemoteError::AuthenticationFailed("no".into()).is_retryable());
    }

    #[test]
    fn test_error_kinds() {
        let auth: ReconcileError = RemoteError::AuthenticationFailed("bad token".into()).into();
        assert_eq!(auth.kind(), RunErrorKind::RemoteAuthFailure);

        let staging = ReconcileError::Staging("rollback".into());
        assert_eq!(staging.kind(), RunErrorKind::StagingPersistenceFailure);

        let source = ReconcileError::Source("missing file".into());
        assert_eq!(source.kind(), RunErrorKind::SourceLoadFailure);

        let db = ReconcileError::Database("pool".into());
        assert_eq!(db.kind(), RunErrorKind::Other);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: ReconcileError = io_err.into();
        assert!(matches!(err, ReconcileError::Io(_)));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: ReconcileError = json_err.into();
        assert!(matches!(err, ReconcileError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: ReconcileError = toml_err.into();
        assert!(matches!(err, ReconcileError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }
}
