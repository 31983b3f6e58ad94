//! Logging and observability
//!
//! Structured logging via `tracing`, plus a handful of macros that keep the field
//! names of recurring events consistent across the pipeline.
//!
//! # Example
//!
//! ```no_run
//! use ccfsync::logging::init_logging;
//! use ccfsync::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!(source = "crl", "Loading rows");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, parse_log_level, LoggingGuard};

/// Log the start of a source run
///
/// # Example
///
/// ```no_run
/// use ccfsync::log_run_start;
///
/// log_run_start!("run-1", "crl", false);
/// ```
#[macro_export]
macro_rules! log_run_start {
    ($run_id:expr, $source:expr, $dry_run:expr) => {
        tracing::info!(
            run_id = %$run_id,
            source = %$source,
            dry_run = $dry_run,
            "Starting source run"
        );
    };
}

/// Log the completion of a source run
///
/// # Example
///
/// ```no_run
/// use ccfsync::log_run_complete;
/// use std::time::Duration;
///
/// log_run_complete!("crl", 12, 3, Duration::from_secs(4));
/// ```
#[macro_export]
macro_rules! log_run_complete {
    ($source:expr, $pushed:expr, $staged:expr, $duration:expr) => {
        tracing::info!(
            source = %$source,
            pushed = $pushed,
            staged = $staged,
            duration_ms = $duration.as_millis(),
            "Source run completed"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use ccfsync::log_error_with_context;
/// use ccfsync::domain::ReconcileError;
///
/// let error = ReconcileError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

/// Log progress through a chunked remote call
///
/// # Example
///
/// ```no_run
/// use ccfsync::log_batch_processing;
///
/// log_batch_processing!(100, 250);
/// ```
#[macro_export]
macro_rules! log_batch_processing {
    ($current:expr, $total:expr) => {
        tracing::debug!(
            current = $current,
            total = $total,
            progress_pct = ($current as f64 / ($total as f64).max(1.0) * 100.0),
            "Processing batch"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use ccfsync::log_retry_attempt;
///
/// log_retry_attempt!(2, 3, "Connection timeout");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            reason = %$reason,
            "Retrying operation"
        );
    };
}
