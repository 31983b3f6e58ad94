//! Reconciliation runs
//!
//! [`ReconcileCoordinator`] drives every configured source through
//! normalization, filtering, staging and pushing against one shared
//! [`RunContext`], and reports a [`RunSummary`].

pub mod context;
pub mod coordinator;
pub mod summary;

pub use context::RunContext;
pub use coordinator::ReconcileCoordinator;
pub use summary::{RunError, RunState, RunSummary, SourceSummary};
