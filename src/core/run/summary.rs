//! Run summary and reporting
//!
//! Per-source counters, the state each source run ended in, and the errors it
//! recorded.

use crate::core::normalize::SourceKind;
use crate::domain::{ReconcileError, RunErrorKind};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// States of a per-source run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Loading,
    Normalizing,
    Filtering,
    Staging,
    Pushing,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Loading => "loading",
            RunState::Normalizing => "normalizing",
            RunState::Filtering => "filtering",
            RunState::Staging => "staging",
            RunState::Pushing => "pushing",
            RunState::Done => "done",
        };
        f.write_str(name)
    }
}

/// An error recorded during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunError {
    pub kind: RunErrorKind,
    pub message: String,
    /// Optional context (CCFID, site id, phase)
    pub context: Option<String>,
}

impl RunError {
    pub fn new(kind: RunErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl From<&ReconcileError> for RunError {
    fn from(err: &ReconcileError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

/// Summary of one source's run
#[derive(Debug, Clone)]
pub struct SourceSummary {
    pub source: SourceKind,
    pub rows_loaded: usize,
    pub normalized: usize,
    /// Rows dropped by pre-filters, blank CCFIDs and in-batch duplicates
    pub skipped: usize,
    pub complete: usize,
    pub incomplete: usize,
    /// Records already uploaded or already pending review
    pub duplicates_skipped: usize,
    pub staged: usize,
    pub pushed: usize,
    pub rejected: usize,
    pub lookup_misses: usize,
    pub sites_created: usize,
    pub final_state: RunState,
    pub duration: Duration,
    pub errors: Vec<RunError>,
}

impl SourceSummary {
    pub fn new(source: SourceKind) -> Self {
        Self {
            source,
            rows_loaded: 0,
            normalized: 0,
            skipped: 0,
            complete: 0,
            incomplete: 0,
            duplicates_skipped: 0,
            staged: 0,
            pushed: 0,
            rejected: 0,
            lookup_misses: 0,
            sites_created: 0,
            final_state: RunState::Loading,
            duration: Duration::ZERO,
            errors: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: RunError) {
        self.errors.push(error);
    }

    /// Errors of one kind
    pub fn errors_of(&self, kind: RunErrorKind) -> usize {
        self.errors.iter().filter(|e| e.kind == kind).count()
    }

    /// Whether the source could not be loaded at all
    pub fn load_failed(&self) -> bool {
        self.errors_of(RunErrorKind::SourceLoadFailure) > 0
    }

    pub fn is_successful(&self) -> bool {
        self.errors.is_empty() && self.rejected == 0
    }

    pub fn log_summary(&self) {
        tracing::info!(
            source = %self.source,
            state = %self.final_state,
            rows = self.rows_loaded,
            normalized = self.normalized,
            skipped = self.skipped,
            complete = self.complete,
            incomplete = self.incomplete,
            duplicates_skipped = self.duplicates_skipped,
            staged = self.staged,
            pushed = self.pushed,
            rejected = self.rejected,
            lookup_misses = self.lookup_misses,
            sites_created = self.sites_created,
            duration_ms = self.duration.as_millis() as u64,
            "Source run completed"
        );

        for error in &self.errors {
            tracing::warn!(
                source = %self.source,
                error_type = ?error.kind,
                message = %error.message,
                context = error.context.as_deref().unwrap_or(""),
                "Source run error"
            );
        }
    }
}

/// Summary of a whole reconciliation run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub dry_run: bool,
    pub sources: Vec<SourceSummary>,
    pub duration: Duration,
    /// Errors outside any single source (reference refresh, dedup snapshot)
    pub errors: Vec<RunError>,
}

impl RunSummary {
    pub fn new(run_id: Uuid, dry_run: bool) -> Self {
        Self {
            run_id,
            dry_run,
            sources: Vec::new(),
            duration: Duration::ZERO,
            errors: Vec::new(),
        }
    }

    pub fn total_pushed(&self) -> usize {
        self.sources.iter().map(|s| s.pushed).sum()
    }

    pub fn total_staged(&self) -> usize {
        self.sources.iter().map(|s| s.staged).sum()
    }

    pub fn total_rejected(&self) -> usize {
        self.sources.iter().map(|s| s.rejected).sum()
    }

    pub fn is_successful(&self) -> bool {
        self.errors.is_empty() && self.sources.iter().all(SourceSummary::is_successful)
    }

    pub fn log_summary(&self) {
        for source in &self.sources {
            source.log_summary();
        }
        tracing::info!(
            run_id = %self.run_id,
            dry_run = self.dry_run,
            sources = self.sources.len(),
            pushed = self.total_pushed(),
            staged = self.total_staged(),
            rejected = self.total_rejected(),
            duration_secs = self.duration.as_secs(),
            "Reconciliation run completed"
        );
        for error in &self.errors {
            tracing::warn!(error_type = ?error.kind, message = %error.message, "Run error");
        }
    }
}
