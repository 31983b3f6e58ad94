//! Reconcile coordinator - main orchestrator for a reconciliation run
//!
//! Sources run one after another in the configured order. Each source moves
//! through `Loading → Normalizing → Filtering → {Staging, Pushing} → Done`;
//! a failure ends that source in `Done` with the error recorded and the next
//! source starts normally. There is no retry loop inside a run.

use crate::adapters::crm::RemoteSystem;
use crate::adapters::database::{StagingStore, Store};
use crate::adapters::feed::SourceFeed;
use crate::config::CcfsyncConfig;
use crate::core::classify::CompletenessClass;
use crate::core::normalize::{normalize, SourceKind};
use crate::core::run::context::RunContext;
use crate::core::run::summary::{RunError, RunState, RunSummary, SourceSummary};
use crate::core::sync::SyncPusher;
use crate::domain::ids::Ccfid;
use crate::domain::record::{CanonicalRecord, RawRow};
use crate::domain::{Result, RunErrorKind};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Reconcile coordinator
pub struct ReconcileCoordinator {
    config: CcfsyncConfig,
    remote: Arc<dyn RemoteSystem>,
    store: Arc<dyn Store>,
    feed: SourceFeed,
    dry_run: bool,
    shutdown: Option<watch::Receiver<bool>>,
}

/// Records left after filtering, split by completeness
#[derive(Debug, Default)]
struct Filtered {
    complete: Vec<CanonicalRecord>,
    incomplete: Vec<CanonicalRecord>,
}

impl ReconcileCoordinator {
    pub fn new(config: CcfsyncConfig, remote: Arc<dyn RemoteSystem>, store: Arc<dyn Store>) -> Self {
        let feed = SourceFeed::new(&config.sources.inbox_dir);
        let dry_run = config.application.dry_run;
        Self {
            config,
            remote,
            store,
            feed,
            dry_run,
            shutdown: None,
        }
    }

    /// Override the dry-run flag from configuration
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = self.dry_run || dry_run;
        self
    }

    /// Read rows from a different inbox
    pub fn with_feed(mut self, feed: SourceFeed) -> Self {
        self.feed = feed;
        self
    }

    /// Stop between sources once the signal flips to `true`
    pub fn with_shutdown_signal(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Reconcile the given sources in order
    ///
    /// # Errors
    ///
    /// Returns an error only when the run context cannot be prepared. Per-source
    /// failures are recorded in the summary.
    pub async fn run(&self, sources: &[SourceKind]) -> Result<RunSummary> {
        let started = Instant::now();
        let mut ctx = RunContext::prepare(
            &self.config,
            self.remote.clone(),
            self.store.clone(),
            self.dry_run,
        )
        .await?;

        let mut summary = RunSummary::new(ctx.run_id, self.dry_run);
        for &source in sources {
            if self.is_shutdown_requested() {
                tracing::warn!(
                    next_source = %source,
                    "Shutdown requested, skipping remaining sources"
                );
                break;
            }

            crate::log_run_start!(ctx.run_id, source, ctx.dry_run);
            let source_started = Instant::now();

            let mut source_summary = match self.feed.load(source).await {
                Ok(loaded) => {
                    let mut reconciled = self.reconcile_rows(&mut ctx, source, &loaded.rows).await;
                    reconciled.rows_loaded += loaded.malformed;
                    reconciled.skipped += loaded.malformed;
                    reconciled
                }
                Err(e) => {
                    tracing::error!(source = %source, error = %e, "Failed to load source");
                    let mut failed = SourceSummary::new(source);
                    failed.add_error(RunError::from(&e));
                    failed.final_state = RunState::Done;
                    failed
                }
            };
            source_summary.duration = source_started.elapsed();

            crate::log_run_complete!(
                source,
                source_summary.pushed,
                source_summary.staged,
                source_summary.duration
            );
            summary.sources.push(source_summary);
        }

        summary.duration = started.elapsed();
        Ok(summary)
    }

    /// Run one source from already-loaded rows
    pub async fn reconcile_rows(
        &self,
        ctx: &mut RunContext,
        source: SourceKind,
        rows: &[RawRow],
    ) -> SourceSummary {
        let mut summary = SourceSummary::new(source);
        summary.rows_loaded = rows.len();

        transition(&mut summary, RunState::Normalizing);
        let output = normalize(source, rows, &ctx.mapper);
        summary.skipped = output.skipped + output.duplicates_in_batch;

        self.reconcile_records(ctx, output.records, summary).await
    }

    /// Filter, stage and push canonical records
    ///
    /// Entry point for records that were normalized elsewhere; `summary`
    /// carries the counters gathered so far.
    pub async fn reconcile_records(
        &self,
        ctx: &mut RunContext,
        records: Vec<CanonicalRecord>,
        mut summary: SourceSummary,
    ) -> SourceSummary {
        let source = summary.source;
        summary.normalized = records.len();

        transition(&mut summary, RunState::Filtering);
        let filtered = filter(ctx, records, &mut summary);

        transition(&mut summary, RunState::Staging);
        self.stage(ctx, source, &filtered.incomplete, &mut summary).await;

        transition(&mut summary, RunState::Pushing);
        self.push(ctx, &filtered.complete, &mut summary).await;

        transition(&mut summary, RunState::Done);
        summary
    }

    async fn stage(
        &self,
        ctx: &mut RunContext,
        source: SourceKind,
        records: &[CanonicalRecord],
        summary: &mut SourceSummary,
    ) {
        if records.is_empty() {
            return;
        }
        let ccfids = ccfids_of(records);

        if ctx.dry_run {
            tracing::info!(source = %source, records = records.len(), "DRY RUN: would stage incomplete records");
            summary.staged = records.len();
            ctx.dedup.remember(&ccfids);
            return;
        }

        match ctx.store.insert_batch(source.as_str(), records).await {
            Ok(result) => {
                summary.staged = result.inserted;
                ctx.dedup.remember(&ccfids);
                tracing::info!(
                    source = %source,
                    inserted = result.inserted,
                    already_present = result.already_present,
                    "Staged incomplete records"
                );
            }
            Err(e) => {
                tracing::error!(source = %source, error = %e, "Staging batch rolled back");
                summary.add_error(RunError::from(&e).with_context("staging"));
            }
        }
    }

    async fn push(&self, ctx: &mut RunContext, records: &[CanonicalRecord], summary: &mut SourceSummary) {
        if records.is_empty() {
            return;
        }

        match ctx
            .reference
            .sync_new(
                records,
                ctx.remote.as_ref(),
                ctx.store.as_ref(),
                ctx.push_batch_size,
                ctx.dry_run,
            )
            .await
        {
            Ok(report) => summary.sites_created = report.created,
            Err(e) => {
                tracing::error!(
                    source = %summary.source,
                    error = %e,
                    "Collection site sync failed, skipping push for this source"
                );
                summary.add_error(RunError::from(&e).with_context("collection site sync"));
                return;
            }
        }

        let pusher = SyncPusher::new(
            ctx.remote.as_ref(),
            ctx.store.as_ref(),
            &ctx.reference,
            ctx.push_batch_size,
            ctx.dry_run,
        );
        let result = pusher.push(records).await;

        summary.lookup_misses = result.lookup_misses;
        summary.pushed = if ctx.dry_run {
            result.dry_run_skipped
        } else {
            result.accepted.len() + result.unconfirmed.len()
        };
        summary.rejected = result.rejected.len();
        summary.errors.extend(result.errors);
        for rejection in &result.rejected {
            if rejection.kind == RunErrorKind::RemoteRejection {
                summary.add_error(
                    RunError::new(rejection.kind, rejection.reason.clone())
                        .with_context(rejection.record.ccfid.clone()),
                );
            }
        }

        ctx.dedup.remember(&result.accepted);
        ctx.dedup.remember(&result.unconfirmed);
        if ctx.dry_run {
            ctx.dedup.remember(&ccfids_of(records));
        }
    }
}

fn transition(summary: &mut SourceSummary, next: RunState) {
    tracing::debug!(source = %summary.source, from = %summary.final_state, to = %next, "Run state");
    summary.final_state = next;
}

fn ccfids_of(records: &[CanonicalRecord]) -> Vec<Ccfid> {
    records
        .iter()
        .filter_map(|r| Ccfid::new(&r.ccfid).ok())
        .collect()
}

/// Drop known CCFIDs and split the rest by completeness
fn filter(ctx: &RunContext, records: Vec<CanonicalRecord>, summary: &mut SourceSummary) -> Filtered {
    let mut filtered = Filtered::default();
    for record in records {
        let Ok(ccfid) = Ccfid::new(&record.ccfid) else {
            summary.skipped += 1;
            continue;
        };
        if !ctx.dedup.is_new(&ccfid) {
            tracing::debug!(ccfid = %ccfid, "Already uploaded or pending review");
            summary.duplicates_skipped += 1;
            continue;
        }
        match ctx.rules.classify(&record) {
            CompletenessClass::Complete => filtered.complete.push(record),
            CompletenessClass::Incomplete => filtered.incomplete.push(record),
        }
    }
    summary.complete = filtered.complete.len();
    summary.incomplete = filtered.incomplete.len();
    filtered
}
