//! Review service
//!
//! Backend of the review console. Incomplete records wait in staging until a
//! reviewer corrects them and resubmits, or dismisses them. A resubmission is
//! pushed through the same [`SyncPusher`] as a run, as a batch of one.

use crate::adapters::crm::RemoteSystem;
use crate::adapters::database::{StagedRecord, StagingStore, Store, UploadedStore};
use crate::config::CcfsyncConfig;
use crate::core::classify::{ClassifierRules, CompletenessClass};
use crate::core::normalize::{canon, normalize, SourceKind};
use crate::core::run::RunContext;
use crate::core::sync::SyncPusher;
use crate::domain::ids::Ccfid;
use crate::domain::record::{CanonicalField, CanonicalRecord, RawRow};
use crate::domain::{ReconcileError, Result};
use serde::Serialize;
use std::sync::Arc;

/// What happened to a resubmitted record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResubmitOutcome {
    /// Accepted by the CRM and recorded as uploaded
    Pushed,
    /// Still missing required fields; nothing was pushed
    StillIncomplete(Vec<CanonicalField>),
    /// The CRM already holds this CCFID; the row was retired
    AlreadyUploaded,
    /// Dry run: the record would have been pushed
    DryRun,
    /// Not accepted; the record is back on the worklist
    Rejected(String),
}

/// Counters from an ad-hoc upload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageUploadReport {
    pub rows: usize,
    pub normalized: usize,
    pub skipped: usize,
    /// Already uploaded or already pending review
    pub duplicates: usize,
    /// Complete records; these are left for the source feeds
    pub complete: usize,
    pub staged: usize,
    pub already_present: usize,
}

pub struct ReviewService {
    config: CcfsyncConfig,
    remote: Arc<dyn RemoteSystem>,
    store: Arc<dyn Store>,
    rules: ClassifierRules,
    dry_run: bool,
}

impl ReviewService {
    pub fn new(config: CcfsyncConfig, remote: Arc<dyn RemoteSystem>, store: Arc<dyn Store>) -> Self {
        let rules = ClassifierRules::from(&config.pipeline);
        let dry_run = config.application.dry_run;
        Self {
            config,
            remote,
            store,
            rules,
            dry_run,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = self.dry_run || dry_run;
        self
    }

    /// Unreviewed records ordered by CCFID
    pub async fn worklist(&self) -> Result<Vec<StagedRecord>> {
        self.store.list_unreviewed().await
    }

    pub async fn fetch(&self, ccfid: &Ccfid) -> Result<StagedRecord> {
        self.store
            .fetch(ccfid)
            .await?
            .ok_or_else(|| ReconcileError::NotFound(format!("no staged record {ccfid}")))
    }

    /// Fields still blank under the classifier rules
    pub fn missing_fields(&self, record: &CanonicalRecord) -> Vec<CanonicalField> {
        self.rules.missing_fields(record)
    }

    /// Apply corrections to an unreviewed record and persist them
    ///
    /// # Errors
    ///
    /// `Validation` when the record was already reviewed, a field is not
    /// editable, or a date does not parse. Nothing is written in that case.
    pub async fn apply_corrections(
        &self,
        ccfid: &Ccfid,
        corrections: &[(CanonicalField, String)],
    ) -> Result<StagedRecord> {
        let mut staged = self.fetch(ccfid).await?;
        if staged.reviewed {
            return Err(ReconcileError::Validation(format!(
                "record {ccfid} was already reviewed"
            )));
        }
        if corrections.is_empty() {
            return Ok(staged);
        }

        apply(&mut staged.record, corrections)?;
        if !self.dry_run {
            self.store.update_record(&staged.record).await?;
        }
        tracing::info!(
            ccfid = %ccfid,
            fields = ?corrections.iter().map(|(f, _)| f.api_name()).collect::<Vec<_>>(),
            dry_run = self.dry_run,
            "Applied review corrections"
        );
        Ok(staged)
    }

    /// Dismiss a record without pushing it
    pub async fn mark_reviewed(&self, ccfid: &Ccfid) -> Result<()> {
        let staged = self.fetch(ccfid).await?;
        if staged.reviewed {
            return Err(ReconcileError::Validation(format!(
                "record {ccfid} was already reviewed"
            )));
        }
        if self.dry_run {
            tracing::info!(ccfid = %ccfid, "DRY RUN: would dismiss staged record");
            return Ok(());
        }
        self.store.set_reviewed(ccfid, true).await?;
        tracing::info!(ccfid = %ccfid, "Staged record dismissed");
        Ok(())
    }

    /// Correct, reclassify and push one staged record
    ///
    /// The reviewed flag is set before the push and reverted when the CRM does
    /// not accept the record, so it returns to the worklist.
    pub async fn resubmit(
        &self,
        ccfid: &Ccfid,
        corrections: &[(CanonicalField, String)],
    ) -> Result<ResubmitOutcome> {
        let staged = self.apply_corrections(ccfid, corrections).await?;

        let missing = self.rules.missing_fields(&staged.record);
        if !missing.is_empty() {
            tracing::info!(
                ccfid = %ccfid,
                missing = ?missing.iter().map(|f| f.api_name()).collect::<Vec<_>>(),
                "Record still incomplete, not pushed"
            );
            return Ok(ResubmitOutcome::StillIncomplete(missing));
        }

        let mut ctx = self.prepare().await?;
        if ctx.dedup.is_uploaded(ccfid) {
            tracing::warn!(ccfid = %ccfid, "Record already in the CRM, retiring staged row");
            if !self.dry_run {
                self.store.confirm_uploaded(std::slice::from_ref(ccfid)).await?;
            }
            return Ok(ResubmitOutcome::AlreadyUploaded);
        }

        let records = [staged.record];
        ctx.reference
            .sync_new(
                &records,
                ctx.remote.as_ref(),
                ctx.store.as_ref(),
                ctx.push_batch_size,
                self.dry_run,
            )
            .await?;

        if self.dry_run {
            tracing::info!(ccfid = %ccfid, "DRY RUN: would push reviewed record");
            return Ok(ResubmitOutcome::DryRun);
        }

        self.store.set_reviewed(ccfid, true).await?;
        let pusher = SyncPusher::new(
            ctx.remote.as_ref(),
            ctx.store.as_ref(),
            &ctx.reference,
            1,
            false,
        );
        let result = pusher.push(&records).await;

        if result.accepted.contains(ccfid) || result.unconfirmed.contains(ccfid) {
            tracing::info!(ccfid = %ccfid, "Reviewed record pushed");
            return Ok(ResubmitOutcome::Pushed);
        }

        let reason = result
            .rejected
            .first()
            .map(|r| r.reason.clone())
            .unwrap_or_else(|| "no outcome returned".to_string());
        self.store.set_reviewed(ccfid, false).await?;
        tracing::warn!(ccfid = %ccfid, reason = %reason, "Reviewed record rejected, back on the worklist");
        Ok(ResubmitOutcome::Rejected(reason))
    }

    /// Normalize an ad-hoc upload and stage its incomplete, unseen records
    pub async fn stage_upload(&self, source: SourceKind, rows: &[RawRow]) -> Result<StageUploadReport> {
        let ctx = self.prepare().await?;
        let output = normalize(source, rows, &ctx.mapper);

        let mut report = StageUploadReport {
            rows: rows.len(),
            normalized: output.records.len(),
            skipped: output.skipped + output.duplicates_in_batch,
            ..StageUploadReport::default()
        };

        let mut incomplete = Vec::new();
        for record in output.records {
            let Ok(ccfid) = Ccfid::new(&record.ccfid) else {
                report.skipped += 1;
                continue;
            };
            if !ctx.dedup.is_new(&ccfid) {
                report.duplicates += 1;
                continue;
            }
            match self.rules.classify(&record) {
                CompletenessClass::Complete => report.complete += 1,
                CompletenessClass::Incomplete => incomplete.push(record),
            }
        }

        if incomplete.is_empty() {
            return Ok(report);
        }
        if self.dry_run {
            tracing::info!(source = %source, records = incomplete.len(), "DRY RUN: would stage uploaded records");
            report.staged = incomplete.len();
            return Ok(report);
        }

        let result = self.store.insert_batch(source.as_str(), &incomplete).await?;
        report.staged = result.inserted;
        report.already_present = result.already_present;
        tracing::info!(source = %source, staged = report.staged, "Staged uploaded records");
        Ok(report)
    }

    async fn prepare(&self) -> Result<RunContext> {
        RunContext::prepare(
            &self.config,
            self.remote.clone(),
            self.store.clone(),
            self.dry_run,
        )
        .await
    }
}

fn apply(record: &mut CanonicalRecord, corrections: &[(CanonicalField, String)]) -> Result<()> {
    for (field, value) in corrections {
        if !field.is_editable() {
            return Err(ReconcileError::Validation(format!("{field} cannot be edited")));
        }
        let value = value.trim();
        if field.is_date() {
            let date = if value.is_empty() {
                None
            } else {
                Some(canon::parse_date(value).ok_or_else(|| {
                    ReconcileError::Validation(format!("{field}: unrecognized date '{value}'"))
                })?)
            };
            record.set_date(*field, date).map_err(ReconcileError::Validation)?;
        } else {
            record.set_text(*field, value).map_err(ReconcileError::Validation)?;
        }
    }
    Ok(())
}
