//! Storage abstraction traits
//!
//! Three seams back the reconciliation core: the staging store for incomplete
//! records, the uploaded set, and the local collection-site table with its
//! pre-commit log. [`Store`] bundles them for callers that need all three.

use crate::adapters::crm::models::{NewSite, SiteEntry};
use crate::domain::ids::Ccfid;
use crate::domain::record::CanonicalRecord;
use crate::domain::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

/// A staging row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StagedRecord {
    pub record: CanonicalRecord,
    /// Source that produced the row (crl, i3screen, escreen)
    pub source: String,
    pub reviewed: bool,
    /// When the row was inserted
    pub uploaded_timestamp: DateTime<Utc>,
}

impl StagedRecord {
    pub fn ccfid(&self) -> &str {
        &self.record.ccfid
    }
}

/// Outcome of a staging batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageResult {
    /// Rows written
    pub inserted: usize,
    /// Rows skipped because the CCFID was already staged
    pub already_present: usize,
}

/// Durable holding area for incomplete records
#[async_trait]
pub trait StagingStore: Send + Sync {
    /// Insert a batch in one all-or-nothing transaction
    ///
    /// A CCFID already present (reviewed or not) is never re-inserted.
    async fn insert_batch(&self, source: &str, records: &[CanonicalRecord]) -> Result<StageResult>;

    /// CCFIDs of every unreviewed row
    async fn unreviewed_ccfids(&self) -> Result<HashSet<Ccfid>>;

    /// Unreviewed rows ordered by CCFID
    async fn list_unreviewed(&self) -> Result<Vec<StagedRecord>>;

    /// Fetch one row
    async fn fetch(&self, ccfid: &Ccfid) -> Result<Option<StagedRecord>>;

    /// Overwrite the canonical fields of an existing row
    async fn update_record(&self, record: &CanonicalRecord) -> Result<()>;

    /// Set or clear the reviewed flag
    async fn set_reviewed(&self, ccfid: &Ccfid, reviewed: bool) -> Result<()>;
}

/// Append-only set of CCFIDs confirmed by the CRM
#[async_trait]
pub trait UploadedStore: Send + Sync {
    async fn uploaded_ccfids(&self) -> Result<HashSet<Ccfid>>;

    /// Add CCFIDs and retire any unreviewed staging row for them, in one transaction
    ///
    /// Returns how many CCFIDs were new to the set.
    async fn confirm_uploaded(&self, ccfids: &[Ccfid]) -> Result<usize>;
}

/// Local collection-site mapping and its creation log
#[async_trait]
pub trait SiteStore: Send + Sync {
    /// Every locally known site with its CRM id
    async fn local_sites(&self) -> Result<Vec<SiteEntry>>;

    /// Record sites about to be created, in state `pending`
    async fn log_pending(&self, sites: &[NewSite]) -> Result<()>;

    /// Log entries still `pending`
    async fn pending_sites(&self) -> Result<Vec<NewSite>>;

    /// Persist site ids and mark their log entries `committed`, in one transaction
    async fn commit_sites(&self, sites: &[SiteEntry]) -> Result<()>;
}

/// All storage seams behind one object
pub trait Store: StagingStore + UploadedStore + SiteStore {}

impl<T: StagingStore + UploadedStore + SiteStore> Store for T {}
