//! Dedup authority
//!
//! One membership test over the uploaded set and the unreviewed staging keys,
//! snapshotted when a run starts. CCFIDs staged or confirmed during the run are
//! added to an in-memory delta so later sources in the same run see them too.

use crate::adapters::crm::RemoteSystem;
use crate::adapters::database::{StagingStore, Store, UploadedStore};
use crate::domain::ids::Ccfid;
use crate::domain::Result;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct DedupAuthority {
    uploaded: HashSet<Ccfid>,
    pending: HashSet<Ccfid>,
    delta: HashSet<Ccfid>,
}

impl DedupAuthority {
    pub fn new(uploaded: HashSet<Ccfid>, pending: HashSet<Ccfid>) -> Self {
        Self {
            uploaded,
            pending,
            delta: HashSet::new(),
        }
    }

    /// Take a fresh snapshot from the store
    pub async fn snapshot(store: &dyn Store) -> Result<Self> {
        let uploaded = store.uploaded_ccfids().await?;
        let pending = store.unreviewed_ccfids().await?;
        tracing::debug!(
            uploaded = uploaded.len(),
            pending = pending.len(),
            "Dedup snapshot taken"
        );
        Ok(Self::new(uploaded, pending))
    }

    /// True when the CCFID has been neither delivered nor staged
    pub fn is_new(&self, ccfid: &Ccfid) -> bool {
        !(self.uploaded.contains(ccfid) || self.pending.contains(ccfid) || self.delta.contains(ccfid))
    }

    pub fn is_uploaded(&self, ccfid: &Ccfid) -> bool {
        self.uploaded.contains(ccfid)
    }

    /// Remember CCFIDs that were staged or confirmed during this run
    pub fn remember<'a>(&mut self, ccfids: impl IntoIterator<Item = &'a Ccfid>) {
        self.delta.extend(ccfids.into_iter().cloned());
    }

    /// Number of CCFIDs known, snapshot and delta combined
    pub fn known(&self) -> usize {
        self.uploaded
            .union(&self.pending)
            .chain(self.delta.iter())
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Outcome of reconciling the local uploaded set with the CRM
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadedSyncReport {
    pub remote: usize,
    pub local: usize,
    /// CCFIDs present remotely but missing locally
    pub missing: usize,
    pub added: usize,
}

/// Add every CCFID the CRM holds but the uploaded set lacks
///
/// Recovers from pushes that were accepted remotely but never confirmed
/// locally. Matching unreviewed staging rows are retired in the same write.
pub async fn sync_uploaded(
    remote: &dyn RemoteSystem,
    store: &dyn Store,
    dry_run: bool,
) -> Result<UploadedSyncReport> {
    let remote_ccfids = remote.fetch_uploaded_ccfids().await?;
    let local = store.uploaded_ccfids().await?;

    let mut missing: Vec<Ccfid> = remote_ccfids
        .iter()
        .filter(|c| !local.contains(*c))
        .cloned()
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    missing.sort();

    let mut report = UploadedSyncReport {
        remote: remote_ccfids.len(),
        local: local.len(),
        missing: missing.len(),
        added: 0,
    };

    if missing.is_empty() {
        tracing::info!(remote = report.remote, local = report.local, "Uploaded set already in sync");
        return Ok(report);
    }
    if dry_run {
        tracing::info!(missing = report.missing, "DRY RUN: would add CCFIDs to the uploaded set");
        return Ok(report);
    }

    report.added = store.confirm_uploaded(&missing).await?;
    tracing::info!(
        remote = report.remote,
        local = report.local,
        added = report.added,
        "Uploaded set reconciled with the CRM"
    );
    Ok(report)
}
