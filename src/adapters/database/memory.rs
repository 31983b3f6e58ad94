//! In-memory store
//!
//! Implements every storage trait without a database, for unit and integration
//! tests. The transaction rules match the PostgreSQL store.

use super::traits::{SiteStore, StageResult, StagedRecord, StagingStore, UploadedStore};
use crate::adapters::crm::models::{NewSite, SiteEntry};
use crate::domain::ids::Ccfid;
use crate::domain::record::CanonicalRecord;
use crate::domain::{ReconcileError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogState {
    Pending,
    Committed,
}

#[derive(Debug, Default)]
struct MemoryState {
    staging: BTreeMap<Ccfid, StagedRecord>,
    uploaded: HashSet<Ccfid>,
    sites: BTreeMap<String, SiteEntry>,
    site_log: BTreeMap<String, (NewSite, LogState)>,
}

/// Store kept entirely in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_staging: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the uploaded set
    pub fn with_uploaded<I, S>(self, ccfids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Ok(mut state) = self.state.lock() {
            state
                .uploaded
                .extend(ccfids.into_iter().filter_map(|c| Ccfid::new(c).ok()));
        }
        self
    }

    /// Make every subsequent staging insert fail and roll back
    pub fn fail_staging_inserts(&self, fail: bool) {
        self.fail_staging.store(fail, Ordering::SeqCst);
    }

    /// Number of staging rows, reviewed or not
    pub fn staged_count(&self) -> usize {
        self.lock().map(|s| s.staging.len()).unwrap_or(0)
    }

    /// Whether a site log entry is still pending
    pub fn site_pending(&self, site_id: &str) -> bool {
        self.lock()
            .map(|s| matches!(s.site_log.get(site_id), Some((_, LogState::Pending))))
            .unwrap_or(false)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| ReconcileError::Database("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl StagingStore for MemoryStore {
    async fn insert_batch(&self, source: &str, records: &[CanonicalRecord]) -> Result<StageResult> {
        if self.fail_staging.load(Ordering::SeqCst) {
            return Err(ReconcileError::Staging(
                "injected staging failure, batch rolled back".to_string(),
            ));
        }

        let mut state = self.lock()?;

        // Validate the whole batch before touching state so a bad row rolls everything back
        let mut keyed = Vec::with_capacity(records.len());
        for record in records {
            let ccfid = Ccfid::new(&record.ccfid)
                .map_err(|e| ReconcileError::Staging(format!("{e}; batch rolled back")))?;
            keyed.push((ccfid, record));
        }

        let mut result = StageResult::default();
        let now = Utc::now();
        for (ccfid, record) in keyed {
            if state.staging.contains_key(&ccfid) {
                result.already_present += 1;
                continue;
            }
            state.staging.insert(
                ccfid,
                StagedRecord {
                    record: record.clone(),
                    source: source.to_string(),
                    reviewed: false,
                    uploaded_timestamp: now,
                },
            );
            result.inserted += 1;
        }
        Ok(result)
    }

    async fn unreviewed_ccfids(&self) -> Result<HashSet<Ccfid>> {
        let state = self.lock()?;
        Ok(state
            .staging
            .iter()
            .filter(|(_, row)| !row.reviewed)
            .map(|(ccfid, _)| ccfid.clone())
            .collect())
    }

    async fn list_unreviewed(&self) -> Result<Vec<StagedRecord>> {
        let state = self.lock()?;
        Ok(state
            .staging
            .values()
            .filter(|row| !row.reviewed)
            .cloned()
            .collect())
    }

    async fn fetch(&self, ccfid: &Ccfid) -> Result<Option<StagedRecord>> {
        Ok(self.lock()?.staging.get(ccfid).cloned())
    }

    async fn update_record(&self, record: &CanonicalRecord) -> Result<()> {
        let ccfid = Ccfid::new(&record.ccfid).map_err(ReconcileError::Validation)?;
        let mut state = self.lock()?;
        let row = state
            .staging
            .get_mut(&ccfid)
            .ok_or_else(|| ReconcileError::NotFound(format!("staged record {ccfid}")))?;
        row.record = record.clone();
        Ok(())
    }

    async fn set_reviewed(&self, ccfid: &Ccfid, reviewed: bool) -> Result<()> {
        let mut state = self.lock()?;
        let row = state
            .staging
            .get_mut(ccfid)
            .ok_or_else(|| ReconcileError::NotFound(format!("staged record {ccfid}")))?;
        row.reviewed = reviewed;
        Ok(())
    }
}

#[async_trait]
impl UploadedStore for MemoryStore {
    async fn uploaded_ccfids(&self) -> Result<HashSet<Ccfid>> {
        Ok(self.lock()?.uploaded.clone())
    }

    async fn confirm_uploaded(&self, ccfids: &[Ccfid]) -> Result<usize> {
        let mut state = self.lock()?;
        let mut added = 0;
        for ccfid in ccfids {
            if state.uploaded.insert(ccfid.clone()) {
                added += 1;
            }
            if let Some(row) = state.staging.get_mut(ccfid) {
                row.reviewed = true;
            }
        }
        Ok(added)
    }
}

#[async_trait]
impl SiteStore for MemoryStore {
    async fn local_sites(&self) -> Result<Vec<SiteEntry>> {
        Ok(self.lock()?.sites.values().cloned().collect())
    }

    async fn log_pending(&self, sites: &[NewSite]) -> Result<()> {
        let mut state = self.lock()?;
        for site in sites {
            state
                .site_log
                .entry(site.site_id.clone())
                .and_modify(|entry| {
                    if entry.1 == LogState::Pending {
                        entry.0 = site.clone();
                    }
                })
                .or_insert_with(|| (site.clone(), LogState::Pending));
        }
        Ok(())
    }

    async fn pending_sites(&self) -> Result<Vec<NewSite>> {
        let state = self.lock()?;
        Ok(state
            .site_log
            .values()
            .filter(|(_, s)| *s == LogState::Pending)
            .map(|(site, _)| site.clone())
            .collect())
    }

    async fn commit_sites(&self, sites: &[SiteEntry]) -> Result<()> {
        let mut state = self.lock()?;
        for site in sites {
            state.sites.insert(site.site_id.clone(), site.clone());
            let logged = NewSite {
                site_id: site.site_id.clone(),
                name: site.name.clone(),
            };
            state
                .site_log
                .entry(site.site_id.clone())
                .and_modify(|entry| entry.1 = LogState::Committed)
                .or_insert((logged, LogState::Committed));
        }
        Ok(())
    }
}
