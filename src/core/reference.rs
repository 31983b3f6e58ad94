//! Reference cache
//!
//! Read-only snapshots of the CRM account and laboratory tables plus the
//! collection-site mapping, which merges the local site table with the remote
//! list and can grow through [`ReferenceCache::sync_new`].
//!
//! Site creation is not atomic across the CRM and the local database, so every
//! site is written to a pre-commit log as `pending` before it is created and
//! marked `committed` once its remote id is stored. A refresh adopts pending
//! entries that turn out to exist remotely; the rest are retried by the next
//! sync.

use crate::adapters::crm::models::{AccountEntry, NewSite, ReferenceSnapshot, SiteEntry};
use crate::adapters::crm::RemoteSystem;
use crate::adapters::database::{SiteStore, Store};
use crate::domain::ids::RemoteId;
use crate::domain::record::CanonicalRecord;
use crate::domain::Result;
use std::collections::{HashMap, HashSet};

/// Largest site-create call the CRM accepts
pub const MAX_SITE_CHUNK: usize = 100;

/// Which lookup table to consult
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    /// Keyed by account code
    Company,
    /// Keyed by laboratory name
    Laboratory,
    /// Keyed by collection site id
    Site,
}

/// What a site sync did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteSyncReport {
    pub created: usize,
    pub rejected: usize,
    /// Unseen sites not created because of a dry run
    pub skipped: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceCache {
    accounts: Vec<AccountEntry>,
    companies: HashMap<String, RemoteId>,
    laboratories: HashMap<String, RemoteId>,
    sites: HashMap<String, RemoteId>,
}

fn lab_key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl ReferenceCache {
    /// Build from a remote snapshot and the local site table
    ///
    /// Remote site ids win over local ones when both know a site.
    pub fn from_parts(snapshot: ReferenceSnapshot, local_sites: Vec<SiteEntry>) -> Self {
        let companies = snapshot
            .accounts
            .iter()
            .map(|a| (a.code.trim().to_string(), a.id.clone()))
            .collect();
        let laboratories = snapshot
            .laboratories
            .iter()
            .map(|l| (lab_key(&l.name), l.id.clone()))
            .collect();
        let sites = local_sites
            .into_iter()
            .chain(snapshot.sites)
            .map(|s| (s.site_id.trim().to_string(), s.id))
            .collect();

        Self {
            accounts: snapshot.accounts,
            companies,
            laboratories,
            sites,
        }
    }

    /// Refresh everything from the CRM and adopt pending site-log entries
    pub async fn refresh(remote: &dyn RemoteSystem, store: &dyn Store) -> Result<Self> {
        let snapshot = remote.fetch_reference().await?;
        let local_sites = store.local_sites().await?;
        let pending = store.pending_sites().await?;

        if !pending.is_empty() {
            let remote_sites: HashMap<&str, &SiteEntry> = snapshot
                .sites
                .iter()
                .map(|s| (s.site_id.as_str(), s))
                .collect();
            let adopted: Vec<SiteEntry> = pending
                .iter()
                .filter_map(|p| remote_sites.get(p.site_id.as_str()).map(|s| (*s).clone()))
                .collect();

            if !adopted.is_empty() {
                store.commit_sites(&adopted).await?;
                tracing::info!(
                    adopted = adopted.len(),
                    "Adopted pending collection sites found in the CRM"
                );
            }
            let still_pending = pending.len() - adopted.len();
            if still_pending > 0 {
                tracing::warn!(
                    pending = still_pending,
                    "Collection sites still pending creation"
                );
            }
        }

        Ok(Self::from_parts(snapshot, local_sites))
    }

    pub fn resolve(&self, kind: LookupKind, key: &str) -> Option<&RemoteId> {
        match kind {
            LookupKind::Company => self.companies.get(key.trim()),
            LookupKind::Laboratory => self.laboratories.get(&lab_key(key)),
            LookupKind::Site => self.sites.get(key.trim()),
        }
    }

    /// Account rows, for mapper lookups
    pub fn accounts(&self) -> &[AccountEntry] {
        &self.accounts
    }

    pub fn site_count(&self) -> usize {
        self.sites.len()
    }

    /// Sites named by `records` that are not mapped yet, first name wins
    pub fn unseen_sites(&self, records: &[CanonicalRecord]) -> Vec<NewSite> {
        let mut seen = HashSet::new();
        records
            .iter()
            .filter_map(CanonicalRecord::site)
            .filter(|(site_id, _)| !self.sites.contains_key(*site_id))
            .filter(|(site_id, _)| seen.insert(site_id.to_string()))
            .map(|(site_id, name)| NewSite {
                site_id: site_id.to_string(),
                name: name.to_string(),
            })
            .collect()
    }

    /// Create every unseen collection site and cache the new ids
    ///
    /// A transport failure stops at the failing chunk and returns the error;
    /// earlier chunks stay committed and later ones stay pending.
    pub async fn sync_new(
        &mut self,
        records: &[CanonicalRecord],
        remote: &dyn RemoteSystem,
        store: &dyn Store,
        chunk_size: usize,
        dry_run: bool,
    ) -> Result<SiteSyncReport> {
        let unseen = self.unseen_sites(records);
        let mut report = SiteSyncReport::default();
        if unseen.is_empty() {
            return Ok(report);
        }

        if dry_run {
            tracing::info!(sites = unseen.len(), "DRY RUN: would create collection sites");
            report.skipped = unseen.len();
            return Ok(report);
        }

        store.log_pending(&unseen).await?;

        let chunk_size = chunk_size.clamp(1, MAX_SITE_CHUNK);
        for chunk in unseen.chunks(chunk_size) {
            let outcomes = remote.create_sites(chunk).await?;

            let mut created = Vec::new();
            let mut rejected = 0;
            for (site, outcome) in chunk.iter().zip(outcomes) {
                match outcome.result {
                    Ok(id) => created.push(SiteEntry {
                        site_id: site.site_id.clone(),
                        name: site.name.clone(),
                        id,
                    }),
                    Err(reason) => {
                        rejected += 1;
                        tracing::warn!(
                            site_id = %site.site_id,
                            name = %site.name,
                            reason = %reason,
                            "CRM rejected collection site"
                        );
                    }
                }
            }
            // A short outcome list leaves the tail pending
            let unanswered = chunk.len() - created.len() - rejected;
            if unanswered > 0 {
                tracing::warn!(unanswered, "CRM returned fewer site outcomes than requested");
            }
            report.rejected += rejected + unanswered;

            store.commit_sites(&created).await?;
            report.created += created.len();
            for site in created {
                self.sites.insert(site.site_id, site.id);
            }
        }

        tracing::info!(
            created = report.created,
            rejected = report.rejected,
            "Collection site sync complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::crm::models::{LabEntry, SiteCreateOutcome, SubmitOutcome};
    use crate::adapters::database::MemoryStore;
    use crate::domain::ids::Ccfid;
    use crate::domain::{ReconcileError, RemoteError};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex;

    fn rid(s: &str) -> RemoteId {
        RemoteId::parse(s).unwrap()
    }

    #[derive(Default)]
    struct FakeRemote {
        snapshot: ReferenceSnapshot,
        fail_create: bool,
        reject: Vec<String>,
        create_calls: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl RemoteSystem for FakeRemote {
        async fn fetch_reference(&self) -> Result<ReferenceSnapshot> {
            Ok(self.snapshot.clone())
        }

        async fn create_sites(&self, sites: &[NewSite]) -> Result<Vec<SiteCreateOutcome>> {
            self.create_calls.lock().unwrap().push(sites.len());
            if self.fail_create {
                return Err(RemoteError::TransportFailed("connection reset".into()).into());
            }
            Ok(sites
                .iter()
                .enumerate()
                .map(|(i, s)| SiteCreateOutcome {
                    site_id: s.site_id.clone(),
                    result: if self.reject.contains(&s.site_id) {
                        Err("DUPLICATE_DATA".into())
                    } else {
                        Ok(rid(&format!("9{i}")))
                    },
                })
                .collect())
        }

        async fn submit_records(&self, _payloads: &[Value]) -> Result<Vec<SubmitOutcome>> {
            Ok(Vec::new())
        }

        async fn fetch_uploaded_ccfids(&self) -> Result<Vec<Ccfid>> {
            Ok(Vec::new())
        }
    }

    fn with_site(ccfid: &str, site_id: &str, name: &str) -> CanonicalRecord {
        CanonicalRecord {
            ccfid: ccfid.into(),
            collection_site_id: site_id.into(),
            collection_site: name.into(),
            ..Default::default()
        }
    }

    fn snapshot() -> ReferenceSnapshot {
        ReferenceSnapshot {
            accounts: vec![AccountEntry {
                code: "A1001".into(),
                id: rid("101"),
                name: "Acme".into(),
                i3_code: None,
            }],
            laboratories: vec![LabEntry {
                name: "Quest Diagnostics".into(),
                id: rid("201"),
            }],
            sites: vec![SiteEntry {
                site_id: "S1".into(),
                name: "North".into(),
                id: rid("301"),
            }],
        }
    }

    #[test]
    fn test_resolve_each_kind() {
        let cache = ReferenceCache::from_parts(snapshot(), Vec::new());
        assert_eq!(cache.resolve(LookupKind::Company, "A1001"), Some(&rid("101")));
        assert_eq!(
            cache.resolve(LookupKind::Laboratory, "quest diagnostics "),
            Some(&rid("201"))
        );
        assert_eq!(cache.resolve(LookupKind::Site, "S1"), Some(&rid("301")));
        assert_eq!(cache.resolve(LookupKind::Company, "B9"), None);
    }

    #[test]
    fn test_unseen_sites_are_unique() {
        let cache = ReferenceCache::from_parts(snapshot(), Vec::new());
        let unseen = cache.unseen_sites(&[
            with_site("1", "S1", "North"),
            with_site("2", "S2", "South"),
            with_site("3", "S2", "South Again"),
            with_site("4", "", ""),
        ]);
        assert_eq!(
            unseen,
            vec![NewSite {
                site_id: "S2".into(),
                name: "South".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_sync_new_creates_in_chunks_and_commits() {
        let remote = FakeRemote {
            snapshot: snapshot(),
            reject: vec!["S4".into()],
            ..Default::default()
        };
        let store = MemoryStore::new();
        let mut cache = ReferenceCache::refresh(&remote, &store).await.unwrap();

        let records: Vec<CanonicalRecord> = ["S2", "S3", "S4"]
            .iter()
            .enumerate()
            .map(|(i, s)| with_site(&i.to_string(), s, "Site"))
            .collect();
        let report = cache
            .sync_new(&records, &remote, &store, 2, false)
            .await
            .unwrap();

        assert_eq!(report.created, 2);
        assert_eq!(report.rejected, 1);
        assert_eq!(*remote.create_calls.lock().unwrap(), vec![2, 1]);
        assert!(cache.resolve(LookupKind::Site, "S2").is_some());
        assert!(cache.resolve(LookupKind::Site, "S4").is_none());
        assert!(!store.site_pending("S2"));
        assert!(store.site_pending("S4"));
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_entries_pending() {
        let remote = FakeRemote {
            snapshot: snapshot(),
            fail_create: true,
            ..Default::default()
        };
        let store = MemoryStore::new();
        let mut cache = ReferenceCache::refresh(&remote, &store).await.unwrap();

        let err = cache
            .sync_new(&[with_site("1", "S9", "New")], &remote, &store, 100, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Remote(_)));
        assert!(store.site_pending("S9"));
        assert!(cache.resolve(LookupKind::Site, "S9").is_none());
    }

    #[tokio::test]
    async fn test_refresh_adopts_pending_sites_present_remotely() {
        let store = MemoryStore::new();
        store
            .log_pending(&[
                NewSite {
                    site_id: "S1".into(),
                    name: "North".into(),
                },
                NewSite {
                    site_id: "S7".into(),
                    name: "Lost".into(),
                },
            ])
            .await
            .unwrap();

        let remote = FakeRemote {
            snapshot: snapshot(),
            ..Default::default()
        };
        let cache = ReferenceCache::refresh(&remote, &store).await.unwrap();

        assert!(!store.site_pending("S1"));
        assert!(store.site_pending("S7"));
        assert_eq!(store.local_sites().await.unwrap().len(), 1);
        assert!(cache.resolve(LookupKind::Site, "S1").is_some());
    }

    #[tokio::test]
    async fn test_dry_run_creates_nothing() {
        let remote = FakeRemote {
            snapshot: snapshot(),
            ..Default::default()
        };
        let store = MemoryStore::new();
        let mut cache = ReferenceCache::refresh(&remote, &store).await.unwrap();

        let report = cache
            .sync_new(&[with_site("1", "S9", "New")], &remote, &store, 100, true)
            .await
            .unwrap();
        assert_eq!(report.skipped, 1);
        assert!(remote.create_calls.lock().unwrap().is_empty());
        assert!(!store.site_pending("S9"));
    }
}
