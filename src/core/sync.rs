//! Sync pusher
//!
//! Submits complete records to the CRM and confirms accepted CCFIDs into the
//! uploaded set. Confirmation is the only place a run grows that set.
//!
//! Record writes are never retried: a chunk that fails in transport is rejected
//! as a whole and stays eligible for the next run.

use crate::adapters::crm::{RemoteSystem, SubmitOutcome};
use crate::adapters::database::{Store, UploadedStore};
use crate::core::reference::{LookupKind, ReferenceCache};
use crate::core::run::summary::RunError;
use crate::domain::ids::Ccfid;
use crate::domain::record::{CanonicalField, CanonicalRecord};
use crate::domain::RunErrorKind;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Largest record-submission call the CRM accepts
pub const MAX_PUSH_CHUNK: usize = 100;

/// CRM field that carries the CCFID
const NAME_FIELD: &str = "Name";

/// A record the CRM did not accept
#[derive(Debug, Clone)]
pub struct Rejection {
    pub record: CanonicalRecord,
    pub reason: String,
    pub kind: RunErrorKind,
}

/// Outcome of pushing a batch
#[derive(Debug, Clone, Default)]
pub struct PushResult {
    /// Accepted by the CRM and confirmed locally
    pub accepted: Vec<Ccfid>,
    pub rejected: Vec<Rejection>,
    /// Accepted by the CRM but the local confirmation failed
    pub unconfirmed: Vec<Ccfid>,
    /// Lookup fields omitted because the reference id was unknown
    pub lookup_misses: usize,
    /// Records not sent because of a dry run
    pub dry_run_skipped: usize,
    pub errors: Vec<RunError>,
}

impl PushResult {
    pub fn is_accepted(&self, ccfid: &Ccfid) -> bool {
        self.accepted.contains(ccfid)
    }
}

/// A CRM payload and the lookups it could not resolve
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub body: Value,
    pub lookup_misses: usize,
}

/// Build the CRM payload for a record
///
/// The CCFID becomes `Name`; `CCFID`, `Code` and `Collection_Site_ID` are not
/// sent. Company, Collection_Site and Laboratory become `{"id": ...}` lookups
/// and are omitted when unresolved. Empty reasons and unset dates are omitted.
pub fn build_payload(record: &CanonicalRecord, reference: &ReferenceCache) -> Payload {
    let mut body = Map::new();
    let mut lookup_misses = 0;
    body.insert(NAME_FIELD.to_string(), Value::from(record.ccfid.trim()));

    let mut lookup = |body: &mut Map<String, Value>, field: CanonicalField, kind: LookupKind, key: &str| {
        let key = key.trim();
        if key.is_empty() {
            return;
        }
        match reference.resolve(kind, key) {
            Some(id) => {
                let mut target = Map::new();
                target.insert("id".to_string(), Value::from(id.as_str()));
                body.insert(field.api_name().to_string(), Value::Object(target));
            }
            None => {
                lookup_misses += 1;
                tracing::debug!(ccfid = %record.ccfid, field = %field, key, "Lookup miss, field omitted");
            }
        }
    };

    for field in CanonicalField::ALL {
        match field {
            CanonicalField::Ccfid | CanonicalField::Code | CanonicalField::CollectionSiteId => {}
            CanonicalField::Company => lookup(&mut body, field, LookupKind::Company, &record.code),
            CanonicalField::CollectionSite => lookup(
                &mut body,
                field,
                LookupKind::Site,
                &record.collection_site_id,
            ),
            CanonicalField::Laboratory => {
                lookup(&mut body, field, LookupKind::Laboratory, &record.laboratory)
            }
            CanonicalField::CollectionDate | CanonicalField::MroReceived => {
                if record.date(field).is_some() {
                    body.insert(field.api_name().to_string(), Value::from(record.display(field)));
                }
            }
            CanonicalField::TestReason if record.is_blank(field) => {}
            _ => {
                body.insert(field.api_name().to_string(), Value::from(record.display(field)));
            }
        }
    }

    Payload {
        body: Value::Object(body),
        lookup_misses,
    }
}

/// Short fingerprint used in place of donor identifiers in logs
pub fn fingerprint(value: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(value.trim().as_bytes()));
    digest[..12].to_string()
}

/// Payload with the donor identifier replaced by its fingerprint
fn loggable(payload: &Value) -> Value {
    let mut redacted = payload.clone();
    if let Some(primary) = redacted
        .get_mut(CanonicalField::PrimaryId.api_name())
        .filter(|v| v.is_string())
    {
        let print = fingerprint(primary.as_str().unwrap_or_default());
        *primary = Value::from(format!("sha256:{print}"));
    }
    redacted
}

/// Pushes complete records in chunks and confirms the accepted ones
pub struct SyncPusher<'a> {
    remote: &'a dyn RemoteSystem,
    store: &'a dyn Store,
    reference: &'a ReferenceCache,
    chunk_size: usize,
    dry_run: bool,
}

impl<'a> SyncPusher<'a> {
    pub fn new(
        remote: &'a dyn RemoteSystem,
        store: &'a dyn Store,
        reference: &'a ReferenceCache,
        chunk_size: usize,
        dry_run: bool,
    ) -> Self {
        Self {
            remote,
            store,
            reference,
            chunk_size: chunk_size.clamp(1, MAX_PUSH_CHUNK),
            dry_run,
        }
    }

    pub async fn push(&self, records: &[CanonicalRecord]) -> PushResult {
        let mut result = PushResult::default();
        if records.is_empty() {
            return result;
        }

        let payloads: Vec<Payload> = records
            .iter()
            .map(|r| build_payload(r, self.reference))
            .collect();
        result.lookup_misses = payloads.iter().map(|p| p.lookup_misses).sum();

        if self.dry_run {
            tracing::info!(records = records.len(), "DRY RUN: would push records to CRM");
            result.dry_run_skipped = records.len();
            return result;
        }

        let chunks = records.chunks(self.chunk_size).zip(payloads.chunks(self.chunk_size));
        let total_chunks = records.len().div_ceil(self.chunk_size);
        let mut auth_failure: Option<String> = None;

        for (index, (chunk, chunk_payloads)) in chunks.enumerate() {
            if let Some(reason) = &auth_failure {
                reject_all(&mut result, chunk, reason, RunErrorKind::RemoteAuthFailure);
                continue;
            }

            crate::log_batch_processing!(index + 1, total_chunks);
            let bodies: Vec<Value> = chunk_payloads.iter().map(|p| p.body.clone()).collect();

            let outcomes = match self.remote.submit_records(&bodies).await {
                Ok(outcomes) => outcomes,
                Err(e) => {
                    let kind = e.kind();
                    tracing::error!(
                        chunk = index + 1,
                        records = chunk.len(),
                        error = %e,
                        "Record submission failed; chunk left eligible for the next run"
                    );
                    result
                        .errors
                        .push(RunError::from(&e).with_context(format!("push chunk {}", index + 1)));
                    reject_all(&mut result, chunk, &e.to_string(), kind);
                    if kind == RunErrorKind::RemoteAuthFailure {
                        auth_failure = Some(e.to_string());
                    }
                    continue;
                }
            };

            let mut accepted = Vec::new();
            for (i, (record, payload)) in chunk.iter().zip(chunk_payloads).enumerate() {
                let outcome = outcomes
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| SubmitOutcome::Rejected("no outcome returned".to_string()));

                match (outcome, Ccfid::new(&record.ccfid)) {
                    (SubmitOutcome::Accepted(_), Ok(ccfid)) => accepted.push(ccfid),
                    (SubmitOutcome::Accepted(_), Err(e)) => {
                        // Unreachable after normalization, which drops blank CCFIDs
                        tracing::error!(error = %e, "CRM accepted a record without CCFID");
                    }
                    (SubmitOutcome::Rejected(reason), _) => {
                        tracing::warn!(
                            ccfid = %record.ccfid,
                            reason = %reason,
                            payload = %loggable(&payload.body),
                            "CRM rejected record"
                        );
                        result.rejected.push(Rejection {
                            record: record.clone(),
                            reason,
                            kind: RunErrorKind::RemoteRejection,
                        });
                    }
                }
            }

            self.confirm(accepted, &mut result).await;
        }

        result
    }

    async fn confirm(&self, accepted: Vec<Ccfid>, result: &mut PushResult) {
        if accepted.is_empty() {
            return;
        }
        match self.store.confirm_uploaded(&accepted).await {
            Ok(added) => {
                tracing::info!(
                    accepted = accepted.len(),
                    newly_recorded = added,
                    "Confirmed pushed records"
                );
                result.accepted.extend(accepted);
            }
            Err(e) => {
                let ccfids: Vec<&str> = accepted.iter().map(Ccfid::as_str).collect();
                tracing::error!(
                    count = accepted.len(),
                    ccfids = ?ccfids,
                    error = %e,
                    "Records accepted by the CRM could not be confirmed locally; run sync-uploaded"
                );
                result.errors.push(
                    RunError::from(&e).with_context("confirming accepted records"),
                );
                result.unconfirmed.extend(accepted);
            }
        }
    }
}

fn reject_all(result: &mut PushResult, chunk: &[CanonicalRecord], reason: &str, kind: RunErrorKind) {
    result.rejected.extend(chunk.iter().map(|record| Rejection {
        record: record.clone(),
        reason: reason.to_string(),
        kind,
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::crm::models::{
        AccountEntry, LabEntry, NewSite, ReferenceSnapshot, SiteCreateOutcome, SiteEntry,
    };
    use crate::adapters::database::MemoryStore;
    use crate::domain::ids::RemoteId;
    use crate::domain::{RemoteError, Result};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    fn rid(s: &str) -> RemoteId {
        RemoteId::parse(s).unwrap()
    }

    fn reference() -> ReferenceCache {
        ReferenceCache::from_parts(
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
                    site_id: "5501".into(),
                    name: "North".into(),
                    id: rid("zcrm_301"),
                }],
            },
            Vec::new(),
        )
    }

    fn record(ccfid: &str) -> CanonicalRecord {
        CanonicalRecord {
            company: "Acme Trucking LLC".into(),
            code: "A1001".into(),
            ccfid: ccfid.into(),
            first_name: "John".into(),
            last_name: "Smith".into(),
            primary_id: "999-00-1111".into(),
            collection_date: NaiveDate::from_ymd_opt(2025, 3, 14),
            test_reason: "Random".into(),
            test_result: "Negative".into(),
            test_type: "Lab Based Urine Test".into(),
            regulation: "DOT".into(),
            mro_received: NaiveDate::from_ymd_opt(2025, 3, 17),
            laboratory: "Quest Diagnostics".into(),
            collection_site: "North".into(),
            collection_site_id: "5501".into(),
            location: "None".into(),
        }
    }

    /// Remote that answers each submitted record by a per-CCFID script
    #[derive(Default)]
    struct ScriptedRemote {
        reject: Vec<String>,
        fail_with: Option<fn() -> RemoteError>,
        short_by: usize,
        calls: Mutex<Vec<Vec<Value>>>,
    }

    #[async_trait]
    impl RemoteSystem for ScriptedRemote {
        async fn fetch_reference(&self) -> Result<ReferenceSnapshot> {
            Ok(ReferenceSnapshot::default())
        }

        async fn create_sites(&self, _sites: &[NewSite]) -> Result<Vec<SiteCreateOutcome>> {
            Ok(Vec::new())
        }

        async fn submit_records(&self, payloads: &[Value]) -> Result<Vec<SubmitOutcome>> {
            self.calls.lock().unwrap().push(payloads.to_vec());
            if let Some(fail) = self.fail_with {
                return Err(fail().into());
            }
            let answered = payloads.len().saturating_sub(self.short_by);
            Ok(payloads[..answered]
                .iter()
                .map(|p| {
                    let name = p["Name"].as_str().unwrap_or_default().to_string();
                    if self.reject.contains(&name) {
                        SubmitOutcome::Rejected("INVALID_DATA: bad field".into())
                    } else {
                        SubmitOutcome::Accepted(Some(rid("9")))
                    }
                })
                .collect())
        }

        async fn fetch_uploaded_ccfids(&self) -> Result<Vec<Ccfid>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_payload_shape() {
        let payload = build_payload(&record("C-1"), &reference());
        let body = payload.body.as_object().unwrap();

        assert_eq!(payload.lookup_misses, 0);
        assert_eq!(body["Name"], "C-1");
        assert!(!body.contains_key("CCFID"));
        assert!(!body.contains_key("Code"));
        assert!(!body.contains_key("Collection_Site_ID"));
        assert_eq!(body["Company"]["id"], "101");
        assert_eq!(body["Laboratory"]["id"], "201");
        assert_eq!(body["Collection_Site"]["id"], "301");
        assert_eq!(body["Collection_Date"], "2025-03-14");
        assert_eq!(body["Test_Result"], "Negative");
    }

    #[test]
    fn test_payload_omits_unresolved_and_empty() {
        let mut r = record("C-2");
        r.code = "Z9999".into();
        r.laboratory = "Unknown Lab".into();
        r.test_reason.clear();
        r.mro_received = None;

        let payload = build_payload(&r, &reference());
        let body = payload.body.as_object().unwrap();
        assert_eq!(payload.lookup_misses, 2);
        assert!(!body.contains_key("Company"));
        assert!(!body.contains_key("Laboratory"));
        assert!(!body.contains_key("Test_Reason"));
        assert!(!body.contains_key("MRO_Received"));
        assert!(body.contains_key("Collection_Site"));
    }

    #[test]
    fn test_fingerprint_hides_identifier() {
        let print = fingerprint("999-00-1111");
        assert_eq!(print.len(), 12);
        assert_eq!(print, fingerprint(" 999-00-1111 "));
        let logged = loggable(&build_payload(&record("C-3"), &reference()).body);
        assert!(!logged.to_string().contains("999-00-1111"));
    }

    #[tokio::test]
    async fn test_accepted_records_are_confirmed() {
        let remote = ScriptedRemote {
            reject: vec!["B".into()],
            ..Default::default()
        };
        let store = MemoryStore::new();
        let cache = reference();
        let pusher = SyncPusher::new(&remote, &store, &cache, 2, false);

        let result = pusher.push(&[record("A"), record("B"), record("C")]).await;

        assert_eq!(result.accepted.len(), 2);
        assert_eq!(result.rejected.len(), 1);
        assert_eq!(result.rejected[0].record.ccfid, "B");
        assert_eq!(remote.calls.lock().unwrap().len(), 2);

        let uploaded = store.uploaded_ccfids().await.unwrap();
        assert!(uploaded.contains(&Ccfid::new("A").unwrap()));
        assert!(!uploaded.contains(&Ccfid::new("B").unwrap()));
    }

    #[tokio::test]
    async fn test_transport_failure_commits_nothing() {
        let remote = ScriptedRemote {
            fail_with: Some(|| RemoteError::TransportFailed("timeout".into())),
            ..Default::default()
        };
        let store = MemoryStore::new();
        let cache = reference();
        let pusher = SyncPusher::new(&remote, &store, &cache, 100, false);

        let result = pusher.push(&[record("A"), record("B")]).await;

        assert!(result.accepted.is_empty());
        assert_eq!(result.rejected.len(), 2);
        assert_eq!(result.rejected[0].kind, RunErrorKind::RemoteTransportFailure);
        assert!(store.uploaded_ccfids().await.unwrap().is_empty());
        assert_eq!(remote.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_auth_failure_stops_remaining_chunks() {
        let remote = ScriptedRemote {
            fail_with: Some(|| RemoteError::AuthenticationFailed("invalid_code".into())),
            ..Default::default()
        };
        let store = MemoryStore::new();
        let cache = reference();
        let pusher = SyncPusher::new(&remote, &store, &cache, 1, false);

        let result = pusher.push(&[record("A"), record("B"), record("C")]).await;

        assert_eq!(remote.calls.lock().unwrap().len(), 1);
        assert_eq!(result.rejected.len(), 3);
        assert!(result
            .rejected
            .iter()
            .all(|r| r.kind == RunErrorKind::RemoteAuthFailure));
    }

    #[tokio::test]
    async fn test_short_outcome_list_rejects_tail() {
        let remote = ScriptedRemote {
            short_by: 1,
            ..Default::default()
        };
        let store = MemoryStore::new();
        let cache = reference();
        let pusher = SyncPusher::new(&remote, &store, &cache, 100, false);

        let result = pusher.push(&[record("A"), record("B")]).await;
        assert_eq!(result.accepted, vec![Ccfid::new("A").unwrap()]);
        assert_eq!(result.rejected[0].reason, "no outcome returned");
    }

    #[tokio::test]
    async fn test_dry_run_sends_nothing() {
        let remote = ScriptedRemote::default();
        let store = MemoryStore::new();
        let cache = reference();
        let pusher = SyncPusher::new(&remote, &store, &cache, 100, true);

        let result = pusher.push(&[record("A")]).await;
        assert_eq!(result.dry_run_skipped, 1);
        assert!(remote.calls.lock().unwrap().is_empty());
        assert!(store.uploaded_ccfids().await.unwrap().is_empty());
    }
}
