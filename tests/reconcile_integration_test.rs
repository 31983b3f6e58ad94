//! End-to-end reconciliation runs against an in-memory store and a fake CRM

use async_trait::async_trait;
use ccfsync::adapters::crm::{
    AccountEntry, LabEntry, NewSite, ReferenceSnapshot, RemoteSystem, SiteCreateOutcome,
    SiteEntry, SubmitOutcome,
};
use ccfsync::adapters::database::{MemoryStore, StagingStore, UploadedStore};
use ccfsync::adapters::feed::SourceFeed;
use ccfsync::config::CcfsyncConfig;
use ccfsync::core::dedup::sync_uploaded;
use ccfsync::core::normalize::SourceKind;
use ccfsync::core::run::{ReconcileCoordinator, RunContext, RunState, SourceSummary};
use ccfsync::domain::{
    CanonicalRecord, Ccfid, ReconcileError, RemoteError, RemoteId, Result, RunErrorKind,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn rid(s: &str) -> RemoteId {
    RemoteId::parse(s).unwrap()
}

fn ccfid(s: &str) -> Ccfid {
    Ccfid::new(s).unwrap()
}

fn config() -> CcfsyncConfig {
    toml::from_str(
        r#"
        [crm]
        base_url = "https://crm.test"
        client_id = "client"
        client_secret = "secret"
        refresh_token = "refresh"

        [postgresql]
        connection_string = "postgres://localhost/ccfsync"
        "#,
    )
    .unwrap()
}

/// CRM stand-in that records every write
#[derive(Default)]
struct FakeCrm {
    fail_submit: AtomicBool,
    submitted: Mutex<Vec<Value>>,
    created_sites: Mutex<Vec<NewSite>>,
    uploaded: Mutex<Vec<String>>,
}

impl FakeCrm {
    fn submitted_names(&self) -> Vec<String> {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .filter_map(|p| p["Name"].as_str().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl RemoteSystem for FakeCrm {
    async fn fetch_reference(&self) -> Result<ReferenceSnapshot> {
        Ok(ReferenceSnapshot {
            accounts: vec![AccountEntry {
                code: "A1001".into(),
                id: rid("101"),
                name: "Acme Trucking LLC".into(),
                i3_code: None,
            }],
            laboratories: vec![LabEntry {
                name: "Quest Diagnostics".into(),
                id: rid("201"),
            }],
            sites: vec![SiteEntry {
                site_id: "5501".into(),
                name: "North Side Clinic".into(),
                id: rid("301"),
            }],
        })
    }

    async fn create_sites(&self, sites: &[NewSite]) -> Result<Vec<SiteCreateOutcome>> {
        let mut created = self.created_sites.lock().unwrap();
        let outcomes = sites
            .iter()
            .enumerate()
            .map(|(i, site)| SiteCreateOutcome {
                site_id: site.site_id.clone(),
                result: Ok(rid(&format!("{}", 400 + created.len() + i))),
            })
            .collect();
        created.extend(sites.iter().cloned());
        Ok(outcomes)
    }

    async fn submit_records(&self, payloads: &[Value]) -> Result<Vec<SubmitOutcome>> {
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(ReconcileError::Remote(RemoteError::TransportFailed(
                "connection reset".into(),
            )));
        }
        self.submitted.lock().unwrap().extend(payloads.iter().cloned());
        let mut uploaded = self.uploaded.lock().unwrap();
        Ok(payloads
            .iter()
            .map(|p| {
                uploaded.push(p["Name"].as_str().unwrap_or_default().to_string());
                SubmitOutcome::Accepted(Some(rid("900")))
            })
            .collect())
    }

    async fn fetch_uploaded_ccfids(&self) -> Result<Vec<Ccfid>> {
        Ok(self.uploaded.lock().unwrap().iter().map(|s| ccfid(s)).collect())
    }
}

fn complete(id: &str) -> CanonicalRecord {
    CanonicalRecord {
        company: "Acme Trucking LLC".into(),
        code: "A1001".into(),
        ccfid: id.into(),
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
        collection_site: "North Side Clinic".into(),
        collection_site_id: "5501".into(),
        location: "None".into(),
    }
}

/// Raw CRL export row; an empty lab code leaves a lab-based test incomplete
fn crl_row(reference: &str, lab_code: &str, site_id: &str) -> Value {
    json!({
        "Status": "Completed",
        "Reference ID": reference,
        "Type": "U",
        "Name": "SMITH, JOHN",
        "CCF Donor ID": "999-00-1111",
        "Company Name": "Acme Trucking LLC",
        "Company Code": "A1001",
        "Collection Date": "03/14/2025",
        "Reviewed Date": "03/17/2025",
        "MRO Result": "NEG",
        "Regulated": "Yes",
        "Service": "Lab Based Urine Test",
        "Reason": "Random",
        "Lab Code": lab_code,
        "Site Name": "NORTH SIDE CLINIC",
        "Site ID": site_id,
    })
}

fn inbox_with(files: &[(SourceKind, Vec<Value>)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (source, rows) in files {
        let path = dir.path().join(format!("{}.json", source.as_str()));
        std::fs::write(path, serde_json::to_string(rows).unwrap()).unwrap();
    }
    dir
}

fn coordinator(
    remote: &Arc<FakeCrm>,
    store: &Arc<MemoryStore>,
    inbox: &TempDir,
) -> ReconcileCoordinator {
    ReconcileCoordinator::new(config(), remote.clone(), store.clone())
        .with_feed(SourceFeed::new(inbox.path()))
}

async fn assert_dedup_invariant(store: &MemoryStore) {
    let uploaded = store.uploaded_ccfids().await.unwrap();
    let pending = store.unreviewed_ccfids().await.unwrap();
    let overlap: HashSet<_> = uploaded.intersection(&pending).collect();
    assert!(overlap.is_empty(), "CCFIDs both uploaded and pending: {overlap:?}");
}

#[tokio::test]
async fn test_end_to_end_push_stage_and_skip() {
    let remote = Arc::new(FakeCrm::default());
    let store = Arc::new(MemoryStore::new().with_uploaded(["C-300"]));
    let inbox = TempDir::new().unwrap();
    let coordinator = coordinator(&remote, &store, &inbox);
    let mut ctx = RunContext::prepare(&config(), remote.clone(), store.clone(), false)
        .await
        .unwrap();

    let mut missing_result = complete("B-200");
    missing_result.test_result = String::new();
    let records = vec![complete("A-100"), missing_result, complete("C-300")];

    let summary = coordinator
        .reconcile_records(&mut ctx, records, SourceSummary::new(SourceKind::Crl))
        .await;

    assert_eq!(summary.final_state, RunState::Done);
    assert_eq!(summary.complete, 1);
    assert_eq!(summary.incomplete, 1);
    assert_eq!(summary.duplicates_skipped, 1);
    assert_eq!(summary.pushed, 1);
    assert_eq!(summary.staged, 1);
    assert!(summary.errors.is_empty());

    // A: pushed and confirmed
    assert_eq!(remote.submitted_names(), vec!["A-100"]);
    let uploaded = store.uploaded_ccfids().await.unwrap();
    assert!(uploaded.contains(&ccfid("A-100")));

    // B: staged unreviewed
    let staged = store.fetch(&ccfid("B-200")).await.unwrap().unwrap();
    assert!(!staged.reviewed);
    assert_eq!(staged.source, "crl");
    assert!(!uploaded.contains(&ccfid("B-200")));

    // C: neither staged nor pushed
    assert!(store.fetch(&ccfid("C-300")).await.unwrap().is_none());
    assert_eq!(store.staged_count(), 1);

    let payload = &remote.submitted.lock().unwrap()[0];
    assert_eq!(payload["Company"]["id"], "101");
    assert_eq!(payload["Laboratory"]["id"], "201");
    assert_eq!(payload["Collection_Site"]["id"], "301");
    assert_eq!(payload["Collection_Date"], "2025-03-14");

    assert_dedup_invariant(&store).await;
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let remote = Arc::new(FakeCrm::default());
    let store = Arc::new(MemoryStore::new().with_uploaded(["C-300"]));
    let inbox = inbox_with(&[(
        SourceKind::Crl,
        vec![
            crl_row("A-100", "Quest", "5501"),
            crl_row("B-200", "", "5501"),
            crl_row("C-300", "Quest", "5501"),
        ],
    )]);
    let coordinator = coordinator(&remote, &store, &inbox);

    let first = coordinator.run(&[SourceKind::Crl]).await.unwrap();
    assert_eq!(first.total_pushed(), 1);
    assert_eq!(first.total_staged(), 1);
    assert!(first.is_successful());

    let submitted_after_first = remote.submitted.lock().unwrap().len();
    let uploaded_after_first = store.uploaded_ccfids().await.unwrap();

    let second = coordinator.run(&[SourceKind::Crl]).await.unwrap();
    let crl = &second.sources[0];
    assert_eq!(crl.rows_loaded, 3);
    assert_eq!(crl.duplicates_skipped, 3);
    assert_eq!(crl.pushed, 0);
    assert_eq!(crl.staged, 0);
    assert_eq!(remote.submitted.lock().unwrap().len(), submitted_after_first);
    assert_eq!(store.uploaded_ccfids().await.unwrap(), uploaded_after_first);
    assert_eq!(store.staged_count(), 1);
    assert_dedup_invariant(&store).await;
}

#[tokio::test]
async fn test_failed_push_leaves_records_eligible() {
    let remote = Arc::new(FakeCrm::default());
    remote.fail_submit.store(true, Ordering::SeqCst);
    let store = Arc::new(MemoryStore::new());
    let inbox = inbox_with(&[(
        SourceKind::Crl,
        vec![crl_row("A-100", "Quest", "5501"), crl_row("A-101", "Quest", "5501")],
    )]);
    let coordinator = coordinator(&remote, &store, &inbox);

    let summary = coordinator.run(&[SourceKind::Crl]).await.unwrap();
    let crl = &summary.sources[0];
    assert_eq!(crl.pushed, 0);
    assert_eq!(crl.rejected, 2);
    assert_eq!(crl.errors_of(RunErrorKind::RemoteTransportFailure), 1);
    assert!(!summary.is_successful());
    assert!(store.uploaded_ccfids().await.unwrap().is_empty());
    assert_eq!(store.staged_count(), 0);

    remote.fail_submit.store(false, Ordering::SeqCst);
    let retry = coordinator.run(&[SourceKind::Crl]).await.unwrap();
    assert_eq!(retry.total_pushed(), 2);
    let uploaded = store.uploaded_ccfids().await.unwrap();
    assert!(uploaded.contains(&ccfid("A-100")) && uploaded.contains(&ccfid("A-101")));
}

#[tokio::test]
async fn test_staging_failure_does_not_block_push() {
    let remote = Arc::new(FakeCrm::default());
    let store = Arc::new(MemoryStore::new());
    store.fail_staging_inserts(true);
    let inbox = inbox_with(&[(
        SourceKind::Crl,
        vec![crl_row("A-100", "Quest", "5501"), crl_row("B-200", "", "5501")],
    )]);

    let summary = coordinator(&remote, &store, &inbox)
        .run(&[SourceKind::Crl])
        .await
        .unwrap();
    let crl = &summary.sources[0];
    assert_eq!(crl.staged, 0);
    assert_eq!(crl.pushed, 1);
    assert_eq!(crl.errors_of(RunErrorKind::StagingPersistenceFailure), 1);
    assert_eq!(store.staged_count(), 0);
}

#[tokio::test]
async fn test_missing_source_file_is_isolated() {
    let remote = Arc::new(FakeCrm::default());
    let store = Arc::new(MemoryStore::new());
    let inbox = inbox_with(&[(SourceKind::Crl, vec![crl_row("A-100", "Quest", "5501")])]);

    let summary = coordinator(&remote, &store, &inbox)
        .run(&[SourceKind::Escreen, SourceKind::Crl])
        .await
        .unwrap();

    assert_eq!(summary.sources.len(), 2);
    assert!(summary.sources[0].load_failed());
    assert_eq!(summary.sources[0].final_state, RunState::Done);
    assert_eq!(summary.sources[1].pushed, 1);
    assert!(summary.sources[1].errors.is_empty());
}

#[tokio::test]
async fn test_unknown_site_is_created_before_push() {
    let remote = Arc::new(FakeCrm::default());
    let store = Arc::new(MemoryStore::new());
    let inbox = inbox_with(&[(SourceKind::Crl, vec![crl_row("A-100", "Quest", "7777")])]);

    let summary = coordinator(&remote, &store, &inbox)
        .run(&[SourceKind::Crl])
        .await
        .unwrap();

    assert_eq!(summary.sources[0].sites_created, 1);
    let created = remote.created_sites.lock().unwrap().clone();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].site_id, "7777");
    assert!(!store.site_pending("7777"));

    let payload = &remote.submitted.lock().unwrap()[0];
    assert_eq!(payload["Collection_Site"]["id"], "400");
    assert!(payload.get("Collection_Site_ID").is_none());
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let remote = Arc::new(FakeCrm::default());
    let store = Arc::new(MemoryStore::new());
    let inbox = inbox_with(&[(
        SourceKind::Crl,
        vec![
            crl_row("A-100", "Quest", "7777"),
            crl_row("B-200", "", "5501"),
        ],
    )]);

    let summary = coordinator(&remote, &store, &inbox)
        .with_dry_run(true)
        .run(&[SourceKind::Crl])
        .await
        .unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.total_pushed(), 1);
    assert_eq!(summary.total_staged(), 1);
    assert!(remote.submitted.lock().unwrap().is_empty());
    assert!(remote.created_sites.lock().unwrap().is_empty());
    assert_eq!(store.staged_count(), 0);
    assert!(store.uploaded_ccfids().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_shutdown_stops_before_next_source() {
    let remote = Arc::new(FakeCrm::default());
    let store = Arc::new(MemoryStore::new());
    let inbox = inbox_with(&[(SourceKind::Crl, vec![crl_row("A-100", "Quest", "5501")])]);
    let (tx, rx) = tokio::sync::watch::channel(false);
    tx.send(true).unwrap();

    let summary = coordinator(&remote, &store, &inbox)
        .with_shutdown_signal(rx)
        .run(&[SourceKind::Crl])
        .await
        .unwrap();

    assert!(summary.sources.is_empty());
    assert!(remote.submitted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_dedup_invariant_across_runs_and_remote_sync() {
    let remote = Arc::new(FakeCrm::default());
    let store = Arc::new(MemoryStore::new());
    let inbox = inbox_with(&[(
        SourceKind::Crl,
        vec![crl_row("A-100", "Quest", "5501"), crl_row("B-200", "", "5501")],
    )]);
    let coordinator = coordinator(&remote, &store, &inbox);

    coordinator.run(&[SourceKind::Crl]).await.unwrap();
    assert_dedup_invariant(&store).await;
    assert!(store.unreviewed_ccfids().await.unwrap().contains(&ccfid("B-200")));

    // B reaches the CRM outside this tool
    remote.uploaded.lock().unwrap().push("B-200".into());
    let report = sync_uploaded(remote.as_ref(), store.as_ref(), false).await.unwrap();
    assert_eq!(report.added, 1);
    assert_dedup_invariant(&store).await;
    assert!(store.unreviewed_ccfids().await.unwrap().is_empty());

    let again = coordinator.run(&[SourceKind::Crl]).await.unwrap();
    assert_eq!(again.sources[0].duplicates_skipped, 2);
    assert_dedup_invariant(&store).await;
}

#[tokio::test]
async fn test_malformed_row_does_not_sink_source() {
    let remote = Arc::new(FakeCrm::default());
    let store = Arc::new(MemoryStore::new());
    let inbox = inbox_with(&[(
        SourceKind::Crl,
        vec![
            crl_row("A-100", "Quest", "5501"),
            json!("garbage row from extractor"),
        ],
    )]);

    let summary = coordinator(&remote, &store, &inbox)
        .run(&[SourceKind::Crl])
        .await
        .unwrap();

    let crl = &summary.sources[0];
    assert!(!crl.load_failed());
    assert_eq!(crl.rows_loaded, 2);
    assert_eq!(crl.skipped, 1);
    assert_eq!(crl.pushed, 1);
    assert!(crl.errors.is_empty());
    assert_eq!(remote.submitted_names(), vec!["A-100"]);
}
