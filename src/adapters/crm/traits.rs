//! Remote system-of-record trait
//!
//! The reconciliation core only needs four calls from the CRM. Keeping them behind
//! [`RemoteSystem`] lets runs execute against an in-memory fake in tests.

use super::models::{NewSite, ReferenceSnapshot, SiteCreateOutcome, SubmitOutcome};
use crate::domain::ids::Ccfid;
use crate::domain::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Reference reads and record writes against the CRM
#[async_trait]
pub trait RemoteSystem: Send + Sync {
    /// Fetch accounts, laboratories and collection sites
    ///
    /// Idempotent; implementations may retry.
    async fn fetch_reference(&self) -> Result<ReferenceSnapshot>;

    /// Create collection sites in a single call
    ///
    /// Returns one outcome per requested site, in submission order. Callers keep
    /// each call at 100 sites or fewer. Never retried.
    async fn create_sites(&self, sites: &[NewSite]) -> Result<Vec<SiteCreateOutcome>>;

    /// Submit record payloads in a single call
    ///
    /// The returned outcomes are parallel to `payloads`, but may be short when the
    /// remote answers with fewer entries. Never retried.
    async fn submit_records(&self, payloads: &[Value]) -> Result<Vec<SubmitOutcome>>;

    /// Every CCFID already present in the records module
    async fn fetch_uploaded_ccfids(&self) -> Result<Vec<Ccfid>>;
}
