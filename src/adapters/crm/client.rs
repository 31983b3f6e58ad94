//! CRM REST client
//!
//! [`CrmClient`] implements [`RemoteSystem`] over the CRM v2 REST API. Reads are
//! paginated and retried with exponential backoff; writes are single-shot so a
//! timeout can never turn into a double submission.

use super::auth::TokenCache;
use super::models::{
    field_text, AccountEntry, LabEntry, ListResponse, NewSite, ReferenceSnapshot,
    SiteCreateOutcome, SiteEntry, SubmitOutcome, WriteOutcome, WriteRequest, WriteResponse,
};
use super::traits::RemoteSystem;
use crate::config::CrmConfig;
use crate::domain::ids::{Ccfid, RemoteId};
use crate::domain::{ReconcileError, RemoteError, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, RequestBuilder, StatusCode};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Field of the records module that holds the CCFID
const RECORD_NAME_FIELD: &str = "Name";

/// HTTP client for the CRM
pub struct CrmClient {
    base_url: Url,
    client: Client,
    token: TokenCache,
    config: CrmConfig,
}

impl CrmClient {
    /// Build a client from configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the base URL does not parse or the HTTP
    /// client cannot be built.
    pub fn new(config: CrmConfig) -> Result<Self> {
        let mut base_url = Url::parse(&config.base_url).map_err(|e| {
            ReconcileError::Configuration(format!("Invalid crm.base_url '{}': {e}", config.base_url))
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut client_builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.timeout_seconds.min(30)));

        if !config.tls_verify {
            tracing::warn!(
                base_url = %config.base_url,
                "⚠️  TLS certificate verification is DISABLED for the CRM connection"
            );
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let client = client_builder.build().map_err(|e| {
            ReconcileError::Configuration(format!("Failed to build HTTP client: {e}"))
        })?;

        let token = TokenCache::new(client.clone(), &config);

        Ok(Self {
            base_url,
            client,
            token,
            config,
        })
    }

    fn module_url(&self, module: &str) -> Result<Url> {
        self.base_url
            .join(&format!("crm/v2/{module}"))
            .map_err(|e| ReconcileError::Configuration(format!("Invalid module '{module}': {e}")))
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.token.access_token().await?;
        Ok(request.header(
            "Authorization",
            format!("{} {}", self.config.auth_scheme, token),
        ))
    }

    /// Error for a non-success status; a 401/403 also drops the cached token
    async fn status_error(&self, status: StatusCode, message: String) -> ReconcileError {
        let error = RemoteError::from_status(status.as_u16(), message);
        if matches!(error, RemoteError::AuthenticationFailed(_)) {
            tracing::warn!(status = status.as_u16(), "CRM refused the access token, dropping it");
            self.token.invalidate().await;
        }
        ReconcileError::Remote(error)
    }

    /// Retry a read with exponential backoff
    ///
    /// Only errors the remote may recover from are retried.
    async fn retry_request<F, T, Fut>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let retry = &self.config.retry;
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    let retryable = matches!(&e, ReconcileError::Remote(r) if r.is_retryable());
                    attempt += 1;
                    if !retryable || attempt > retry.max_retries {
                        return Err(e);
                    }

                    let factor = retry.backoff_multiplier.powf((attempt - 1) as f64);
                    let delay_ms = ((retry.initial_delay_ms as f64) * factor) as u64;
                    let delay_ms = delay_ms.min(retry.max_delay_ms);

                    crate::log_retry_attempt!(attempt, retry.max_retries, e);
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }
    }

    async fn fetch_page(&self, module: &str, fields: &str, page: u32) -> Result<ListResponse> {
        let url = self.module_url(module)?;
        let per_page = self.config.page_size.to_string();
        let page_str = page.to_string();

        self.retry_request(|| async {
            let request = self.client.get(url.clone()).query(&[
                ("fields", fields),
                ("page", page_str.as_str()),
                ("per_page", per_page.as_str()),
            ]);
            let resp = self.authorized(request).await?.send().await.map_err(|e| {
                ReconcileError::Remote(RemoteError::TransportFailed(e.to_string()))
            })?;

            let status = resp.status();
            if status == StatusCode::NO_CONTENT {
                return Ok(ListResponse::default());
            }
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(self
                    .status_error(status, format!("GET {module} page {page} failed: {body}"))
                    .await);
            }

            let body = resp.text().await.map_err(|e| {
                ReconcileError::Remote(RemoteError::TransportFailed(e.to_string()))
            })?;
            if body.trim().is_empty() {
                return Ok(ListResponse::default());
            }
            serde_json::from_str::<ListResponse>(&body).map_err(|e| {
                ReconcileError::Remote(RemoteError::InvalidResponse(format!(
                    "{module} page {page}: {e}"
                )))
            })
        })
        .await
    }

    /// Read every record of a module, following `info.more_records`
    pub async fn fetch_all(&self, module: &str, fields: &[&str]) -> Result<Vec<Value>> {
        let fields = fields.join(",");
        let mut records = Vec::new();
        let mut page = 1;

        loop {
            let response = self.fetch_page(module, &fields, page).await?;
            let more = response.has_more();
            let empty = response.data.is_empty();
            records.extend(response.data);

            tracing::debug!(module = %module, page, total = records.len(), "Fetched reference page");

            if empty || !more {
                break;
            }
            page += 1;
        }

        Ok(records)
    }

    async fn fetch_accounts(&self) -> Result<Vec<AccountEntry>> {
        let c = &self.config;
        let rows = self
            .fetch_all(
                &c.accounts_module,
                &[
                    c.account_code_field.as_str(),
                    c.account_name_field.as_str(),
                    c.account_i3_field.as_str(),
                ],
            )
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let code = field_text(row, &c.account_code_field)?;
                let id = field_text(row, "id").and_then(RemoteId::parse)?;
                Some(AccountEntry {
                    code,
                    id,
                    name: field_text(row, &c.account_name_field).unwrap_or_default(),
                    i3_code: field_text(row, &c.account_i3_field),
                })
            })
            .collect())
    }

    async fn fetch_laboratories(&self) -> Result<Vec<LabEntry>> {
        let c = &self.config;
        let rows = self
            .fetch_all(&c.labs_module, &[c.lab_name_field.as_str()])
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(LabEntry {
                    name: field_text(row, &c.lab_name_field)?,
                    id: field_text(row, "id").and_then(RemoteId::parse)?,
                })
            })
            .collect())
    }

    async fn fetch_sites(&self) -> Result<Vec<SiteEntry>> {
        let c = &self.config;
        let rows = self
            .fetch_all(&c.sites_module, &[RECORD_NAME_FIELD, c.site_id_field.as_str()])
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(SiteEntry {
                    site_id: field_text(row, &c.site_id_field)?,
                    name: field_text(row, RECORD_NAME_FIELD).unwrap_or_default(),
                    id: field_text(row, "id").and_then(RemoteId::parse)?,
                })
            })
            .collect())
    }

    /// Single-shot POST of `{"data": [...]}` to a module
    ///
    /// A 4xx answer that still carries a `data` array is per-record feedback and is
    /// returned as such.
    async fn post_data<T: serde::Serialize + Sync>(
        &self,
        module: &str,
        items: &[T],
    ) -> Result<Vec<WriteOutcome>> {
        let url = self.module_url(module)?;
        let request = self
            .client
            .post(url)
            .json(&WriteRequest { data: items });
        let resp = self
            .authorized(request)
            .await?
            .send()
            .await
            .map_err(|e| ReconcileError::Remote(RemoteError::TransportFailed(e.to_string())))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            let auth = matches!(status.as_u16(), 401 | 403);
            if status.is_client_error() && !auth {
                if let Ok(parsed) = serde_json::from_str::<WriteResponse>(&body) {
                    if !parsed.data.is_empty() {
                        return Ok(parsed.data.iter().map(WriteOutcome::from_value).collect());
                    }
                }
            }
            return Err(self
                .status_error(status, format!("POST {module} failed: {body}"))
                .await);
        }

        let parsed: WriteResponse = serde_json::from_str(&body).map_err(|e| {
            ReconcileError::Remote(RemoteError::InvalidResponse(format!(
                "POST {module} returned unreadable body: {e}"
            )))
        })?;
        Ok(parsed.data.iter().map(WriteOutcome::from_value).collect())
    }
}

#[async_trait]
impl RemoteSystem for CrmClient {
    async fn fetch_reference(&self) -> Result<ReferenceSnapshot> {
        let accounts = self.fetch_accounts().await?;
        let laboratories = self.fetch_laboratories().await?;
        let sites = self.fetch_sites().await?;

        tracing::info!(
            accounts = accounts.len(),
            laboratories = laboratories.len(),
            sites = sites.len(),
            "Fetched CRM reference data"
        );

        Ok(ReferenceSnapshot {
            accounts,
            laboratories,
            sites,
        })
    }

    async fn create_sites(&self, sites: &[NewSite]) -> Result<Vec<SiteCreateOutcome>> {
        if sites.is_empty() {
            return Ok(Vec::new());
        }

        let body: Vec<Value> = sites
            .iter()
            .map(|s| {
                let mut entry = serde_json::Map::new();
                entry.insert(RECORD_NAME_FIELD.to_string(), Value::from(s.name.clone()));
                entry.insert(
                    self.config.site_id_field.clone(),
                    Value::from(s.site_id.clone()),
                );
                Value::Object(entry)
            })
            .collect();

        let outcomes = self.post_data(&self.config.sites_module, &body).await?;

        Ok(sites
            .iter()
            .enumerate()
            .map(|(i, site)| {
                let result = match outcomes.get(i) {
                    Some(o) if o.is_success() => o
                        .created_id()
                        .ok_or_else(|| "success without details.id".to_string()),
                    Some(o) => Err(o.reason()),
                    None => Err("no outcome returned".to_string()),
                };
                SiteCreateOutcome {
                    site_id: site.site_id.clone(),
                    result,
                }
            })
            .collect())
    }

    async fn submit_records(&self, payloads: &[Value]) -> Result<Vec<SubmitOutcome>> {
        if payloads.is_empty() {
            return Ok(Vec::new());
        }

        let outcomes = self
            .post_data(&self.config.records_module, payloads)
            .await?;

        Ok(outcomes
            .into_iter()
            .map(|o| {
                if o.is_success() {
                    SubmitOutcome::Accepted(o.created_id())
                } else {
                    SubmitOutcome::Rejected(o.reason())
                }
            })
            .collect())
    }

    async fn fetch_uploaded_ccfids(&self) -> Result<Vec<Ccfid>> {
        let rows = self
            .fetch_all(&self.config.records_module, &[RECORD_NAME_FIELD])
            .await?;

        let ccfids: Vec<Ccfid> = rows
            .iter()
            .filter_map(|row| field_text(row, RECORD_NAME_FIELD))
            .filter_map(|name| Ccfid::new(name).ok())
            .collect();

        tracing::info!(count = ccfids.len(), "Fetched uploaded CCFIDs from CRM");
        Ok(ccfids)
    }
}
