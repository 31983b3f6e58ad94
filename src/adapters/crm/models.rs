//! CRM API models
//!
//! Wire shapes of the CRM v2 REST API plus the typed reference entries the rest of
//! the crate works with.

use crate::domain::ids::RemoteId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// OAuth token endpoint response
///
/// On a bad refresh token the endpoint still answers 200, with `error` set and no
/// `access_token`.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Paging block of a list response
#[derive(Debug, Default, Deserialize)]
pub struct PageInfo {
    #[serde(default)]
    pub more_records: bool,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub count: Option<u32>,
}

/// `GET /crm/v2/{module}` response
#[derive(Debug, Default, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default)]
    pub info: Option<PageInfo>,
}

impl ListResponse {
    pub fn has_more(&self) -> bool {
        self.info.as_ref().map(|i| i.more_records).unwrap_or(false)
    }
}

/// `POST /crm/v2/{module}` request body
#[derive(Debug, Serialize)]
pub struct WriteRequest<'a, T: Serialize> {
    pub data: &'a [T],
}

/// `POST /crm/v2/{module}` response
#[derive(Debug, Default, Deserialize)]
pub struct WriteResponse {
    #[serde(default)]
    pub data: Vec<Value>,
}

/// One entry of a write response, read leniently
#[derive(Debug, Default, Deserialize)]
pub struct WriteOutcome {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<Value>,
}

impl WriteOutcome {
    /// Parse one response entry; anything that is not an object becomes an empty outcome
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some("success")
    }

    /// `details.id` of a created record
    pub fn created_id(&self) -> Option<RemoteId> {
        self.details
            .as_ref()
            .and_then(|d| d.get("id"))
            .and_then(value_text)
            .and_then(RemoteId::parse)
    }

    /// Human readable rejection reason
    pub fn reason(&self) -> String {
        let code = self.code.as_deref().unwrap_or("UNKNOWN");
        let message = self.message.as_deref().unwrap_or("no message");
        match self.details.as_ref() {
            Some(details) if !details.is_null() => format!("{code}: {message} ({details})"),
            _ => format!("{code}: {message}"),
        }
    }
}

/// Outcome of submitting one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted(Option<RemoteId>),
    Rejected(String),
}

impl SubmitOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted(_))
    }
}

/// An account row from the accounts module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountEntry {
    pub code: String,
    pub id: RemoteId,
    pub name: String,
    /// Numeric i3screen organization id, when the account has one
    pub i3_code: Option<String>,
}

/// A laboratory row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabEntry {
    pub name: String,
    pub id: RemoteId,
}

/// A collection site row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteEntry {
    pub site_id: String,
    pub name: String,
    pub id: RemoteId,
}

/// A collection site to create
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NewSite {
    pub site_id: String,
    pub name: String,
}

/// Result of creating one site, in submission order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteCreateOutcome {
    pub site_id: String,
    pub result: std::result::Result<RemoteId, String>,
}

/// Everything the reference cache refreshes in one go
#[derive(Debug, Clone, Default)]
pub struct ReferenceSnapshot {
    pub accounts: Vec<AccountEntry>,
    pub laboratories: Vec<LabEntry>,
    pub sites: Vec<SiteEntry>,
}

/// Read a scalar JSON value as trimmed text
///
/// Numbers keep their textual form, lookups (`{"name", "id"}`) yield their name.
pub fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Object(map) => return map.get("name").and_then(value_text),
        Value::Null | Value::Array(_) => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Read `field` of a record object as text
pub fn field_text(record: &Value, field: &str) -> Option<String> {
    record.get(field).and_then(value_text)
}
