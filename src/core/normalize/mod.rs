//! Per-source field mappers
//!
//! Each source portal exports its own columns and vocabularies. A
//! [`FieldMapper`] turns one raw row into a [`CanonicalRecord`] or skips it;
//! [`normalize`] runs a mapper over a whole batch and applies the shared
//! post-processing: rows without a CCFID or a usable result are dropped and
//! in-batch duplicate CCFIDs keep their first occurrence.
//!
//! Mappers never fail. Ambiguous input becomes an empty field.

pub mod canon;
pub mod crl;
pub mod escreen;
pub mod i3screen;
pub mod resolver;

pub use resolver::{CompanyResolver, FuzzyCompanyResolver};

use crate::adapters::crm::models::AccountEntry;
use crate::config::schema::{PipelineConfig, SourcesConfig};
use crate::domain::record::{CanonicalRecord, RawRow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A result source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Crl,
    I3screen,
    Escreen,
}

impl SourceKind {
    /// Every source in default reconciliation order
    pub const ALL: [SourceKind; 3] = [SourceKind::Crl, SourceKind::I3screen, SourceKind::Escreen];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Crl => "crl",
            SourceKind::I3screen => "i3screen",
            SourceKind::Escreen => "escreen",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "crl" => Ok(SourceKind::Crl),
            "i3screen" => Ok(SourceKind::I3screen),
            "escreen" => Ok(SourceKind::Escreen),
            other => Err(format!(
                "Unknown source '{other}' (expected crl, i3screen or escreen)"
            )),
        }
    }
}

/// Everything a mapper may consult besides the row itself
#[derive(Clone)]
pub struct MapperContext {
    /// CRL rows collected before this date are dropped
    pub min_collection_date: NaiveDate,
    /// Company code whose records must carry a location
    pub site_required_code: String,
    /// i3screen organization id to account code
    pub i3_accounts: HashMap<String, String>,
    pub company_resolver: Arc<dyn CompanyResolver>,
}

impl MapperContext {
    pub fn new(sources: &SourcesConfig, pipeline: &PipelineConfig, accounts: &[AccountEntry]) -> Self {
        let i3_accounts = accounts
            .iter()
            .filter_map(|a| {
                let org = a.i3_code.as_deref().and_then(i3_key)?;
                Some((org, a.code.clone()))
            })
            .collect();

        Self {
            min_collection_date: sources.min_collection_date,
            site_required_code: pipeline.site_required_code.clone(),
            i3_accounts,
            company_resolver: Arc::new(FuzzyCompanyResolver::new(
                accounts,
                sources.fuzzy_threshold,
            )),
        }
    }

    /// Account code for a raw i3screen Org ID
    pub fn account_for_org(&self, org_id: &str) -> Option<&str> {
        i3_key(org_id)
            .and_then(|key| self.i3_accounts.get(&key))
            .map(String::as_str)
    }
}

impl fmt::Debug for MapperContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapperContext")
            .field("min_collection_date", &self.min_collection_date)
            .field("site_required_code", &self.site_required_code)
            .field("i3_accounts", &self.i3_accounts.len())
            .finish_non_exhaustive()
    }
}

/// Normalize a numeric organization id: `"4567"`, `"4567.0"` and `4567` agree
fn i3_key(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let number: f64 = raw.parse().ok()?;
    if number.is_finite() && number.fract() == 0.0 {
        Some(format!("{}", number as i64))
    } else {
        None
    }
}

/// What a mapper made of one row
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Mapped(CanonicalRecord),
    Skipped(String),
}

/// Maps raw rows of one source into canonical records
pub trait FieldMapper: Send + Sync {
    fn source(&self) -> SourceKind;

    fn map_row(&self, row: &RawRow, ctx: &MapperContext) -> RowOutcome;
}

/// The mapper for a source
pub fn mapper_for(kind: SourceKind) -> Box<dyn FieldMapper> {
    match kind {
        SourceKind::Crl => Box::new(crl::CrlMapper),
        SourceKind::I3screen => Box::new(i3screen::I3screenMapper),
        SourceKind::Escreen => Box::new(escreen::EscreenMapper),
    }
}

/// Result of normalizing a batch
#[derive(Debug, Clone, Default)]
pub struct NormalizeOutput {
    /// Canonical records in input order, unique by CCFID
    pub records: Vec<CanonicalRecord>,
    /// Rows dropped by pre-filters or missing a CCFID
    pub skipped: usize,
    /// Rows dropped because an earlier row had the same CCFID
    pub duplicates_in_batch: usize,
}

/// Run a source's mapper over a batch of raw rows
pub fn normalize(kind: SourceKind, rows: &[RawRow], ctx: &MapperContext) -> NormalizeOutput {
    let mapper = mapper_for(kind);
    let mut output = NormalizeOutput::default();
    let mut seen = HashSet::new();

    for (index, row) in rows.iter().enumerate() {
        let mut record = match mapper.map_row(row, ctx) {
            RowOutcome::Mapped(record) => record,
            RowOutcome::Skipped(reason) => {
                tracing::debug!(source = %kind, row = index, reason = %reason, "Skipping row");
                output.skipped += 1;
                continue;
            }
        };

        record.ccfid = record.ccfid.trim().to_string();
        if record.ccfid.is_empty() {
            tracing::debug!(source = %kind, row = index, "Skipping row without CCFID");
            output.skipped += 1;
            continue;
        }
        if record.test_result.trim().is_empty() {
            tracing::debug!(source = %kind, row = index, ccfid = %record.ccfid, "Skipping row with pending result");
            output.skipped += 1;
            continue;
        }
        if !seen.insert(record.ccfid.clone()) {
            output.duplicates_in_batch += 1;
            continue;
        }
        output.records.push(record);
    }

    tracing::debug!(
        source = %kind,
        rows = rows.len(),
        records = output.records.len(),
        skipped = output.skipped,
        duplicates = output.duplicates_in_batch,
        "Normalized batch"
    );
    output
}


#[cfg(test)]
mod tests {
    use super::test_support::{context, row};
    use super::*;

    #[test]
    fn test_source_kind_parsing() {
        assert_eq!("CRL".parse::<SourceKind>().unwrap(), SourceKind::Crl);
        assert_eq!(" escreen ".parse::<SourceKind>().unwrap(), SourceKind::Escreen);
        assert!("labcorp".parse::<SourceKind>().is_err());
        assert_eq!(SourceKind::I3screen.to_string(), "i3screen");
    }

    #[test]
    fn test_org_lookup_ignores_float_suffix() {
        let ctx = context();
        assert_eq!(ctx.account_for_org("4567"), Some("A1001"));
        assert_eq!(ctx.account_for_org("8800.0"), Some("A1310"));
        assert_eq!(ctx.account_for_org("abc"), None);
    }

    #[test]
    fn test_normalize_drops_duplicates_and_pending() {
        let rows = vec![
            row(&[("CCF / Test Number", "X1"), ("MRO Result", "Negative")]),
            row(&[("CCF / Test Number", "X1"), ("MRO Result", "Positive")]),
            row(&[("CCF / Test Number", "X2"), ("MRO Result", "Pending")]),
            row(&[("CCF / Test Number", ""), ("MRO Result", "Negative")]),
        ];

        let output = normalize(SourceKind::I3screen, &rows, &context());
        assert_eq!(output.records.len(), 1);
        assert_eq!(output.records[0].test_result, "Negative");
        assert_eq!(output.duplicates_in_batch, 1);
        assert_eq!(output.skipped, 2);
    }
}
