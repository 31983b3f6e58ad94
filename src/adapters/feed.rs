//! Raw source rows
//!
//! The extractor drops one JSON file per source into the inbox:
//! `{inbox_dir}/{source}.json`, holding an array of row objects keyed by the
//! portal's column headers.

use crate::core::normalize::SourceKind;
use crate::domain::record::RawRow;
use crate::domain::{ReconcileError, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Rows read from one dump
#[derive(Debug, Clone, Default)]
pub struct SourceRows {
    pub rows: Vec<RawRow>,
    /// Array elements that were not row objects
    pub malformed: usize,
}

/// Reads raw rows for a source from the inbox directory
#[derive(Debug, Clone)]
pub struct SourceFeed {
    inbox_dir: PathBuf,
}

impl SourceFeed {
    pub fn new(inbox_dir: impl Into<PathBuf>) -> Self {
        Self {
            inbox_dir: inbox_dir.into(),
        }
    }

    /// Path of the row dump for `source`
    pub fn path_for(&self, source: SourceKind) -> PathBuf {
        self.inbox_dir.join(format!("{source}.json"))
    }

    /// Load every row for `source`
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Source`] when the file is missing or is not a
    /// JSON array. Elements that are not objects are dropped and counted.
    pub async fn load(&self, source: SourceKind) -> Result<SourceRows> {
        load_rows(&self.path_for(source)).await
    }
}

/// Load rows from an arbitrary row dump
pub async fn load_rows(path: &Path) -> Result<SourceRows> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        ReconcileError::Source(format!("Failed to read {}: {}", path.display(), e))
    })?;
    parse_rows(&content)
        .map_err(|e| ReconcileError::Source(format!("{}: {}", path.display(), e)))
}

/// Parse a JSON array of row objects, stringifying every value
///
/// Non-object elements are skipped with a debug note; only a body that is not
/// a JSON array fails.
pub fn parse_rows(content: &str) -> std::result::Result<SourceRows, String> {
    let value: Value =
        serde_json::from_str(content).map_err(|e| format!("invalid JSON: {e}"))?;
    let Value::Array(items) = value else {
        return Err("expected a JSON array of rows".to_string());
    };

    let total = items.len();
    let rows: Vec<RawRow> = items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| match item {
            Value::Object(map) => Some(
                map.into_iter()
                    .map(|(column, value)| (column, stringify(value)))
                    .collect(),
            ),
            other => {
                tracing::debug!(row = i, kind = value_kind(&other), "Skipping malformed row");
                None
            }
        })
        .collect();

    Ok(SourceRows {
        malformed: total - rows.len(),
        rows,
    })
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn stringify(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        nested => nested.to_string(),
    }
}
