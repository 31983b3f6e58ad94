//! Row mapping for the staging table

use crate::adapters::database::traits::StagedRecord;
use crate::domain::record::{CanonicalField, CanonicalRecord};
use crate::domain::{ReconcileError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use tokio_postgres::Row;

/// Column list of `staging_records` in canonical order, followed by the bookkeeping columns
pub fn staging_columns() -> String {
    let mut columns: Vec<&str> = CanonicalField::ALL.iter().map(|f| f.column_name()).collect();
    columns.extend(["source", "reviewed", "uploaded_timestamp"]);
    columns.join(", ")
}

fn read_text(row: &Row, field: CanonicalField) -> Result<String> {
    row.try_get::<_, Option<String>>(field.column_name())
        .map(Option::unwrap_or_default)
        .map_err(|e| ReconcileError::Database(format!("column {}: {e}", field.column_name())))
}

fn read_date(row: &Row, field: CanonicalField) -> Result<Option<NaiveDate>> {
    row.try_get::<_, Option<NaiveDate>>(field.column_name())
        .map_err(|e| ReconcileError::Database(format!("column {}: {e}", field.column_name())))
}

/// Build a staged record from a row selected with [`staging_columns`]
pub fn staged_from_row(row: &Row) -> Result<StagedRecord> {
    let mut record = CanonicalRecord::default();
    for field in CanonicalField::ALL {
        if field.is_date() {
            record
                .set_date(field, read_date(row, field)?)
                .map_err(ReconcileError::Database)?;
        } else {
            record
                .set_text(field, read_text(row, field)?)
                .map_err(ReconcileError::Database)?;
        }
    }

    let source: String = row
        .try_get("source")
        .map_err(|e| ReconcileError::Database(format!("column source: {e}")))?;
    let reviewed: bool = row
        .try_get("reviewed")
        .map_err(|e| ReconcileError::Database(format!("column reviewed: {e}")))?;
    let uploaded_timestamp: DateTime<Utc> = row
        .try_get("uploaded_timestamp")
        .map_err(|e| ReconcileError::Database(format!("column uploaded_timestamp: {e}")))?;

    Ok(StagedRecord {
        record,
        source,
        reviewed,
        uploaded_timestamp,
    })
}
