//! CRL portal rows

use super::canon::{
    cell, find_cell, map_laboratory, map_reason, map_regulation, map_result, parse_date,
    split_name, strip_float_suffix, title_case,
};
use super::{FieldMapper, MapperContext, RowOutcome, SourceKind};
use crate::domain::record::{CanonicalRecord, RawRow};

const DROPPED_STATUSES: &[&str] = &[
    "pending laboratory testing",
    "pending collection",
    "collection not performed",
    "physical exam - pending",
];

pub struct CrlMapper;

/// Reference ID, or a synthetic id for breath-alcohol and physical events
fn resolve_ccfid(row: &RawRow) -> String {
    let reference = strip_float_suffix(cell(row, &["Reference ID"]));
    if !reference.is_empty() {
        return reference;
    }
    let authorized = cell(row, &["Authorized ID"]).trim();
    match cell(row, &["Type"]).trim().to_uppercase().as_str() {
        "A" => format!("BAT{authorized}"),
        "PHY" => format!("PHY{authorized}"),
        _ => String::new(),
    }
}

impl FieldMapper for CrlMapper {
    fn source(&self) -> SourceKind {
        SourceKind::Crl
    }

    fn map_row(&self, row: &RawRow, ctx: &MapperContext) -> RowOutcome {
        let status = cell(row, &["Status"]).trim().to_lowercase();
        if DROPPED_STATUSES.contains(&status.as_str()) {
            return RowOutcome::Skipped(format!("status '{status}'"));
        }

        let Some(collection_date) = parse_date(cell(row, &["Collection Date"])) else {
            return RowOutcome::Skipped("unparseable collection date".to_string());
        };
        if collection_date < ctx.min_collection_date {
            return RowOutcome::Skipped(format!(
                "collected {collection_date}, before {}",
                ctx.min_collection_date
            ));
        }

        let (first_name, last_name) = split_name(cell(row, &["Name"]));
        let is_physical = cell(row, &["Type"]).trim().eq_ignore_ascii_case("PHY");
        let test_type = if is_physical {
            "Physical".to_string()
        } else {
            cell(row, &["Service"]).trim().to_string()
        };

        let test_reason = match find_cell(row, &["Reason"]) {
            Some(reason) => map_reason(reason).unwrap_or_default(),
            None => "Other",
        };

        let lowered_type = test_type.to_lowercase();
        let laboratory = if lowered_type.contains("poct") || lowered_type.contains("alcohol") {
            "None"
        } else {
            find_cell(row, &["Lab Code"]).map(map_laboratory).unwrap_or_default()
        };

        RowOutcome::Mapped(CanonicalRecord {
            company: cell(row, &["Company Name", "Company"]).trim().to_string(),
            code: cell(row, &["Company Code"]).trim().to_string(),
            ccfid: resolve_ccfid(row),
            first_name,
            last_name,
            primary_id: cell(row, &["CCF Donor ID"]).trim().to_string(),
            collection_date: Some(collection_date),
            test_reason: test_reason.to_string(),
            test_result: map_result(cell(row, &["MRO Result"])),
            test_type,
            regulation: map_regulation(cell(row, &["Regulated"])).to_string(),
            mro_received: parse_date(cell(row, &["Reviewed Date"])),
            laboratory: laboratory.to_string(),
            collection_site: title_case(cell(row, &["Site Name"]).trim()),
            collection_site_id: strip_float_suffix(cell(row, &["Site ID"])),
            location: "None".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{context, row};
    use super::*;
    use chrono::NaiveDate;

    fn full_row() -> RawRow {
        row(&[
            ("Status", "Completed"),
            ("Reference ID", "0012345"),
            ("Type", "U"),
            ("Name", "SMITH, JOHN"),
            ("CCF Donor ID", "999-00-1111"),
            ("Company Name", "Acme Trucking LLC"),
            ("Company Code", "A1001"),
            ("Collection Date", "03/14/2025"),
            ("Reviewed Date", "2025-03-17"),
            ("MRO Result", "NEG"),
            ("Regulated", "Yes"),
            ("Service", "Lab Based Urine Test"),
            ("Reason", "Random"),
            ("Lab Code", "CRL"),
            ("Site Name", "NORTH SIDE CLINIC"),
            ("Site ID", "5501.0"),
        ])
    }

    fn mapped(row: &RawRow) -> CanonicalRecord {
        match CrlMapper.map_row(row, &context()) {
            RowOutcome::Mapped(record) => record,
            RowOutcome::Skipped(reason) => panic!("unexpected skip: {reason}"),
        }
    }

    #[test]
    fn test_full_row() {
        let record = mapped(&full_row());
        assert_eq!(record.ccfid, "0012345");
        assert_eq!(record.first_name, "John");
        assert_eq!(record.last_name, "Smith");
        assert_eq!(record.collection_date, NaiveDate::from_ymd_opt(2025, 3, 14));
        assert_eq!(record.mro_received, NaiveDate::from_ymd_opt(2025, 3, 17));
        assert_eq!(record.test_result, "Negative");
        assert_eq!(record.regulation, "DOT");
        assert_eq!(record.laboratory, "Clinical Reference Laboratory");
        assert_eq!(record.collection_site, "North Side Clinic");
        assert_eq!(record.collection_site_id, "5501");
        assert_eq!(record.location, "None");
    }

    #[test]
    fn test_synthetic_ids() {
        let mut r = full_row();
        r.insert("Reference ID".into(), "".into());
        r.insert("Authorized ID".into(), "777".into());
        r.insert("Type".into(), "A".into());
        assert_eq!(mapped(&r).ccfid, "BAT777");

        r.insert("Type".into(), "phy".into());
        let physical = mapped(&r);
        assert_eq!(physical.ccfid, "PHY777");
        assert_eq!(physical.test_type, "Physical");

        r.insert("Type".into(), "U".into());
        assert_eq!(mapped(&r).ccfid, "");
    }

    #[test]
    fn test_status_and_date_filters() {
        let mut pending = full_row();
        pending.insert("Status".into(), "Pending Collection".into());
        assert!(matches!(CrlMapper.map_row(&pending, &context()), RowOutcome::Skipped(_)));

        let mut old = full_row();
        old.insert("Collection Date".into(), "12/31/2024".into());
        assert!(matches!(CrlMapper.map_row(&old, &context()), RowOutcome::Skipped(_)));

        let mut garbled = full_row();
        garbled.insert("Collection Date".into(), "N/A".into());
        assert!(matches!(CrlMapper.map_row(&garbled, &context()), RowOutcome::Skipped(_)));
    }

    #[test]
    fn test_reason_and_lab_defaults() {
        let mut r = full_row();
        r.remove("Reason");
        r.remove("Lab Code");
        let record = mapped(&r);
        assert_eq!(record.test_reason, "Other");
        assert_eq!(record.laboratory, "");

        r.insert("Reason".into(), "court order".into());
        r.insert("Service".into(), "POCT Urine Test".into());
        let record = mapped(&r);
        assert_eq!(record.test_reason, "");
        assert_eq!(record.laboratory, "None");
    }
}
