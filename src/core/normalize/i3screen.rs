//! i3screen portal rows

use super::canon::{
    cell, map_laboratory, map_reason, map_regulation, map_result, parse_date,
    strip_float_suffix, title_case,
};
use super::{FieldMapper, MapperContext, RowOutcome, SourceKind};
use crate::domain::record::{CanonicalRecord, RawRow};

pub struct I3screenMapper;

fn test_type(specimen: &str) -> &'static str {
    let v = specimen.to_lowercase();
    if v.contains("urine") {
        "Lab Based Urine Test"
    } else if v.contains("hair") {
        "Lab Based Hair Test"
    } else if v.contains("breath") || v.contains("ebt") {
        "Alcohol Breath Test"
    } else {
        "Other"
    }
}

impl FieldMapper for I3screenMapper {
    fn source(&self) -> SourceKind {
        SourceKind::I3screen
    }

    fn map_row(&self, row: &RawRow, ctx: &MapperContext) -> RowOutcome {
        let code = ctx
            .account_for_org(cell(row, &["Org ID"]))
            .unwrap_or_default()
            .to_string();

        let location = if code == ctx.site_required_code {
            cell(row, &["Location"]).trim().to_string()
        } else {
            "None".to_string()
        };

        RowOutcome::Mapped(CanonicalRecord {
            company: cell(row, &["Customer"]).trim().to_string(),
            code,
            ccfid: strip_float_suffix(cell(row, &["CCF / Test Number"])),
            first_name: title_case(cell(row, &["First Name"]).trim()),
            last_name: title_case(cell(row, &["Last Name"]).trim()),
            primary_id: cell(row, &["SSN/EID"]).trim().to_string(),
            collection_date: parse_date(cell(row, &["Collection Date/Time"])),
            test_reason: map_reason(cell(row, &["Reason For Test"]))
                .unwrap_or_default()
                .to_string(),
            test_result: map_result(cell(row, &["MRO Result"])),
            test_type: test_type(cell(row, &["Specimen Type"])).to_string(),
            regulation: map_regulation(cell(row, &["Program Description"])).to_string(),
            mro_received: parse_date(cell(row, &["Report Date"])),
            laboratory: map_laboratory(cell(row, &["Lab"])).to_string(),
            collection_site: title_case(cell(row, &["Collection Site"]).trim()),
            collection_site_id: strip_float_suffix(cell(row, &["Collection Site ID"])),
            location,
        })
    }
}
