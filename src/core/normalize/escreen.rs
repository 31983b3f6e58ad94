//! eScreen portal rows
//!
//! eScreen exports vary their headers between report versions, so every column
//! is resolved from a candidate list. Company codes are not exported at all and
//! come from fuzzy matching against CRM account names.

use super::canon::{
    cell, find_cell, map_laboratory, map_reason, map_regulation, map_result, parse_date,
    split_name, FieldTable,
};
use super::{FieldMapper, MapperContext, RowOutcome, SourceKind};
use crate::domain::record::{CanonicalRecord, RawRow};

const DONOR: &FieldTable = &["Donor Name", "DonorName"];
const CLIENT: &FieldTable = &["Client", "Company", "Employer"];
const COST_CENTER: &FieldTable = &["Cost Center", "CostCenter"];
const COC: &FieldTable = &["COC", "CCFID", "Test Number"];
const SSN: &FieldTable = &["SSN", "Donor SSN"];
const REASON: &FieldTable = &["Reason"];
const RESULT: &FieldTable = &["Result"];
const REGULATION: &FieldTable = &["Regulation"];
const TEST_TYPE: &FieldTable = &["Test Type"];
const COLLECTED: &FieldTable = &["Collection Date/Time", "Collection Date"];
const VERIFIED: &FieldTable = &["Final Verification Date/Time", "MRO_Received"];
const BA_QUANT: &FieldTable = &["BA Quant", "baValue"];

const STATIC_SITE: &str = "eScreen";

pub struct EscreenMapper;

/// Cost center when it names something, otherwise the client
fn choose_company(row: &RawRow) -> String {
    let cost_center = cell(row, COST_CENTER).trim();
    let placeholder = matches!(
        cost_center.to_uppercase().as_str(),
        "" | "N/A" | "NONE" | "NAN"
    );
    if placeholder {
        cell(row, CLIENT).trim().to_string()
    } else {
        cost_center.to_string()
    }
}

fn test_type(raw: &str) -> &'static str {
    let v = raw.to_lowercase();
    if v.contains("ecup") {
        "POCT Urine Test"
    } else if v.contains("alere") || v.contains("quest") {
        "Lab Based Urine Test"
    } else if v.contains("omega") {
        "Lab Based Hair Test"
    } else if v.contains("ebt") || v.contains("breath") {
        "Alcohol Breath Test"
    } else {
        "Other"
    }
}

impl FieldMapper for EscreenMapper {
    fn source(&self) -> SourceKind {
        SourceKind::Escreen
    }

    fn map_row(&self, row: &RawRow, ctx: &MapperContext) -> RowOutcome {
        let mut test_result = map_result(cell(row, RESULT));
        if test_result.is_empty() {
            return RowOutcome::Skipped("pending result".to_string());
        }
        if find_cell(row, BA_QUANT).map(str::trim) == Some("0") {
            test_result = "Negative".to_string();
        }

        let company = choose_company(row);
        let code = if company.is_empty() {
            String::new()
        } else {
            ctx.company_resolver.resolve(&company).unwrap_or_default()
        };

        let raw_type = cell(row, TEST_TYPE);
        let test_type = test_type(raw_type);
        let laboratory = match test_type {
            "Alcohol Breath Test" | "POCT Urine Test" => "",
            _ => map_laboratory(raw_type),
        };

        let (collection_site, collection_site_id, location) = if code == ctx.site_required_code {
            (String::new(), String::new(), String::new())
        } else {
            (
                STATIC_SITE.to_string(),
                STATIC_SITE.to_string(),
                "None".to_string(),
            )
        };

        let (first_name, last_name) = split_name(cell(row, DONOR));

        RowOutcome::Mapped(CanonicalRecord {
            company,
            code,
            ccfid: cell(row, COC).trim().to_string(),
            first_name,
            last_name,
            primary_id: cell(row, SSN).trim().to_string(),
            collection_date: parse_date(cell(row, COLLECTED)),
            test_reason: map_reason(cell(row, REASON)).unwrap_or_default().to_string(),
            test_result,
            test_type: test_type.to_string(),
            regulation: map_regulation(cell(row, REGULATION)).to_string(),
            mro_received: parse_date(cell(row, VERIFIED)),
            laboratory: laboratory.to_string(),
            collection_site,
            collection_site_id,
            location,
        })
    }
}
