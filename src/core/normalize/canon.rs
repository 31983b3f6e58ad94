//! Shared canonicalization helpers
//!
//! Name splitting, date parsing, the controlled vocabularies and header
//! resolution used by every field mapper. All functions are total: bad input
//! yields an empty value, never an error.

use crate::domain::record::RawRow;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Ordered header candidates for one logical column
pub type FieldTable = [&'static str];

/// Formats tried first, in order
const KNOWN_DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d", "%m/%d/%y"];
const KNOWN_DATETIME_FORMATS: &[&str] = &["%m/%d/%Y %H:%M", "%Y-%m-%d %H:%M"];

const FALLBACK_DATE_FORMATS: &[&str] = &[
    "%m-%d-%Y",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];
const FALLBACK_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%y %H:%M",
];

const PENDING_RESULTS: &[&str] = &[
    "pending",
    "not reported",
    "received at lab",
    "pending ccf",
    "sent to lab",
];

/// Look up a cell by header, trying each candidate in order, case-insensitively
///
/// Returns `""` when no candidate header exists.
pub fn cell<'r>(row: &'r RawRow, candidates: &FieldTable) -> &'r str {
    find_cell(row, candidates).unwrap_or_default()
}

/// Like [`cell`] but distinguishes a missing column from an empty one
pub fn find_cell<'r>(row: &'r RawRow, candidates: &FieldTable) -> Option<&'r str> {
    candidates.iter().find_map(|candidate| {
        let wanted = candidate.trim();
        row.iter()
            .find(|(header, _)| header.trim().eq_ignore_ascii_case(wanted))
            .map(|(_, value)| value.as_str())
    })
}

/// Python-style title case: upper-case the first letter of every alphabetic run
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_word = false;
    for c in value.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

/// Split `"Last, First"` into `(first, last)`, both title-cased
///
/// Only a single comma splits; anything else becomes the last name.
pub fn split_name(name: &str) -> (String, String) {
    let name = name.trim();
    if name.is_empty() {
        return (String::new(), String::new());
    }
    let parts: Vec<&str> = name.split(',').collect();
    if let [last, first] = parts.as_slice() {
        return (title_case(first.trim()), title_case(last.trim()));
    }
    (String::new(), title_case(name))
}

fn plausible(date: NaiveDate) -> Option<NaiveDate> {
    use chrono::Datelike;
    (1900..=2199).contains(&date.year()).then_some(date)
}

fn try_formats(value: &str, dates: &[&str], datetimes: &[&str]) -> Option<NaiveDate> {
    dates
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok().and_then(plausible))
        .or_else(|| {
            datetimes.iter().find_map(|fmt| {
                NaiveDateTime::parse_from_str(value, fmt)
                    .ok()
                    .and_then(|dt| plausible(dt.date()))
            })
        })
}

/// Parse a calendar date from any of the formats the sources emit
///
/// Known formats are tried first, then a permissive pass, then the leading
/// date-looking token of the value. Blank or unparseable input yields `None`.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    try_formats(value, KNOWN_DATE_FORMATS, KNOWN_DATETIME_FORMATS)
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .and_then(|dt| plausible(dt.date_naive()))
        })
        .or_else(|| try_formats(value, FALLBACK_DATE_FORMATS, FALLBACK_DATETIME_FORMATS))
        .or_else(|| {
            // "2025-03-14T10:00:00-05:00[America/Chicago]", "03/14/2025 10:00 CST" and the like
            let head = value.split(|c: char| c.is_whitespace() || c == 'T').next()?;
            (head != value)
                .then(|| try_formats(head, KNOWN_DATE_FORMATS, &[]))
                .flatten()
                .or_else(|| {
                    value
                        .get(..10)
                        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
                        .and_then(plausible)
                })
        })
}

/// Canonical test reason, `None` when the raw value is unknown
pub fn map_reason(value: &str) -> Option<&'static str> {
    let reason = match value.trim().to_lowercase().as_str() {
        "pre-employment" => "Pre-Employment",
        "reasonable suspicion/cause" | "reasonable suspicion / cause" => "Reasonable Suspicion",
        "post accident" | "post-accident" | "vehicle accident" => "Post Accident",
        "return to duty" | "rtw" | "return to work" | "company fit for duty" => "Return To Duty",
        "random" => "Random",
        "job requirement" | "prereq lift" => "Job Requirement",
        "followup" | "follow-up" => "Follow-Up",
        "other" => "Other",
        "pre-assignment" => "Pre-Assignment",
        "cdl recertification" => "CDL Recertification",
        "re-certification" | "recertification" => "Recertification",
        _ => return None,
    };
    Some(reason)
}

/// Canonical test result
///
/// Pending-state placeholders map to `""`; unknown results are title-cased.
pub fn map_result(value: &str) -> String {
    let key = value.trim().to_lowercase();
    let mapped = match key.as_str() {
        "negative" | "neg" => "Negative",
        "negative-dilute" | "negd" => "Negative-Dilute",
        "positive" | "pos" | "non-contact positive" => "Positive",
        "cancelled" | "canc" | "test cancelled" => "Cancelled",
        "lab reject" => "Lab Reject",
        k if PENDING_RESULTS.contains(&k) => "",
        _ => return title_case(&key),
    };
    mapped.to_string()
}

/// Laboratory name from any text mentioning it
pub fn map_laboratory(value: &str) -> &'static str {
    let v = value.to_lowercase();
    if v.contains("omega") {
        "Omega Laboratories"
    } else if v.contains("alere") {
        "Abbott Toxicology"
    } else if v.contains("quest") {
        "Quest Diagnostics"
    } else if v.contains("crl") || v.contains("clinical reference") {
        "Clinical Reference Laboratory"
    } else {
        ""
    }
}

/// `DOT` for regulated tests, `Non-DOT` for everything else
pub fn map_regulation(value: &str) -> &'static str {
    match value.trim().to_lowercase().as_str() {
        "yes" | "dot" | "dot-fmcsa" => "DOT",
        _ => "Non-DOT",
    }
}

/// Strip the `.0` spreadsheets append to numeric ids
pub fn strip_float_suffix(value: &str) -> String {
    let value = value.trim();
    value.strip_suffix(".0").unwrap_or(value).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test_case("03/14/2025", ymd(2025, 3, 14) ; "us slashes")]
    #[test_case("2025-03-14", ymd(2025, 3, 14) ; "iso")]
    #[test_case("3/4/2025", ymd(2025, 3, 4) ; "unpadded")]
    #[test_case("03/14/2025 09:30", ymd(2025, 3, 14) ; "us with time")]
    #[test_case("2025-03-14 09:30", ymd(2025, 3, 14) ; "iso with time")]
    #[test_case("03/14/25", ymd(2025, 3, 14) ; "two digit year")]
    #[test_case("2025-03-14T09:30:00Z", ymd(2025, 3, 14) ; "rfc3339")]
    #[test_case("2025-03-14T09:30:00", ymd(2025, 3, 14) ; "naive timestamp")]
    #[test_case("03/14/2025 9:30 AM", ymd(2025, 3, 14) ; "am pm")]
    #[test_case("March 14, 2025", ymd(2025, 3, 14) ; "month name")]
    #[test_case("03-14-2025", ymd(2025, 3, 14) ; "us dashes")]
    #[test_case("2025/03/14", ymd(2025, 3, 14) ; "iso slashes")]
    #[test_case("03/14/2025 10:00 CST", ymd(2025, 3, 14) ; "trailing zone")]
    #[test_case("N/A", None ; "not applicable")]
    #[test_case("", None ; "blank")]
    #[test_case("13/45/2025", None ; "impossible")]
    fn test_parse_date(input: &str, expected: Option<NaiveDate>) {
        assert_eq!(parse_date(input), expected);
    }

    #[test_case("Smith, John", "John", "Smith" ; "last comma first")]
    #[test_case("  DOE ,  jane ", "Jane", "Doe" ; "padded upper")]
    #[test_case("Madonna", "", "Madonna" ; "single token")]
    #[test_case("a, b, c", "", "A, B, C" ; "two commas")]
    #[test_case("", "", "" ; "blank")]
    fn test_split_name(input: &str, first: &str, last: &str) {
        assert_eq!(split_name(input), (first.to_string(), last.to_string()));
    }

    #[test_case("Pre-Employment", Some("Pre-Employment"))]
    #[test_case("  RTW ", Some("Return To Duty"))]
    #[test_case("vehicle accident", Some("Post Accident"))]
    #[test_case("Re-Certification", Some("Recertification"))]
    #[test_case("court ordered", None)]
    fn test_map_reason(input: &str, expected: Option<&str>) {
        assert_eq!(map_reason(input), expected);
    }

    #[test_case("NEG", "Negative")]
    #[test_case("negd", "Negative-Dilute")]
    #[test_case("Non-Contact Positive", "Positive")]
    #[test_case("Pending CCF", "")]
    #[test_case("sent to lab", "")]
    #[test_case("refusal to test", "Refusal To Test")]
    fn test_map_result(input: &str, expected: &str) {
        assert_eq!(map_result(input), expected);
    }

    #[test_case("OMEGA LABS", "Omega Laboratories")]
    #[test_case("Alere eCup", "Abbott Toxicology")]
    #[test_case("quest diagnostics", "Quest Diagnostics")]
    #[test_case("CRL", "Clinical Reference Laboratory")]
    #[test_case("Clinical Reference Lab", "Clinical Reference Laboratory")]
    #[test_case("LabCorp", "")]
    fn test_map_laboratory(input: &str, expected: &str) {
        assert_eq!(map_laboratory(input), expected);
    }

    #[test_case("Yes", "DOT")]
    #[test_case("DOT-FMCSA", "DOT")]
    #[test_case("no", "Non-DOT")]
    #[test_case("", "Non-DOT")]
    fn test_map_regulation(input: &str, expected: &str) {
        assert_eq!(map_regulation(input), expected);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("NORTH SIDE clinic"), "North Side Clinic");
        assert_eq!(title_case("o'neil-smith"), "O'Neil-Smith");
    }

    #[test]
    fn test_cell_matches_headers_case_insensitively() {
        let row: RawRow = [
            ("Donor Name ".to_string(), "Smith, John".to_string()),
            ("COST CENTER".to_string(), "".to_string()),
        ]
        .into_iter()
        .collect();

        assert_eq!(cell(&row, &["DonorName", "donor name"]), "Smith, John");
        assert_eq!(find_cell(&row, &["Cost Center"]), Some(""));
        assert_eq!(find_cell(&row, &["Client"]), None);
        assert_eq!(cell(&row, &["Client"]), "");
    }

    #[test]
    fn test_strip_float_suffix() {
        assert_eq!(strip_float_suffix("12345.0"), "12345");
        assert_eq!(strip_float_suffix(" 12345 "), "12345");
        assert_eq!(strip_float_suffix("1.05"), "1.05");
    }
}
