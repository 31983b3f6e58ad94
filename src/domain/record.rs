//! Canonical record model
//!
//! Every source is mapped into [`CanonicalRecord`], a fixed, ordered set of sixteen
//! fields. [`CanonicalField`] names those fields and knows how each one is spelled
//! in the CRM API and in the staging table.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One raw tabular row as produced by a source extractor (header -> cell text)
pub type RawRow = BTreeMap<String, String>;

/// Canonical field names in schema order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalField {
    Company,
    Code,
    Ccfid,
    FirstName,
    LastName,
    PrimaryId,
    CollectionDate,
    TestReason,
    TestResult,
    TestType,
    Regulation,
    MroReceived,
    Laboratory,
    CollectionSite,
    CollectionSiteId,
    Location,
}

impl CanonicalField {
    /// All fields in canonical order
    pub const ALL: [CanonicalField; 16] = [
        CanonicalField::Company,
        CanonicalField::Code,
        CanonicalField::Ccfid,
        CanonicalField::FirstName,
        CanonicalField::LastName,
        CanonicalField::PrimaryId,
        CanonicalField::CollectionDate,
        CanonicalField::TestReason,
        CanonicalField::TestResult,
        CanonicalField::TestType,
        CanonicalField::Regulation,
        CanonicalField::MroReceived,
        CanonicalField::Laboratory,
        CanonicalField::CollectionSite,
        CanonicalField::CollectionSiteId,
        CanonicalField::Location,
    ];

    /// Field name used by the CRM API and in exported JSON
    pub fn api_name(self) -> &'static str {
        match self {
            CanonicalField::Company => "Company",
            CanonicalField::Code => "Code",
            CanonicalField::Ccfid => "CCFID",
            CanonicalField::FirstName => "First_Name",
            CanonicalField::LastName => "Last_Name",
            CanonicalField::PrimaryId => "Primary_ID",
            CanonicalField::CollectionDate => "Collection_Date",
            CanonicalField::TestReason => "Test_Reason",
            CanonicalField::TestResult => "Test_Result",
            CanonicalField::TestType => "Test_Type",
            CanonicalField::Regulation => "Regulation",
            CanonicalField::MroReceived => "MRO_Received",
            CanonicalField::Laboratory => "Laboratory",
            CanonicalField::CollectionSite => "Collection_Site",
            CanonicalField::CollectionSiteId => "Collection_Site_ID",
            CanonicalField::Location => "Location",
        }
    }

    /// Column name in the staging table
    pub fn column_name(self) -> &'static str {
        match self {
            CanonicalField::Company => "company_name",
            CanonicalField::Code => "company_code",
            CanonicalField::Ccfid => "ccfid",
            CanonicalField::FirstName => "first_name",
            CanonicalField::LastName => "last_name",
            CanonicalField::PrimaryId => "primary_id",
            CanonicalField::CollectionDate => "collection_date",
            CanonicalField::TestReason => "test_reason",
            CanonicalField::TestResult => "test_result",
            CanonicalField::TestType => "test_type",
            CanonicalField::Regulation => "regulation",
            CanonicalField::MroReceived => "mro_received",
            CanonicalField::Laboratory => "laboratory",
            CanonicalField::CollectionSite => "collection_site",
            CanonicalField::CollectionSiteId => "collection_site_id",
            CanonicalField::Location => "location",
        }
    }

    /// Whether the field holds a calendar date
    pub fn is_date(self) -> bool {
        matches!(
            self,
            CanonicalField::CollectionDate | CanonicalField::MroReceived
        )
    }

    /// Whether a reviewer may correct this field
    ///
    /// The natural key and the donor identifier come from the source only.
    pub fn is_editable(self) -> bool {
        !matches!(self, CanonicalField::Ccfid | CanonicalField::PrimaryId)
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

impl FromStr for CanonicalField {
    type Err = String;

    /// Accepts either the API name or the staging column name, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        CanonicalField::ALL
            .iter()
            .copied()
            .find(|field| {
                field.api_name().eq_ignore_ascii_case(wanted)
                    || field.column_name().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| format!("Unknown field '{wanted}'"))
    }
}

/// A test event in canonical form
///
/// Every field is always present; text fields use the empty string for "unknown"
/// and the two date fields use `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    #[serde(rename = "Company")]
    pub company: String,
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "CCFID")]
    pub ccfid: String,
    #[serde(rename = "First_Name")]
    pub first_name: String,
    #[serde(rename = "Last_Name")]
    pub last_name: String,
    #[serde(rename = "Primary_ID")]
    pub primary_id: String,
    #[serde(rename = "Collection_Date")]
    pub collection_date: Option<NaiveDate>,
    #[serde(rename = "Test_Reason")]
    pub test_reason: String,
    #[serde(rename = "Test_Result")]
    pub test_result: String,
    #[serde(rename = "Test_Type")]
    pub test_type: String,
    #[serde(rename = "Regulation")]
    pub regulation: String,
    #[serde(rename = "MRO_Received")]
    pub mro_received: Option<NaiveDate>,
    #[serde(rename = "Laboratory")]
    pub laboratory: String,
    #[serde(rename = "Collection_Site")]
    pub collection_site: String,
    #[serde(rename = "Collection_Site_ID")]
    pub collection_site_id: String,
    #[serde(rename = "Location")]
    pub location: String,
}

impl CanonicalRecord {
    /// Borrow a text field; `None` for the two date fields
    pub fn text(&self, field: CanonicalField) -> Option<&str> {
        let value = match field {
            CanonicalField::Company => &self.company,
            CanonicalField::Code => &self.code,
            CanonicalField::Ccfid => &self.ccfid,
            CanonicalField::FirstName => &self.first_name,
            CanonicalField::LastName => &self.last_name,
            CanonicalField::PrimaryId => &self.primary_id,
            CanonicalField::TestReason => &self.test_reason,
            CanonicalField::TestResult => &self.test_result,
            CanonicalField::TestType => &self.test_type,
            CanonicalField::Regulation => &self.regulation,
            CanonicalField::Laboratory => &self.laboratory,
            CanonicalField::CollectionSite => &self.collection_site,
            CanonicalField::CollectionSiteId => &self.collection_site_id,
            CanonicalField::Location => &self.location,
            CanonicalField::CollectionDate | CanonicalField::MroReceived => return None,
        };
        Some(value.as_str())
    }

    /// Read a date field; `None` for text fields or unset dates
    pub fn date(&self, field: CanonicalField) -> Option<NaiveDate> {
        match field {
            CanonicalField::CollectionDate => self.collection_date,
            CanonicalField::MroReceived => self.mro_received,
            _ => None,
        }
    }

    /// Render any field as text (dates as `YYYY-MM-DD`, unset as empty)
    pub fn display(&self, field: CanonicalField) -> String {
        if field.is_date() {
            return self
                .date(field)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
        }
        self.text(field).unwrap_or_default().to_string()
    }

    /// Whether a field is empty or whitespace only
    pub fn is_blank(&self, field: CanonicalField) -> bool {
        if field.is_date() {
            return self.date(field).is_none();
        }
        self.text(field).map(|v| v.trim().is_empty()).unwrap_or(true)
    }

    /// Overwrite a text field
    pub fn set_text(&mut self, field: CanonicalField, value: impl Into<String>) -> Result<(), String> {
        let slot = match field {
            CanonicalField::Company => &mut self.company,
            CanonicalField::Code => &mut self.code,
            CanonicalField::Ccfid => &mut self.ccfid,
            CanonicalField::FirstName => &mut self.first_name,
            CanonicalField::LastName => &mut self.last_name,
            CanonicalField::PrimaryId => &mut self.primary_id,
            CanonicalField::TestReason => &mut self.test_reason,
            CanonicalField::TestResult => &mut self.test_result,
            CanonicalField::TestType => &mut self.test_type,
            CanonicalField::Regulation => &mut self.regulation,
            CanonicalField::Laboratory => &mut self.laboratory,
            CanonicalField::CollectionSite => &mut self.collection_site,
            CanonicalField::CollectionSiteId => &mut self.collection_site_id,
            CanonicalField::Location => &mut self.location,
            CanonicalField::CollectionDate | CanonicalField::MroReceived => {
                return Err(format!("{field} is a date field"));
            }
        };
        *slot = value.into();
        Ok(())
    }

    /// Overwrite a date field
    pub fn set_date(&mut self, field: CanonicalField, value: Option<NaiveDate>) -> Result<(), String> {
        match field {
            CanonicalField::CollectionDate => self.collection_date = value,
            CanonicalField::MroReceived => self.mro_received = value,
            _ => return Err(format!("{field} is not a date field")),
        }
        Ok(())
    }

    /// The (site id, site name) pair, when the record names a collection site
    pub fn site(&self) -> Option<(&str, &str)> {
        let id = self.collection_site_id.trim();
        if id.is_empty() {
            None
        } else {
            Some((id, self.collection_site.trim()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_order_and_names() {
        let names: Vec<&str> = CanonicalField::ALL.iter().map(|f| f.api_name()).collect();
        assert_eq!(names.len(), 16);
        assert_eq!(names[0], "Company");
        assert_eq!(names[2], "CCFID");
        assert_eq!(names[15], "Location");
    }

    #[test]
    fn test_field_from_str_accepts_both_spellings() {
        assert_eq!(
            CanonicalField::from_str("test_result").unwrap(),
            CanonicalField::TestResult
        );
        assert_eq!(
            CanonicalField::from_str("Collection_Site_ID").unwrap(),
            CanonicalField::CollectionSiteId
        );
        assert_eq!(
            CanonicalField::from_str("company_name").unwrap(),
            CanonicalField::Company
        );
        assert!(CanonicalField::from_str("nope").is_err());
    }

    #[test]
    fn test_editable_fields() {
        assert!(!CanonicalField::Ccfid.is_editable());
        assert!(!CanonicalField::PrimaryId.is_editable());
        assert!(CanonicalField::Location.is_editable());
    }

    #[test]
    fn test_set_and_display() {
        let mut record = CanonicalRecord::default();
        record.set_text(CanonicalField::TestResult, "Negative").unwrap();
        record
            .set_date(
                CanonicalField::CollectionDate,
                NaiveDate::from_ymd_opt(2025, 3, 14),
            )
            .unwrap();

        assert_eq!(record.display(CanonicalField::TestResult), "Negative");
        assert_eq!(record.display(CanonicalField::CollectionDate), "2025-03-14");
        assert_eq!(record.display(CanonicalField::MroReceived), "");
        assert!(record.set_text(CanonicalField::MroReceived, "x").is_err());
        assert!(record.set_date(CanonicalField::Location, None).is_err());
    }

    #[test]
    fn test_is_blank() {
        let mut record = CanonicalRecord::default();
        assert!(record.is_blank(CanonicalField::Location));
        record.location = "   ".to_string();
        assert!(record.is_blank(CanonicalField::Location));
        record.location = "Yard 4".to_string();
        assert!(!record.is_blank(CanonicalField::Location));
        assert!(record.is_blank(CanonicalField::CollectionDate));
    }

    #[test]
    fn test_serialized_names() {
        let record = CanonicalRecord {
            ccfid: "X1".to_string(),
            collection_date: NaiveDate::from_ymd_opt(2025, 1, 2),
            ..Default::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["CCFID"], "X1");
        assert_eq!(json["Collection_Date"], "2025-01-02");
        assert!(json["MRO_Received"].is_null());
    }
}
