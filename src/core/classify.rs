//! Completeness classification
//!
//! A record is complete when every canonical field is filled in, except that
//! Location only matters for the site-required company code and Laboratory
//! does not matter for test types that never go to a lab.

use crate::config::schema::PipelineConfig;
use crate::domain::record::{CanonicalField, CanonicalRecord};
use serde::Serialize;

/// Whether a record can be pushed or must wait for review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompletenessClass {
    Complete,
    Incomplete,
}

/// The two contextual exemptions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierRules {
    pub site_required_code: String,
    pub lab_exempt_test_types: Vec<String>,
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for ClassifierRules {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            site_required_code: config.site_required_code.trim().to_string(),
            lab_exempt_test_types: config
                .lab_exempt_test_types
                .iter()
                .map(|t| t.trim().to_string())
                .collect(),
        }
    }
}

impl ClassifierRules {
    fn is_required(&self, record: &CanonicalRecord, field: CanonicalField) -> bool {
        match field {
            CanonicalField::Location => record.code.trim() == self.site_required_code,
            CanonicalField::Laboratory => !self
                .lab_exempt_test_types
                .iter()
                .any(|t| t == record.test_type.trim()),
            _ => true,
        }
    }

    /// Required fields that are blank, in canonical order
    pub fn missing_fields(&self, record: &CanonicalRecord) -> Vec<CanonicalField> {
        CanonicalField::ALL
            .into_iter()
            .filter(|&field| self.is_required(record, field) && record.is_blank(field))
            .collect()
    }

    pub fn classify(&self, record: &CanonicalRecord) -> CompletenessClass {
        if self.missing_fields(record).is_empty() {
            CompletenessClass::Complete
        } else {
            CompletenessClass::Incomplete
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn complete_record(ccfid: &str) -> CanonicalRecord {
        CanonicalRecord {
            company: "Acme Trucking LLC".into(),
            code: "A1001".into(),
            ccfid: ccfid.into(),
            first_name: "John".into(),
            last_name: "Smith".into(),
            primary_id: "999".into(),
            collection_date: NaiveDate::from_ymd_opt(2025, 3, 14),
            test_reason: "Random".into(),
            test_result: "Negative".into(),
            test_type: "Lab Based Urine Test".into(),
            regulation: "DOT".into(),
            mro_received: NaiveDate::from_ymd_opt(2025, 3, 17),
            laboratory: "Quest Diagnostics".into(),
            collection_site: "North Side Clinic".into(),
            collection_site_id: "5501".into(),
            location: "None".into(),
        }
    }

    #[test]
    fn test_complete_record() {
        let rules = ClassifierRules::default();
        assert_eq!(rules.classify(&complete_record("A")), CompletenessClass::Complete);
    }

    #[test]
    fn test_location_exemption() {
        let rules = ClassifierRules::default();
        let mut record = complete_record("A");
        record.location = String::new();
        assert_eq!(rules.classify(&record), CompletenessClass::Complete);

        record.code = "A1310".into();
        assert_eq!(rules.classify(&record), CompletenessClass::Incomplete);
        assert_eq!(rules.missing_fields(&record), vec![CanonicalField::Location]);
    }

    #[test]
    fn test_laboratory_exemption() {
        let rules = ClassifierRules::default();
        let mut record = complete_record("A");
        record.laboratory = " ".into();
        record.test_type = "POCT Urine Test".into();
        assert_eq!(rules.classify(&record), CompletenessClass::Complete);

        record.test_type = "Lab Based Urine Test".into();
        assert_eq!(rules.classify(&record), CompletenessClass::Incomplete);
    }

    #[test]
    fn test_missing_fields_in_order() {
        let rules = ClassifierRules::default();
        let mut record = complete_record("A");
        record.test_result.clear();
        record.mro_received = None;
        record.company.clear();
        assert_eq!(
            rules.missing_fields(&record),
            vec![
                CanonicalField::Company,
                CanonicalField::TestResult,
                CanonicalField::MroReceived
            ]
        );
    }

    #[test]
    fn test_rules_from_config() {
        let config = PipelineConfig {
            site_required_code: "B2000".into(),
            lab_exempt_test_types: vec!["Physical".into()],
        };
        let rules = ClassifierRules::from(&config);
        let mut record = complete_record("A");
        record.code = "B2000".into();
        record.location.clear();
        assert_eq!(rules.classify(&record), CompletenessClass::Incomplete);

        record.code = "A1001".into();
        record.test_type = "Physical".into();
        record.laboratory.clear();
        assert_eq!(rules.classify(&record), CompletenessClass::Complete);
    }
}
