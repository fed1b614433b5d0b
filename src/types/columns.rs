//! Column mapping configuration
//!
//! The grid forms use human-readable headers. A `ColumnMapping` translates
//! them into canonical fields, declares which ones are required and how each
//! cell is coerced. The mapping is validated once at startup.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const COLUMN_MAPPING_VERSION: u32 = 1;

/// How a column's raw cells are coerced by the batch cleaner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Date,
    Number,
    Text,
}

/// Canonical field names the pipeline understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    ReportingWeek,
    VendorName,
    DivisionCommand,
    WorkProductTitle,
    ContributionDescription,
    Status,
    PlannedOrUnplanned,
    DateCompleted,
    DistinctNfr,
    DistinctCap,
    HoursWorked,
    ContractorName,
    GovtTaName,
    LaborCategory,
    Workstream,
    #[serde(rename = "accomplishment_1")]
    Accomplishment1,
    #[serde(rename = "accomplishment_2")]
    Accomplishment2,
    #[serde(rename = "accomplishment_3")]
    Accomplishment3,
    #[serde(rename = "accomplishment_4")]
    Accomplishment4,
    #[serde(rename = "accomplishment_5")]
    Accomplishment5,
}

impl Field {
    pub const ACCOMPLISHMENT_SLOTS: [Field; 5] = [
        Field::Accomplishment1,
        Field::Accomplishment2,
        Field::Accomplishment3,
        Field::Accomplishment4,
        Field::Accomplishment5,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Field::ReportingWeek => "reporting_week",
            Field::VendorName => "vendor_name",
            Field::DivisionCommand => "division_command",
            Field::WorkProductTitle => "work_product_title",
            Field::ContributionDescription => "contribution_description",
            Field::Status => "status",
            Field::PlannedOrUnplanned => "planned_or_unplanned",
            Field::DateCompleted => "date_completed",
            Field::DistinctNfr => "distinct_nfr",
            Field::DistinctCap => "distinct_cap",
            Field::HoursWorked => "hours_worked",
            Field::ContractorName => "contractor_name",
            Field::GovtTaName => "govt_ta_name",
            Field::LaborCategory => "labor_category",
            Field::Workstream => "workstream",
            Field::Accomplishment1 => "accomplishment_1",
            Field::Accomplishment2 => "accomplishment_2",
            Field::Accomplishment3 => "accomplishment_3",
            Field::Accomplishment4 => "accomplishment_4",
            Field::Accomplishment5 => "accomplishment_5",
        }
    }

    /// The only kind a field may be declared with
    pub fn canonical_kind(self) -> FieldKind {
        match self {
            Field::ReportingWeek | Field::DateCompleted => FieldKind::Date,
            Field::HoursWorked => FieldKind::Number,
            _ => FieldKind::Text,
        }
    }

    pub fn is_accomplishment_slot(self) -> bool {
        Self::ACCOMPLISHMENT_SLOTS.contains(&self)
    }
}

/// Which form a schema describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormKind {
    WeeklyReport,
    Accomplishments,
}

impl FormKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FormKind::WeeklyReport => "weekly_report",
            FormKind::Accomplishments => "accomplishments",
        }
    }
}

/// One declared grid column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    pub field: Field,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    pub kind: FieldKind,
}

impl ColumnSpec {
    fn new(field: Field, label: &str, required: bool) -> Self {
        Self {
            field,
            label: label.to_string(),
            required,
            kind: field.canonical_kind(),
        }
    }
}

/// All columns of one grid form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSchema {
    pub form: FormKind,
    pub columns: Vec<ColumnSpec>,
}

impl FormSchema {
    pub fn default_weekly_reports() -> Self {
        Self {
            form: FormKind::WeeklyReport,
            columns: vec![
                ColumnSpec::new(Field::ReportingWeek, "Reporting Week", true),
                ColumnSpec::new(Field::VendorName, "Vendor Name", true),
                ColumnSpec::new(Field::DivisionCommand, "Division/Command", false),
                ColumnSpec::new(Field::WorkProductTitle, "Work Product Title", true),
                ColumnSpec::new(Field::ContributionDescription, "Contribution Description", false),
                ColumnSpec::new(Field::Status, "Status", false),
                ColumnSpec::new(Field::PlannedOrUnplanned, "Planned/Unplanned", false),
                ColumnSpec::new(Field::DateCompleted, "Date Completed", false),
                ColumnSpec::new(Field::DistinctNfr, "Distinct NFR", false),
                ColumnSpec::new(Field::DistinctCap, "Distinct CAP", false),
                ColumnSpec::new(Field::HoursWorked, "Hours", false),
                ColumnSpec::new(Field::ContractorName, "Contractor Name", true),
                ColumnSpec::new(Field::GovtTaName, "Govt TA Name", false),
                ColumnSpec::new(Field::LaborCategory, "Labor Category", false),
            ],
        }
    }

    pub fn default_accomplishments() -> Self {
        Self {
            form: FormKind::Accomplishments,
            columns: vec![
                ColumnSpec::new(Field::ContractorName, "Contractor Name", true),
                ColumnSpec::new(Field::ReportingWeek, "Reporting Week", true),
                ColumnSpec::new(Field::Workstream, "Workstream", true),
                ColumnSpec::new(Field::Accomplishment1, "Accomplishment 1", false),
                ColumnSpec::new(Field::Accomplishment2, "Accomplishment 2", false),
                ColumnSpec::new(Field::Accomplishment3, "Accomplishment 3", false),
                ColumnSpec::new(Field::Accomplishment4, "Accomplishment 4", false),
                ColumnSpec::new(Field::Accomplishment5, "Accomplishment 5", false),
            ],
        }
    }

    /// Resolve a cell key (display label or canonical field name) to its column
    pub fn column_for_key(&self, key: &str) -> Option<&ColumnSpec> {
        let key = key.trim();
        self.columns
            .iter()
            .find(|c| c.label.trim().eq_ignore_ascii_case(key) || c.field.key() == key)
    }

    pub fn column(&self, field: Field) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.field == field)
    }

    pub fn has_field(&self, field: Field) -> bool {
        self.column(field).is_some()
    }

    pub fn required_fields(&self) -> Vec<Field> {
        self.columns.iter().filter(|c| c.required).map(|c| c.field).collect()
    }

    pub fn accomplishment_slots(&self) -> Vec<Field> {
        Field::ACCOMPLISHMENT_SLOTS
            .iter()
            .copied()
            .filter(|f| self.has_field(*f))
            .collect()
    }

    pub fn label(&self, field: Field) -> &str {
        self.column(field).map(|c| c.label.as_str()).unwrap_or(field.key())
    }

    pub fn validate(&self) -> std::result::Result<(), ColumnMappingError> {
        let mut labels = HashSet::new();
        let mut fields = HashSet::new();

        for column in &self.columns {
            if column.label.trim().is_empty() {
                return Err(ColumnMappingError::BlankLabel { field: column.field.key() });
            }
            if !labels.insert(column.label.trim().to_lowercase()) {
                return Err(ColumnMappingError::DuplicateLabel(column.label.clone()));
            }
            if !fields.insert(column.field) {
                return Err(ColumnMappingError::DuplicateField(column.field.key()));
            }
            if column.kind != column.field.canonical_kind() {
                return Err(ColumnMappingError::KindMismatch {
                    field: column.field.key(),
                    expected: column.field.canonical_kind(),
                    found: column.kind,
                });
            }
        }

        for field in [Field::ContractorName, Field::ReportingWeek] {
            match self.column(field) {
                None => return Err(ColumnMappingError::MissingField { form: self.form, field: field.key() }),
                Some(c) if !c.required => {
                    return Err(ColumnMappingError::MustBeRequired { form: self.form, field: field.key() })
                }
                Some(_) => {}
            }
        }

        match self.form {
            FormKind::WeeklyReport => {
                for field in [Field::WorkProductTitle, Field::HoursWorked] {
                    if !self.has_field(field) {
                        return Err(ColumnMappingError::MissingField { form: self.form, field: field.key() });
                    }
                }
            }
            FormKind::Accomplishments => {
                if self.accomplishment_slots().is_empty() {
                    return Err(ColumnMappingError::NoAccomplishmentSlots);
                }
            }
        }

        Ok(())
    }
}

/// Versioned mapping for both grid forms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    pub version: u32,
    pub weekly_reports: FormSchema,
    pub accomplishments: FormSchema,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            version: COLUMN_MAPPING_VERSION,
            weekly_reports: FormSchema::default_weekly_reports(),
            accomplishments: FormSchema::default_accomplishments(),
        }
    }
}

impl ColumnMapping {
    /// Load and validate a mapping from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read column mapping {}", path.display()))?;
        let mapping: ColumnMapping = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid column mapping JSON in {}", path.display()))?;
        mapping.validate()?;
        Ok(mapping)
    }

    /// Mapping from `path` if given, otherwise the built-in default
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ColumnMappingError> {
        if self.version != COLUMN_MAPPING_VERSION {
            return Err(ColumnMappingError::UnsupportedVersion(self.version));
        }
        if self.weekly_reports.form != FormKind::WeeklyReport {
            return Err(ColumnMappingError::WrongForm { expected: FormKind::WeeklyReport });
        }
        if self.accomplishments.form != FormKind::Accomplishments {
            return Err(ColumnMappingError::WrongForm { expected: FormKind::Accomplishments });
        }
        self.weekly_reports.validate()?;
        self.accomplishments.validate()
    }

    pub fn schema(&self, form: FormKind) -> &FormSchema {
        match form {
            FormKind::WeeklyReport => &self.weekly_reports,
            FormKind::Accomplishments => &self.accomplishments,
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ColumnMappingError {
    #[error("unsupported column mapping version {0} (expected {expected})", expected = COLUMN_MAPPING_VERSION)]
    UnsupportedVersion(u32),
    #[error("schema declared under the wrong form, expected {expected:?}")]
    WrongForm { expected: FormKind },
    #[error("column for '{field}' has a blank label")]
    BlankLabel { field: &'static str },
    #[error("duplicate column label '{0}'")]
    DuplicateLabel(String),
    #[error("field '{0}' is mapped more than once")]
    DuplicateField(&'static str),
    #[error("field '{field}' must be {expected:?}, mapping declares {found:?}")]
    KindMismatch { field: &'static str, expected: FieldKind, found: FieldKind },
    #[error("{form:?} form must declare '{field}'")]
    MissingField { form: FormKind, field: &'static str },
    #[error("{form:?} form must mark '{field}' as required")]
    MustBeRequired { form: FormKind, field: &'static str },
    #[error("accomplishments form declares no accomplishment slots")]
    NoAccomplishmentSlots,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mapping_is_valid() {
        assert_eq!(ColumnMapping::default().validate(), Ok(()));
    }

    #[test]
    fn test_column_for_key_accepts_label_or_field_name() {
        let schema = FormSchema::default_weekly_reports();
        assert_eq!(schema.column_for_key("Hours").unwrap().field, Field::HoursWorked);
        assert_eq!(schema.column_for_key(" contractor name ").unwrap().field, Field::ContractorName);
        assert_eq!(schema.column_for_key("hours_worked").unwrap().field, Field::HoursWorked);
        assert!(schema.column_for_key("Unrelated").is_none());
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let mut schema = FormSchema::default_weekly_reports();
        schema.columns.iter_mut().find(|c| c.field == Field::HoursWorked).unwrap().kind = FieldKind::Text;
        assert!(matches!(schema.validate(), Err(ColumnMappingError::KindMismatch { field: "hours_worked", .. })));
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let mut schema = FormSchema::default_accomplishments();
        schema.columns[4].label = "accomplishment 1".into();
        assert_eq!(
            schema.validate(),
            Err(ColumnMappingError::DuplicateLabel("accomplishment 1".into()))
        );
    }

    #[test]
    fn test_contractor_must_be_required() {
        let mut schema = FormSchema::default_accomplishments();
        schema.columns[0].required = false;
        assert!(matches!(schema.validate(), Err(ColumnMappingError::MustBeRequired { .. })));
    }

    #[test]
    fn test_accomplishments_form_needs_slots() {
        let mut schema = FormSchema::default_accomplishments();
        schema.columns.retain(|c| !c.field.is_accomplishment_slot());
        assert_eq!(schema.validate(), Err(ColumnMappingError::NoAccomplishmentSlots));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let mapping = ColumnMapping { version: 7, ..ColumnMapping::default() };
        assert_eq!(mapping.validate(), Err(ColumnMappingError::UnsupportedVersion(7)));
    }

    #[test]
    fn test_mapping_json_roundtrip_uses_snake_case_fields() {
        let json = serde_json::to_string(&ColumnMapping::default()).unwrap();
        assert!(json.contains("\"field\":\"accomplishment_3\""));
        assert!(json.contains("\"form\":\"weekly_report\""));
        let back: ColumnMapping = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ColumnMapping::default());
    }
}
