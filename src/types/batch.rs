//! Tabular batch types handed over by the form layer

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single raw cell as edited in the grid form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Null
    }
}

impl CellValue {
    /// Blank means no value, or only whitespace after string coercion
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(n) => n.is_nan(),
            CellValue::Bool(_) => false,
        }
    }

    /// String coercion used for required-field checks and text columns
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Number(n) if n.is_nan() => String::new(),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            CellValue::Number(n) => n.to_string(),
            CellValue::Text(s) => s.clone(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

/// One grid row: column header (display label) -> raw cell
pub type RawRow = BTreeMap<String, CellValue>;

/// Ordered rows exactly as the user left them in the editor
pub type TabularBatch = Vec<RawRow>;

/// True when every cell in the row is blank
pub fn is_blank_row(row: &RawRow) -> bool {
    row.values().all(CellValue::is_blank)
}

/// Request payload for both submission subjects
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBatchRequest {
    pub rows: TabularBatch,
    #[serde(default)]
    pub entered_by: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_deserializes_untagged() {
        let row: RawRow = serde_json::from_str(
            r#"{"Contractor Name": "Jane Doe", "Hours": 20, "Date Completed": null, "Flag": true}"#,
        )
        .unwrap();
        assert_eq!(row["Contractor Name"], CellValue::Text("Jane Doe".into()));
        assert_eq!(row["Hours"], CellValue::Number(20.0));
        assert_eq!(row["Date Completed"], CellValue::Null);
        assert_eq!(row["Flag"], CellValue::Bool(true));
    }

    #[test]
    fn test_as_text_formats_whole_numbers_without_fraction() {
        assert_eq!(CellValue::Number(40.0).as_text(), "40");
        assert_eq!(CellValue::Number(7.5).as_text(), "7.5");
    }

    #[test]
    fn test_blank_row_detection() {
        let mut row = RawRow::new();
        row.insert("A".into(), CellValue::Text("   ".into()));
        row.insert("B".into(), CellValue::Null);
        assert!(is_blank_row(&row));

        row.insert("C".into(), CellValue::Number(0.0));
        assert!(!is_blank_row(&row));
    }

    #[test]
    fn test_submit_request_entered_by_optional() {
        let req: SubmitBatchRequest = serde_json::from_str(r#"{"rows": []}"#).unwrap();
        assert!(req.entered_by.is_none());
        assert!(req.rows.is_empty());
    }
}
