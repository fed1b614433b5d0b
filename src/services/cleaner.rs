//! Batch cleaning: coerce raw grid cells into typed values
//!
//! Cleaning never fails. Unparseable dates become "no value", unparseable
//! numbers become zero, and the row is kept either way.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::trace;

use crate::defaults::effort_percentage;
use crate::types::{is_blank_row, CellValue, Field, FieldKind, FormSchema, RawRow};

// Two-digit years first: `%Y` would read "25" as year 25
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y", "%Y/%m/%d", "%d.%m.%Y", "%B %d, %Y", "%b %d, %Y"];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%m/%d/%Y %H:%M"];

/// A coerced cell
#[derive(Debug, Clone, PartialEq)]
pub enum CleanValue {
    Text(String),
    Date(Option<NaiveDate>),
    Number(f64),
}

/// One row after coercion, keyed by canonical field
#[derive(Debug, Clone, PartialEq)]
pub struct CleanRow {
    /// 1-based position in the submitted batch
    pub row_number: usize,
    values: BTreeMap<Field, CleanValue>,
    /// Fields whose raw cell was blank or absent
    blank: BTreeSet<Field>,
    pub effort_percentage: f64,
}

impl CleanRow {
    /// Raw text of a text field, `""` when absent
    pub fn text(&self, field: Field) -> &str {
        match self.values.get(&field) {
            Some(CleanValue::Text(s)) => s,
            _ => "",
        }
    }

    pub fn date(&self, field: Field) -> Option<NaiveDate> {
        match self.values.get(&field) {
            Some(CleanValue::Date(d)) => *d,
            _ => None,
        }
    }

    pub fn number(&self, field: Field) -> f64 {
        match self.values.get(&field) {
            Some(CleanValue::Number(n)) => *n,
            _ => 0.0,
        }
    }

    pub fn hours_worked(&self) -> f64 {
        self.number(Field::HoursWorked)
    }

    /// Blank after string coercion; a date that could not be parsed counts as blank
    pub fn is_blank(&self, field: Field) -> bool {
        if self.blank.contains(&field) {
            return true;
        }
        match self.values.get(&field) {
            None => true,
            Some(CleanValue::Text(s)) => s.trim().is_empty(),
            Some(CleanValue::Date(d)) => d.is_none(),
            Some(CleanValue::Number(_)) => false,
        }
    }

    /// Non-blank accomplishment texts in slot order
    pub fn accomplishments(&self) -> Vec<&str> {
        Field::ACCOMPLISHMENT_SLOTS
            .iter()
            .filter(|f| !self.is_blank(**f))
            .map(|f| self.text(*f).trim())
            .collect()
    }
}

/// Clean every non-blank row of a batch. Row numbers keep the batch's own
/// positions so violations point at the row the user sees.
pub fn clean_batch(rows: &[RawRow], schema: &FormSchema) -> Vec<CleanRow> {
    rows.iter()
        .enumerate()
        .filter(|(_, row)| !is_blank_row(row))
        .map(|(i, row)| clean_row(i + 1, row, schema))
        .collect()
}

pub fn clean_row(row_number: usize, row: &RawRow, schema: &FormSchema) -> CleanRow {
    let mut values = BTreeMap::new();
    let mut blank = BTreeSet::new();

    for (key, cell) in row {
        let Some(column) = schema.column_for_key(key) else {
            trace!(row = row_number, column = %key, "Ignoring undeclared column");
            continue;
        };
        if cell.is_blank() {
            blank.insert(column.field);
        }
        let value = match column.kind {
            FieldKind::Date => CleanValue::Date(parse_date(cell)),
            FieldKind::Number => CleanValue::Number(parse_number(cell)),
            FieldKind::Text => CleanValue::Text(cell.as_text()),
        };
        values.insert(column.field, value);
    }

    // Declared columns missing from the row still get their default
    for column in &schema.columns {
        values.entry(column.field).or_insert_with(|| {
            blank.insert(column.field);
            match column.kind {
                FieldKind::Date => CleanValue::Date(None),
                FieldKind::Number => CleanValue::Number(0.0),
                FieldKind::Text => CleanValue::Text(String::new()),
            }
        });
    }

    let hours = match values.get(&Field::HoursWorked) {
        Some(CleanValue::Number(n)) => *n,
        _ => 0.0,
    };

    CleanRow {
        row_number,
        values,
        blank,
        effort_percentage: effort_percentage(hours),
    }
}

/// Permissive date parsing; anything unrecognised is `None`
pub fn parse_date(cell: &CellValue) -> Option<NaiveDate> {
    let CellValue::Text(raw) = cell else {
        return None;
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.date());
        }
    }
    None
}

/// Permissive number parsing; anything unrecognised is `0.0`
pub fn parse_number(cell: &CellValue) -> f64 {
    let value = match cell {
        CellValue::Number(n) => *n,
        CellValue::Text(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        CellValue::Bool(b) => f64::from(u8::from(*b)),
        CellValue::Null => 0.0,
    };
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
