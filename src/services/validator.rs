//! Row validation gates: a batch with any violation is rejected whole

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::defaults::ACCOMPLISHMENTS_PER_WEEK;
use crate::services::cleaner::CleanRow;
use crate::services::normalize::normalize_text;
use crate::types::{AccomplishmentCountViolation, Field, FormSchema, Violation, ViolationRule};

/// Rows (1-based) with at least one blank required field
pub fn required_fields_present(rows: &[CleanRow], required: &[Field]) -> Vec<usize> {
    rows.iter()
        .filter(|row| required.iter().any(|field| row.is_blank(*field)))
        .map(|row| row.row_number)
        .collect()
}

/// One violation per blank required cell, labelled with the schema's headers
pub fn required_field_violations(rows: &[CleanRow], schema: &FormSchema) -> Vec<Violation> {
    let required = schema.required_fields();
    let mut violations = Vec::new();

    for row in rows {
        for field in required.iter().filter(|f| row.is_blank(**f)) {
            violations.push(Violation {
                row: row.row_number,
                rule: ViolationRule::RequiredField,
                detail: format!("'{}' is required", schema.label(*field)),
            });
        }
    }
    violations
}

/// Groups by (contractor, week) whose accomplishment total is not exactly five.
///
/// A contractor may spread the five across several rows of the same week, so
/// the count is summed over the group. Contractor names are compared
/// normalized; groups come back in order of first appearance.
pub fn validate_accomplishment_count(rows: &[CleanRow]) -> Vec<AccomplishmentCountViolation> {
    let mut order: Vec<(String, Option<NaiveDate>)> = Vec::new();
    let mut groups: HashMap<(String, Option<NaiveDate>), (usize, usize)> = HashMap::new();

    for row in rows {
        let key = (normalize_text(row.text(Field::ContractorName)), row.date(Field::ReportingWeek));
        let count = row.accomplishments().len();
        match groups.get_mut(&key) {
            Some((total, _)) => *total += count,
            None => {
                groups.insert(key.clone(), (count, row.row_number));
                order.push(key);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| {
            let (total, first_row) = groups[&key];
            (total != ACCOMPLISHMENTS_PER_WEEK).then(|| AccomplishmentCountViolation {
                contractor: key.0,
                week: key.1,
                actual_count: total,
                first_row,
            })
        })
        .collect()
}

impl From<AccomplishmentCountViolation> for Violation {
    fn from(v: AccomplishmentCountViolation) -> Self {
        let week = v
            .week
            .map(|w| w.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "unknown week".to_string());
        Violation {
            row: v.first_row,
            rule: ViolationRule::AccomplishmentCount,
            detail: format!(
                "{} has {} accomplishment(s) for week {}; exactly {} are required",
                v.contractor, v.actual_count, week, ACCOMPLISHMENTS_PER_WEEK
            ),
        }
    }
}
