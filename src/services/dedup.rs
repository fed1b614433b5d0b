//! Duplicate detection by natural key
//!
//! Candidates are compared against a snapshot of existing keys loaded once
//! per batch, plus every key already seen earlier in the same batch.

use std::collections::HashSet;
use std::hash::Hash;

use chrono::NaiveDate;

use crate::services::normalize::normalize_text;
use crate::types::{AccomplishmentKeyRow, NewAccomplishment, NewWeeklyReport, WeeklyReportKeyRow};

/// (employee, week, normalized work product title)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WeeklyReportKey {
    pub employee_id: i64,
    pub week: Option<NaiveDate>,
    pub title: String,
}

impl WeeklyReportKey {
    pub fn new(employee_id: i64, week: Option<NaiveDate>, title: &str) -> Self {
        Self {
            employee_id,
            week,
            title: normalize_text(title),
        }
    }
}

impl From<&WeeklyReportKeyRow> for WeeklyReportKey {
    fn from(row: &WeeklyReportKeyRow) -> Self {
        Self::new(row.employee_id, row.week_start_date, &row.work_product_title)
    }
}

impl From<&NewWeeklyReport> for WeeklyReportKey {
    fn from(report: &NewWeeklyReport) -> Self {
        Self::new(report.employee_id, report.week_start_date, &report.work_product_title)
    }
}

/// (employee, workstream, week, case-insensitive description)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccomplishmentKey {
    pub employee_id: i64,
    pub workstream_id: Option<i64>,
    pub date_range: Option<NaiveDate>,
    pub description: String,
}

impl AccomplishmentKey {
    pub fn new(employee_id: i64, workstream_id: Option<i64>, date_range: Option<NaiveDate>, description: &str) -> Self {
        Self {
            employee_id,
            workstream_id,
            date_range,
            description: description.trim().to_lowercase(),
        }
    }
}

impl From<&AccomplishmentKeyRow> for AccomplishmentKey {
    fn from(row: &AccomplishmentKeyRow) -> Self {
        Self::new(row.employee_id, row.workstream_id, row.date_range, &row.description)
    }
}

impl From<&NewAccomplishment> for AccomplishmentKey {
    fn from(a: &NewAccomplishment) -> Self {
        Self::new(a.employee_id, a.workstream_id, a.date_range, &a.description)
    }
}

/// Candidates split into what to insert and what to skip
#[derive(Debug, Clone, PartialEq)]
pub struct Partition<T> {
    pub to_insert: Vec<T>,
    pub duplicates: Vec<T>,
}

/// Split candidates by natural key.
///
/// A candidate is a duplicate when its key is in `existing` or belongs to an
/// earlier candidate of the same call. Order is preserved on both sides.
pub fn partition<T, K, F>(candidates: Vec<T>, existing: &HashSet<K>, natural_key: F) -> Partition<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    let mut to_insert = Vec::new();
    let mut duplicates = Vec::new();

    for candidate in candidates {
        let key = natural_key(&candidate);
        if existing.contains(&key) || seen.contains(&key) {
            duplicates.push(candidate);
        } else {
            seen.insert(key);
            to_insert.push(candidate);
        }
    }

    Partition { to_insert, duplicates }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week() -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2025, 8, 4)
    }

    #[test]
    fn test_existing_key_is_a_duplicate() {
        let existing: HashSet<WeeklyReportKey> = [WeeklyReportKey::new(1, week(), "Write Tests")].into();
        let candidates = vec![(1, "write   tests"), (1, "Ship Release"), (2, "Write Tests")];

        let split = partition(candidates, &existing, |(id, title)| WeeklyReportKey::new(*id, week(), title));

        assert_eq!(split.duplicates, vec![(1, "write   tests")]);
        assert_eq!(split.to_insert, vec![(1, "Ship Release"), (2, "Write Tests")]);
    }

    #[test]
    fn test_repeat_within_batch_is_a_duplicate() {
        let existing = HashSet::new();
        let candidates = vec!["Reviewed PRs", "reviewed prs ", "Fixed CI"];

        let split = partition(candidates, &existing, |d| AccomplishmentKey::new(1, Some(3), week(), d));

        assert_eq!(split.to_insert, vec!["Reviewed PRs", "Fixed CI"]);
        assert_eq!(split.duplicates, vec!["reviewed prs "]);
    }

    #[test]
    fn test_accomplishment_key_includes_workstream() {
        let a = AccomplishmentKey::new(1, Some(3), week(), "Reviewed PRs");
        let b = AccomplishmentKey::new(1, Some(4), week(), "reviewed prs");
        assert_ne!(a, b);
    }

    #[test]
    fn test_stored_rows_map_to_the_same_keys() {
        let stored = WeeklyReportKeyRow {
            employee_id: 7,
            week_start_date: week(),
            work_product_title: "Write Tests".into(),
        };
        assert_eq!(WeeklyReportKey::from(&stored), WeeklyReportKey::new(7, week(), " WRITE tests"));

        let stored = AccomplishmentKeyRow {
            employee_id: 7,
            workstream_id: None,
            date_range: week(),
            description: "Reviewed PRs".into(),
        };
        assert_eq!(AccomplishmentKey::from(&stored), AccomplishmentKey::new(7, None, week(), "REVIEWED PRS"));
    }
}
