//! Persisted entity types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Contractor known to the system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub employee_id: i64,
    pub name: String,
    pub vendor_name: String,
    pub labor_category: String,
    /// SHA-256 of normalized name + vendor
    pub unique_key: String,
    /// `LAST-FIRST-###`, written right after the id is assigned
    pub public_id: Option<String>,
}

/// Insert payload for a new employee (id and public id come later)
#[derive(Debug, Clone, PartialEq)]
pub struct NewEmployee {
    pub name: String,
    pub vendor_name: String,
    pub labor_category: String,
    pub unique_key: String,
}

/// Partial update by primary key; `None` leaves the column untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmployeeUpdate {
    pub vendor_name: Option<String>,
    pub labor_category: Option<String>,
    pub unique_key: Option<String>,
    pub public_id: Option<String>,
}

impl EmployeeUpdate {
    pub fn is_empty(&self) -> bool {
        self.vendor_name.is_none()
            && self.labor_category.is_none()
            && self.unique_key.is_none()
            && self.public_id.is_none()
    }

    pub fn apply(&self, employee: &mut Employee) {
        if let Some(v) = &self.vendor_name {
            employee.vendor_name = v.clone();
        }
        if let Some(l) = &self.labor_category {
            employee.labor_category = l.clone();
        }
        if let Some(k) = &self.unique_key {
            employee.unique_key = k.clone();
        }
        if let Some(p) = &self.public_id {
            employee.public_id = Some(p.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Workstream {
    pub workstream_id: i64,
    pub name: String,
}

/// One contractor's work item for one reporting week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWeeklyReport {
    pub employee_id: i64,
    pub workstream_id: Option<i64>,
    pub week_start_date: Option<NaiveDate>,
    pub division_command: String,
    pub work_product_title: String,
    pub contribution_description: String,
    pub status: String,
    pub planned_or_unplanned: String,
    pub date_completed: Option<NaiveDate>,
    pub distinct_nfr: String,
    pub distinct_cap: String,
    pub effort_percentage: f64,
    pub contractor_name: String,
    pub govt_ta_name: String,
    pub created_at: DateTime<Utc>,
    pub entered_by: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccomplishment {
    pub employee_id: i64,
    pub workstream_id: Option<i64>,
    pub date_range: Option<NaiveDate>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub entered_by: String,
}

/// Written alongside a weekly report whenever hours were logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHoursEntry {
    pub employee_id: i64,
    pub workstream_id: Option<i64>,
    pub reporting_week: Option<NaiveDate>,
    pub hours_worked: f64,
    pub level_of_effort: f64,
    pub created_at: DateTime<Utc>,
    pub entered_by: String,
    pub source: String,
}

// =============================================================================
// NATURAL KEY PROJECTIONS (duplicate-detection baselines)
// =============================================================================

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct WeeklyReportKeyRow {
    pub employee_id: i64,
    pub week_start_date: Option<NaiveDate>,
    pub work_product_title: String,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct AccomplishmentKeyRow {
    pub employee_id: i64,
    pub workstream_id: Option<i64>,
    pub date_range: Option<NaiveDate>,
    pub description: String,
}

impl From<&NewWeeklyReport> for WeeklyReportKeyRow {
    fn from(r: &NewWeeklyReport) -> Self {
        Self {
            employee_id: r.employee_id,
            week_start_date: r.week_start_date,
            work_product_title: r.work_product_title.clone(),
        }
    }
}

impl From<&NewAccomplishment> for AccomplishmentKeyRow {
    fn from(a: &NewAccomplishment) -> Self {
        Self {
            employee_id: a.employee_id,
            workstream_id: a.workstream_id,
            date_range: a.date_range,
            description: a.description.clone(),
        }
    }
}
