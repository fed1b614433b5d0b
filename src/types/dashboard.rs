//! Dashboard request/response types

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Weekly report joined with its employee, as the dashboards read it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReportOverviewRow {
    pub week_start_date: Option<NaiveDate>,
    pub vendor_name: String,
    pub division_command: String,
    pub work_product_title: String,
    pub status: String,
    pub planned_or_unplanned: String,
    pub effort_percentage: f64,
    pub contractor_name: String,
    pub govt_ta_name: String,
    pub labor_category: String,
}

/// Accomplishment joined with employee and workstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AccomplishmentOverviewRow {
    pub date_range: Option<NaiveDate>,
    pub contractor: String,
    pub vendor: String,
    pub labor_category: String,
    pub workstream: Option<String>,
    pub description: String,
}

// =============================================================================
// MANAGEMENT DASHBOARD
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFilter {
    #[serde(default)]
    pub weeks: Vec<NaiveDate>,
    #[serde(default)]
    pub vendors: Vec<String>,
    #[serde(default)]
    pub contractors: Vec<String>,
}

/// Report row with derived hours
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRowView {
    #[serde(flatten)]
    pub row: ReportOverviewRow,
    pub hours: f64,
}

/// Node of the Vendor -> Division -> Contractor -> Work Product effort tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffortNode {
    pub label: String,
    pub effort: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<EffortNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub weeks: Vec<NaiveDate>,
    pub vendors: Vec<String>,
    pub contractors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagementDashboard {
    pub options: FilterOptions,
    pub rows: Vec<ReportRowView>,
    pub effort_tree: Vec<EffortNode>,
}

// =============================================================================
// HR KPIs
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HrKpiRequest {
    /// Roster of contractors expected to report ("Last, First" or any form)
    #[serde(default)]
    pub expected_contractors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkProductHours {
    pub title: String,
    pub total_hours: f64,
    pub frequency: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HrKpis {
    pub total_hours: f64,
    pub avg_hours_per_contractor: f64,
    pub unplanned_pct: f64,
    pub non_reporting_contractors: Vec<String>,
    pub status_distribution: BTreeMap<String, usize>,
    pub weekly_completed: BTreeMap<NaiveDate, usize>,
    pub effort_by_division: BTreeMap<String, f64>,
    pub unplanned_hours_by_division: BTreeMap<String, f64>,
    pub top_work_products: Vec<WorkProductHours>,
    pub labor_category_distribution: BTreeMap<String, usize>,
    /// contractor -> "YYYY-MM" -> hours
    pub monthly_hours: BTreeMap<String, BTreeMap<String, f64>>,
}

// =============================================================================
// ACCOMPLISHMENTS DASHBOARD
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccomplishmentFilter {
    #[serde(default)]
    pub weeks: Vec<NaiveDate>,
    #[serde(default)]
    pub contractors: Vec<String>,
    #[serde(default)]
    pub workstreams: Vec<String>,
    #[serde(default)]
    pub vendors: Vec<String>,
    #[serde(default)]
    pub keyword: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccomplishmentSummary {
    pub total: usize,
    pub unique_contractors: usize,
    pub by_workstream: BTreeMap<String, usize>,
    pub by_contractor: BTreeMap<String, usize>,
    pub rows: Vec<AccomplishmentOverviewRow>,
}
