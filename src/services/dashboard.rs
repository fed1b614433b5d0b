//! Dashboard aggregates over stored reports and accomplishments
//!
//! The aggregation functions are pure; `DashboardService` loads the read
//! models from the store and hands them over.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate};

use crate::defaults::hours_from_effort;
use crate::error::StoreResult;
use crate::services::normalize::normalize_text;
use crate::services::store::ReportStore;
use crate::types::{
    AccomplishmentFilter, AccomplishmentOverviewRow, AccomplishmentSummary, EffortNode, FilterOptions, HrKpiRequest,
    HrKpis, ManagementDashboard, ReportFilter, ReportOverviewRow, ReportRowView, WorkProductHours,
};

const UNSPECIFIED: &str = "Unspecified";
const TOP_WORK_PRODUCTS: usize = 5;

pub struct DashboardService {
    store: Arc<dyn ReportStore>,
}

impl DashboardService {
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self { store }
    }

    pub async fn management(&self, filter: &ReportFilter) -> StoreResult<ManagementDashboard> {
        let rows = self.store.report_overview().await?;
        Ok(management_dashboard(rows, filter))
    }

    pub async fn hr_kpis(&self, request: &HrKpiRequest) -> StoreResult<HrKpis> {
        let rows = self.store.report_overview().await?;
        Ok(hr_kpis(&rows, request))
    }

    pub async fn accomplishments(&self, filter: &AccomplishmentFilter) -> StoreResult<AccomplishmentSummary> {
        let rows = self.store.accomplishment_overview().await?;
        Ok(accomplishment_summary(rows, filter))
    }
}

fn label(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        UNSPECIFIED.to_string()
    } else {
        value.to_string()
    }
}

/// Monday of the week containing `date`
fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

// =============================================================================
// MANAGEMENT
// =============================================================================

fn report_options(rows: &[ReportOverviewRow]) -> FilterOptions {
    let weeks: BTreeSet<NaiveDate> = rows.iter().filter_map(|r| r.week_start_date).collect();
    let vendors: BTreeSet<&str> = rows.iter().map(|r| r.vendor_name.as_str()).collect();
    let contractors: BTreeSet<&str> = rows.iter().map(|r| r.contractor_name.as_str()).collect();
    FilterOptions {
        weeks: weeks.into_iter().collect(),
        vendors: vendors.into_iter().map(String::from).collect(),
        contractors: contractors.into_iter().map(String::from).collect(),
    }
}

fn matches_report(row: &ReportOverviewRow, filter: &ReportFilter) -> bool {
    let week_ok = filter.weeks.is_empty() || row.week_start_date.is_some_and(|w| filter.weeks.contains(&w));
    let vendor_ok = filter.vendors.is_empty() || filter.vendors.contains(&row.vendor_name);
    let contractor_ok = filter.contractors.is_empty() || filter.contractors.contains(&row.contractor_name);
    week_ok && vendor_ok && contractor_ok
}

type Tree = BTreeMap<String, BTreeMap<String, BTreeMap<String, BTreeMap<String, f64>>>>;

/// Vendor -> Division -> Contractor -> Work Product, summed by effort
pub fn effort_tree(rows: &[ReportRowView]) -> Vec<EffortNode> {
    let mut tree = Tree::new();
    for view in rows {
        let r = &view.row;
        *tree
            .entry(label(&r.vendor_name))
            .or_default()
            .entry(label(&r.division_command))
            .or_default()
            .entry(label(&r.contractor_name))
            .or_default()
            .entry(label(&r.work_product_title))
            .or_default() += r.effort_percentage;
    }

    fn node(label: String, children: Vec<EffortNode>) -> EffortNode {
        EffortNode {
            effort: children.iter().map(|c| c.effort).sum(),
            label,
            children,
        }
    }

    tree.into_iter()
        .map(|(vendor, divisions)| {
            let divisions = divisions
                .into_iter()
                .map(|(division, contractors)| {
                    let contractors = contractors
                        .into_iter()
                        .map(|(contractor, products)| {
                            let products = products
                                .into_iter()
                                .map(|(title, effort)| EffortNode {
                                    label: title,
                                    effort,
                                    children: Vec::new(),
                                })
                                .collect();
                            node(contractor, products)
                        })
                        .collect();
                    node(division, contractors)
                })
                .collect();
            node(vendor, divisions)
        })
        .collect()
}

pub fn management_dashboard(rows: Vec<ReportOverviewRow>, filter: &ReportFilter) -> ManagementDashboard {
    let options = report_options(&rows);
    let rows: Vec<ReportRowView> = rows
        .into_iter()
        .filter(|r| matches_report(r, filter))
        .map(|row| ReportRowView {
            hours: hours_from_effort(row.effort_percentage),
            row,
        })
        .collect();
    let effort_tree = effort_tree(&rows);

    ManagementDashboard {
        options,
        rows,
        effort_tree,
    }
}

// =============================================================================
// HR KPIs
// =============================================================================

pub fn hr_kpis(rows: &[ReportOverviewRow], request: &HrKpiRequest) -> HrKpis {
    let hours: Vec<f64> = rows.iter().map(|r| hours_from_effort(r.effort_percentage)).collect();
    let total_hours: f64 = hours.iter().sum();

    let mut per_contractor: BTreeMap<&str, f64> = BTreeMap::new();
    let mut status_distribution = BTreeMap::new();
    let mut weekly_completed = BTreeMap::new();
    let mut effort_by_division = BTreeMap::new();
    let mut unplanned_hours_by_division = BTreeMap::new();
    let mut work_products: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    let mut labor_category_distribution = BTreeMap::new();
    let mut monthly_hours: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    let mut unplanned_hours = 0.0;

    for (row, &h) in rows.iter().zip(&hours) {
        let status = normalize_text(&row.status);
        let unplanned = row.planned_or_unplanned.trim().eq_ignore_ascii_case("unplanned");

        *per_contractor.entry(row.contractor_name.as_str()).or_default() += h;
        *status_distribution.entry(status.clone()).or_insert(0) += 1;
        *effort_by_division.entry(label(&row.division_command)).or_insert(0.0) += row.effort_percentage;

        if unplanned {
            unplanned_hours += h;
            *unplanned_hours_by_division.entry(label(&row.division_command)).or_insert(0.0) += h;
        }

        let product = work_products.entry(row.work_product_title.as_str()).or_default();
        product.0 += h;
        product.1 += 1;

        *labor_category_distribution.entry(label(&row.labor_category)).or_insert(0) += 1;

        if let Some(week) = row.week_start_date {
            if status == "Completed" {
                *weekly_completed.entry(week_start(week)).or_insert(0) += 1;
            }
            *monthly_hours
                .entry(row.contractor_name.clone())
                .or_default()
                .entry(week.format("%Y-%m").to_string())
                .or_insert(0.0) += h;
        }
    }

    let avg_hours_per_contractor = if per_contractor.is_empty() {
        0.0
    } else {
        per_contractor.values().sum::<f64>() / per_contractor.len() as f64
    };
    let unplanned_pct = if total_hours > 0.0 {
        unplanned_hours / total_hours * 100.0
    } else {
        0.0
    };

    let active: HashSet<String> = rows.iter().map(|r| normalize_text(&r.contractor_name)).collect();
    let mut non_reporting_contractors: Vec<String> = request
        .expected_contractors
        .iter()
        .filter(|name| !active.contains(&normalize_text(name)))
        .cloned()
        .collect();
    non_reporting_contractors.sort();
    non_reporting_contractors.dedup();

    let mut top_work_products: Vec<WorkProductHours> = work_products
        .into_iter()
        .map(|(title, (total_hours, frequency))| WorkProductHours {
            title: title.to_string(),
            total_hours,
            frequency,
        })
        .collect();
    top_work_products.sort_by(|a, b| b.total_hours.total_cmp(&a.total_hours));
    top_work_products.truncate(TOP_WORK_PRODUCTS);

    HrKpis {
        total_hours,
        avg_hours_per_contractor,
        unplanned_pct,
        non_reporting_contractors,
        status_distribution,
        weekly_completed,
        effort_by_division,
        unplanned_hours_by_division,
        top_work_products,
        labor_category_distribution,
        monthly_hours,
    }
}

// =============================================================================
// ACCOMPLISHMENTS
// =============================================================================

fn matches_accomplishment(row: &AccomplishmentOverviewRow, filter: &AccomplishmentFilter, keyword: &str) -> bool {
    let workstream = row.workstream.as_deref().unwrap_or("");
    let week_ok = filter.weeks.is_empty() || row.date_range.is_some_and(|w| filter.weeks.contains(&w));
    let contractor_ok = filter.contractors.is_empty() || filter.contractors.contains(&row.contractor);
    let workstream_ok = filter.workstreams.is_empty() || filter.workstreams.iter().any(|w| w == workstream);
    let vendor_ok = filter.vendors.is_empty() || filter.vendors.contains(&row.vendor);
    let keyword_ok = keyword.is_empty()
        || [row.description.as_str(), row.contractor.as_str(), workstream, row.vendor.as_str()]
            .iter()
            .any(|field| field.to_lowercase().contains(keyword));

    week_ok && contractor_ok && workstream_ok && vendor_ok && keyword_ok
}

pub fn accomplishment_summary(rows: Vec<AccomplishmentOverviewRow>, filter: &AccomplishmentFilter) -> AccomplishmentSummary {
    let keyword = filter
        .keyword
        .as_deref()
        .map(|k| k.trim().to_lowercase())
        .unwrap_or_default();

    let mut rows: Vec<AccomplishmentOverviewRow> = rows
        .into_iter()
        .map(|mut row| {
            row.description = normalize_text(&row.description);
            row.contractor = normalize_text(&row.contractor);
            row.vendor = normalize_text(&row.vendor);
            row.workstream = row.workstream.map(|w| normalize_text(&w));
            row
        })
        .filter(|row| matches_accomplishment(row, filter, &keyword))
        .collect();

    // Newest week first, undated rows last
    rows.sort_by(|a, b| b.date_range.cmp(&a.date_range));

    let mut by_workstream = BTreeMap::new();
    let mut by_contractor = BTreeMap::new();
    for row in &rows {
        let workstream = row.workstream.as_deref().map(label).unwrap_or_else(|| UNSPECIFIED.to_string());
        *by_workstream.entry(workstream).or_insert(0) += 1;
        *by_contractor.entry(row.contractor.clone()).or_insert(0) += 1;
    }

    AccomplishmentSummary {
        total: rows.len(),
        unique_contractors: by_contractor.len(),
        by_workstream,
        by_contractor,
        rows,
    }
}
