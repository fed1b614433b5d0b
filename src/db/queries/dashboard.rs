//! Read models for the dashboards

use sqlx::PgPool;

use crate::error::StoreResult;
use crate::types::{AccomplishmentOverviewRow, ReportOverviewRow};

/// Weekly reports joined with their employee
pub async fn report_overview(pool: &PgPool) -> StoreResult<Vec<ReportOverviewRow>> {
    let rows = sqlx::query_as::<_, ReportOverviewRow>(
        r#"
        SELECT
            wr.week_start_date,
            e.vendor_name,
            wr.division_command,
            wr.work_product_title,
            wr.status,
            wr.planned_or_unplanned,
            wr.effort_percentage,
            e.name AS contractor_name,
            wr.govt_ta_name,
            e.labor_category
        FROM weekly_reports wr
        JOIN employees e ON wr.employee_id = e.employee_id
        ORDER BY wr.week_start_date DESC NULLS LAST, e.name
        "#
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Accomplishments joined with employee and workstream
pub async fn accomplishment_overview(pool: &PgPool) -> StoreResult<Vec<AccomplishmentOverviewRow>> {
    let rows = sqlx::query_as::<_, AccomplishmentOverviewRow>(
        r#"
        SELECT
            a.date_range,
            e.name AS contractor,
            e.vendor_name AS vendor,
            e.labor_category,
            w.name AS workstream,
            a.description
        FROM accomplishments a
        JOIN employees e ON a.employee_id = e.employee_id
        LEFT JOIN workstreams w ON a.workstream_id = w.workstream_id
        "#
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
