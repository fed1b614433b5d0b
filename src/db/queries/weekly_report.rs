//! Weekly report database queries

use sqlx::{PgConnection, PgPool};

use crate::error::StoreResult;
use crate::types::{NewWeeklyReport, WeeklyReportKeyRow};

/// Insert one weekly report row
pub async fn insert(conn: &mut PgConnection, row: &NewWeeklyReport) -> StoreResult<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO weekly_reports (
            employee_id, workstream_id, week_start_date, division_command,
            work_product_title, contribution_description, status,
            planned_or_unplanned, date_completed, distinct_nfr, distinct_cap,
            effort_percentage, contractor_name, govt_ta_name,
            created_at, entered_by, source
        )
        VALUES (
            $1, $2, $3, $4,
            $5, $6, $7,
            $8, $9, $10, $11,
            $12, $13, $14,
            $15, $16, $17
        )
        RETURNING weekly_report_id
        "#
    )
    .bind(row.employee_id)
    .bind(row.workstream_id)
    .bind(row.week_start_date)
    .bind(&row.division_command)
    .bind(&row.work_product_title)
    .bind(&row.contribution_description)
    .bind(&row.status)
    .bind(&row.planned_or_unplanned)
    .bind(row.date_completed)
    .bind(&row.distinct_nfr)
    .bind(&row.distinct_cap)
    .bind(row.effort_percentage)
    .bind(&row.contractor_name)
    .bind(&row.govt_ta_name)
    .bind(row.created_at)
    .bind(&row.entered_by)
    .bind(&row.source)
    .fetch_one(conn)
    .await?;

    Ok(id)
}

/// Natural keys of all stored weekly reports (duplicate-detection baseline)
pub async fn list_natural_keys(pool: &PgPool) -> StoreResult<Vec<WeeklyReportKeyRow>> {
    let rows = sqlx::query_as::<_, WeeklyReportKeyRow>(
        r#"SELECT employee_id, week_start_date, work_product_title FROM weekly_reports"#
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
