//! Hours tracking queries

use sqlx::PgConnection;

use crate::error::StoreResult;
use crate::types::NewHoursEntry;

pub async fn insert(conn: &mut PgConnection, row: &NewHoursEntry) -> StoreResult<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO hours_tracking (
            employee_id, workstream_id, reporting_week, hours_worked,
            level_of_effort, created_at, entered_by, source
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING hours_tracking_id
        "#
    )
    .bind(row.employee_id)
    .bind(row.workstream_id)
    .bind(row.reporting_week)
    .bind(row.hours_worked)
    .bind(row.level_of_effort)
    .bind(row.created_at)
    .bind(&row.entered_by)
    .bind(&row.source)
    .fetch_one(conn)
    .await?;

    Ok(id)
}
