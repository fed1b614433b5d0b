//! Accomplishment database queries

use sqlx::{PgConnection, PgPool};

use crate::error::StoreResult;
use crate::types::{AccomplishmentKeyRow, NewAccomplishment};

pub async fn insert(conn: &mut PgConnection, row: &NewAccomplishment) -> StoreResult<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO accomplishments (employee_id, workstream_id, date_range, description, created_at, entered_by)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING accomplishment_id
        "#
    )
    .bind(row.employee_id)
    .bind(row.workstream_id)
    .bind(row.date_range)
    .bind(&row.description)
    .bind(row.created_at)
    .bind(&row.entered_by)
    .fetch_one(conn)
    .await?;

    Ok(id)
}

pub async fn list_natural_keys(pool: &PgPool) -> StoreResult<Vec<AccomplishmentKeyRow>> {
    let rows = sqlx::query_as::<_, AccomplishmentKeyRow>(
        r#"SELECT employee_id, workstream_id, date_range, description FROM accomplishments"#
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
