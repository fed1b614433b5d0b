//! Workstream database queries

use sqlx::PgConnection;

use crate::error::StoreResult;
use crate::types::Workstream;

/// Find workstream by name (case-insensitive)
pub async fn find_by_name(conn: &mut PgConnection, name: &str) -> StoreResult<Option<Workstream>> {
    let workstream = sqlx::query_as::<_, Workstream>(
        r#"SELECT workstream_id, name FROM workstreams WHERE LOWER(name) = LOWER($1)"#
    )
    .bind(name)
    .fetch_optional(conn)
    .await?;

    Ok(workstream)
}

/// Create a workstream, returning the generated id
pub async fn insert(conn: &mut PgConnection, name: &str) -> StoreResult<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"INSERT INTO workstreams (name, created_at) VALUES ($1, NOW()) RETURNING workstream_id"#
    )
    .bind(name)
    .fetch_one(conn)
    .await?;

    Ok(id)
}
