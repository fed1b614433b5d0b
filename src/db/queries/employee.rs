//! Employee database queries

use sqlx::PgConnection;

use crate::error::StoreResult;
use crate::types::{Employee, EmployeeUpdate, NewEmployee};

/// Find employee by identity key
pub async fn find_by_key(conn: &mut PgConnection, unique_key: &str) -> StoreResult<Option<Employee>> {
    let employee = sqlx::query_as::<_, Employee>(
        r#"
        SELECT employee_id, name, vendor_name, labor_category, unique_key, public_id
        FROM employees
        WHERE unique_key = $1
        LIMIT 1
        "#
    )
    .bind(unique_key)
    .fetch_optional(conn)
    .await?;

    Ok(employee)
}

/// Find employees by exact (normalized) name
pub async fn find_by_name(conn: &mut PgConnection, name: &str) -> StoreResult<Vec<Employee>> {
    let employees = sqlx::query_as::<_, Employee>(
        r#"
        SELECT employee_id, name, vendor_name, labor_category, unique_key, public_id
        FROM employees
        WHERE name = $1
        ORDER BY employee_id
        "#
    )
    .bind(name)
    .fetch_all(conn)
    .await?;

    Ok(employees)
}

/// Insert a new employee, returning the generated id
pub async fn insert(conn: &mut PgConnection, employee: &NewEmployee) -> StoreResult<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO employees (name, vendor_name, labor_category, unique_key, created_at)
        VALUES ($1, $2, $3, $4, NOW())
        RETURNING employee_id
        "#
    )
    .bind(&employee.name)
    .bind(&employee.vendor_name)
    .bind(&employee.labor_category)
    .bind(&employee.unique_key)
    .fetch_one(conn)
    .await?;

    Ok(id)
}

/// Partial update; unset fields keep their stored value
pub async fn update(conn: &mut PgConnection, employee_id: i64, update: &EmployeeUpdate) -> StoreResult<()> {
    if update.is_empty() {
        return Ok(());
    }

    sqlx::query(
        r#"
        UPDATE employees
        SET vendor_name = COALESCE($2, vendor_name),
            labor_category = COALESCE($3, labor_category),
            unique_key = COALESCE($4, unique_key),
            public_id = COALESCE($5, public_id)
        WHERE employee_id = $1
        "#
    )
    .bind(employee_id)
    .bind(&update.vendor_name)
    .bind(&update.labor_category)
    .bind(&update.unique_key)
    .bind(&update.public_id)
    .execute(conn)
    .await?;

    Ok(())
}
