//! PostgreSQL-backed store

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use super::{ReportStore, StoreTransaction};
use crate::db::queries;
use crate::error::StoreResult;
use crate::types::{
    AccomplishmentKeyRow, AccomplishmentOverviewRow, Employee, EmployeeUpdate, NewAccomplishment,
    NewEmployee, NewHoursEntry, NewWeeklyReport, ReportOverviewRow, WeeklyReportKeyRow, Workstream,
};

#[derive(Clone)]
pub struct PgReportStore {
    pool: PgPool,
}

impl PgReportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgStoreTransaction { tx }))
    }

    async fn weekly_report_keys(&self) -> StoreResult<Vec<WeeklyReportKeyRow>> {
        queries::weekly_report::list_natural_keys(&self.pool).await
    }

    async fn accomplishment_keys(&self) -> StoreResult<Vec<AccomplishmentKeyRow>> {
        queries::accomplishment::list_natural_keys(&self.pool).await
    }

    async fn report_overview(&self) -> StoreResult<Vec<ReportOverviewRow>> {
        queries::dashboard::report_overview(&self.pool).await
    }

    async fn accomplishment_overview(&self) -> StoreResult<Vec<AccomplishmentOverviewRow>> {
        queries::dashboard::accomplishment_overview(&self.pool).await
    }
}

/// Wraps a pool transaction; sqlx rolls back on drop if not committed
pub struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn find_employee_by_key(&mut self, unique_key: &str) -> StoreResult<Option<Employee>> {
        queries::employee::find_by_key(&mut *self.tx, unique_key).await
    }

    async fn find_employees_by_name(&mut self, name: &str) -> StoreResult<Vec<Employee>> {
        queries::employee::find_by_name(&mut *self.tx, name).await
    }

    async fn insert_employee(&mut self, employee: &NewEmployee) -> StoreResult<i64> {
        queries::employee::insert(&mut *self.tx, employee).await
    }

    async fn update_employee(&mut self, employee_id: i64, update: &EmployeeUpdate) -> StoreResult<()> {
        queries::employee::update(&mut *self.tx, employee_id, update).await
    }

    async fn find_workstream_by_name(&mut self, name: &str) -> StoreResult<Option<Workstream>> {
        queries::workstream::find_by_name(&mut *self.tx, name).await
    }

    async fn insert_workstream(&mut self, name: &str) -> StoreResult<i64> {
        queries::workstream::insert(&mut *self.tx, name).await
    }

    async fn insert_weekly_reports(&mut self, rows: &[NewWeeklyReport]) -> StoreResult<Vec<i64>> {
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(queries::weekly_report::insert(&mut *self.tx, row).await?);
        }
        Ok(ids)
    }

    async fn insert_hours(&mut self, rows: &[NewHoursEntry]) -> StoreResult<Vec<i64>> {
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(queries::hours::insert(&mut *self.tx, row).await?);
        }
        Ok(ids)
    }

    async fn insert_accomplishments(&mut self, rows: &[NewAccomplishment]) -> StoreResult<Vec<i64>> {
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(queries::accomplishment::insert(&mut *self.tx, row).await?);
        }
        Ok(ids)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
