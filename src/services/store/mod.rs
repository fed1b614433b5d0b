//! Data store abstraction consumed by the submission pipeline.
//!
//! `ReportStore` hands out transactions and full-table natural-key reads.
//! `PgReportStore` talks to PostgreSQL; `MemoryReportStore` keeps everything
//! in memory and can inject failures (tests, dry runs).
//!
//! Both traits are object-safe so callers can hold `Arc<dyn ReportStore>`.

pub mod memory;
pub mod pg;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::{
    AccomplishmentKeyRow, AccomplishmentOverviewRow, Employee, EmployeeUpdate, NewAccomplishment,
    NewEmployee, NewHoursEntry, NewWeeklyReport, ReportOverviewRow, WeeklyReportKeyRow, Workstream,
};

pub use memory::{MemoryReportStore, StoreOp};
pub use pg::PgReportStore;

/// Entry point to the relational store
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Open a transaction. Dropping it without `commit` rolls back.
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;

    /// Natural keys of every stored weekly report
    async fn weekly_report_keys(&self) -> StoreResult<Vec<WeeklyReportKeyRow>>;

    /// Natural keys of every stored accomplishment
    async fn accomplishment_keys(&self) -> StoreResult<Vec<AccomplishmentKeyRow>>;

    async fn report_overview(&self) -> StoreResult<Vec<ReportOverviewRow>>;

    async fn accomplishment_overview(&self) -> StoreResult<Vec<AccomplishmentOverviewRow>>;
}

/// Primitives available inside one transaction
#[async_trait]
pub trait StoreTransaction: Send {
    async fn find_employee_by_key(&mut self, unique_key: &str) -> StoreResult<Option<Employee>>;

    /// Employees whose stored (normalized) name matches exactly
    async fn find_employees_by_name(&mut self, name: &str) -> StoreResult<Vec<Employee>>;

    /// Returns the store-assigned employee id
    async fn insert_employee(&mut self, employee: &NewEmployee) -> StoreResult<i64>;

    async fn update_employee(&mut self, employee_id: i64, update: &EmployeeUpdate) -> StoreResult<()>;

    /// Case-insensitive match on the stored name
    async fn find_workstream_by_name(&mut self, name: &str) -> StoreResult<Option<Workstream>>;

    async fn insert_workstream(&mut self, name: &str) -> StoreResult<i64>;

    async fn insert_weekly_reports(&mut self, rows: &[NewWeeklyReport]) -> StoreResult<Vec<i64>>;

    async fn insert_hours(&mut self, rows: &[NewHoursEntry]) -> StoreResult<Vec<i64>>;

    async fn insert_accomplishments(&mut self, rows: &[NewAccomplishment]) -> StoreResult<Vec<i64>>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
