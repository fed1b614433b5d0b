//! In-memory store
//!
//! A transaction works on a private copy of the tables and swaps it in on
//! commit, so a dropped or failed transaction leaves nothing behind. Faults
//! can be queued per operation and every call is counted, which is what the
//! pipeline tests assert against. Commits are last-writer-wins; this store
//! assumes a single writer.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ReportStore, StoreTransaction};
use crate::error::{StoreError, StoreResult};
use crate::types::{
    AccomplishmentKeyRow, AccomplishmentOverviewRow, Employee, EmployeeUpdate, NewAccomplishment,
    NewEmployee, NewHoursEntry, NewWeeklyReport, ReportOverviewRow, WeeklyReportKeyRow, Workstream,
};

/// Operations that can be counted and made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Begin,
    FindEmployee,
    FindEmployeesByName,
    InsertEmployee,
    UpdateEmployee,
    FindWorkstream,
    InsertWorkstream,
    InsertWeeklyReports,
    InsertHours,
    InsertAccomplishments,
    Commit,
    LoadWeeklyReportKeys,
    LoadAccomplishmentKeys,
    LoadOverview,
}

/// Committed contents of the store
#[derive(Debug, Clone, Default)]
pub struct MemoryTables {
    pub employees: Vec<Employee>,
    pub workstreams: Vec<Workstream>,
    pub weekly_reports: Vec<(i64, NewWeeklyReport)>,
    pub hours: Vec<(i64, NewHoursEntry)>,
    pub accomplishments: Vec<(i64, NewAccomplishment)>,
}

#[derive(Default)]
struct Hooks {
    faults: Mutex<HashMap<StoreOp, VecDeque<StoreError>>>,
    calls: Mutex<HashMap<StoreOp, usize>>,
    /// Errors reported by commits that did apply their writes
    lost_acks: Mutex<VecDeque<StoreError>>,
}

impl Hooks {
    fn enter(&self, op: StoreOp) -> StoreResult<()> {
        *self.calls.lock().entry(op).or_default() += 1;
        match self.faults.lock().get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryReportStore {
    tables: Arc<Mutex<MemoryTables>>,
    hooks: Arc<Hooks>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of `op` fail with `err`
    pub fn fail_next(&self, op: StoreOp, err: StoreError) {
        self.fail_times(op, 1, err);
    }

    /// Make the next `times` calls of `op` fail with `err`
    pub fn fail_times(&self, op: StoreOp, times: usize, err: StoreError) {
        let mut faults = self.hooks.faults.lock();
        let queue = faults.entry(op).or_default();
        for _ in 0..times {
            queue.push_back(err.clone());
        }
    }

    /// Apply the next commit, then report `err` as if the acknowledgement
    /// never reached the client
    pub fn lose_next_commit_ack(&self, err: StoreError) {
        self.hooks.lost_acks.lock().push_back(err);
    }

    /// How many times `op` was called, including failed calls
    pub fn calls(&self, op: StoreOp) -> usize {
        self.hooks.calls.lock().get(&op).copied().unwrap_or(0)
    }

    /// Copy of the committed tables
    pub fn tables(&self) -> MemoryTables {
        self.tables.lock().clone()
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        self.hooks.enter(StoreOp::Begin)?;
        Ok(Box::new(MemoryTransaction {
            working: self.tables.lock().clone(),
            tables: Arc::clone(&self.tables),
            hooks: Arc::clone(&self.hooks),
        }))
    }

    async fn weekly_report_keys(&self) -> StoreResult<Vec<WeeklyReportKeyRow>> {
        self.hooks.enter(StoreOp::LoadWeeklyReportKeys)?;
        let tables = self.tables.lock();
        Ok(tables.weekly_reports.iter().map(|(_, r)| WeeklyReportKeyRow::from(r)).collect())
    }

    async fn accomplishment_keys(&self) -> StoreResult<Vec<AccomplishmentKeyRow>> {
        self.hooks.enter(StoreOp::LoadAccomplishmentKeys)?;
        let tables = self.tables.lock();
        Ok(tables.accomplishments.iter().map(|(_, a)| AccomplishmentKeyRow::from(a)).collect())
    }

    async fn report_overview(&self) -> StoreResult<Vec<ReportOverviewRow>> {
        self.hooks.enter(StoreOp::LoadOverview)?;
        let tables = self.tables.lock();
        let rows = tables
            .weekly_reports
            .iter()
            .filter_map(|(_, r)| {
                let employee = tables.employees.iter().find(|e| e.employee_id == r.employee_id)?;
                Some(ReportOverviewRow {
                    week_start_date: r.week_start_date,
                    vendor_name: employee.vendor_name.clone(),
                    division_command: r.division_command.clone(),
                    work_product_title: r.work_product_title.clone(),
                    status: r.status.clone(),
                    planned_or_unplanned: r.planned_or_unplanned.clone(),
                    effort_percentage: r.effort_percentage,
                    contractor_name: employee.name.clone(),
                    govt_ta_name: r.govt_ta_name.clone(),
                    labor_category: employee.labor_category.clone(),
                })
            })
            .collect();
        Ok(rows)
    }

    async fn accomplishment_overview(&self) -> StoreResult<Vec<AccomplishmentOverviewRow>> {
        self.hooks.enter(StoreOp::LoadOverview)?;
        let tables = self.tables.lock();
        let rows = tables
            .accomplishments
            .iter()
            .filter_map(|(_, a)| {
                let employee = tables.employees.iter().find(|e| e.employee_id == a.employee_id)?;
                let workstream = a
                    .workstream_id
                    .and_then(|id| tables.workstreams.iter().find(|w| w.workstream_id == id))
                    .map(|w| w.name.clone());
                Some(AccomplishmentOverviewRow {
                    date_range: a.date_range,
                    contractor: employee.name.clone(),
                    vendor: employee.vendor_name.clone(),
                    labor_category: employee.labor_category.clone(),
                    workstream,
                    description: a.description.clone(),
                })
            })
            .collect();
        Ok(rows)
    }
}

struct MemoryTransaction {
    working: MemoryTables,
    tables: Arc<Mutex<MemoryTables>>,
    hooks: Arc<Hooks>,
}

fn next_id(len: usize) -> i64 {
    len as i64 + 1
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn find_employee_by_key(&mut self, unique_key: &str) -> StoreResult<Option<Employee>> {
        self.hooks.enter(StoreOp::FindEmployee)?;
        Ok(self.working.employees.iter().find(|e| e.unique_key == unique_key).cloned())
    }

    async fn find_employees_by_name(&mut self, name: &str) -> StoreResult<Vec<Employee>> {
        self.hooks.enter(StoreOp::FindEmployeesByName)?;
        Ok(self.working.employees.iter().filter(|e| e.name == name).cloned().collect())
    }

    async fn insert_employee(&mut self, employee: &NewEmployee) -> StoreResult<i64> {
        self.hooks.enter(StoreOp::InsertEmployee)?;
        if self.working.employees.iter().any(|e| e.unique_key == employee.unique_key) {
            return Err(StoreError::Transient(format!(
                "duplicate key value violates unique constraint \"employees_unique_key_idx\" ({})",
                employee.unique_key
            )));
        }
        let id = next_id(self.working.employees.len());
        self.working.employees.push(Employee {
            employee_id: id,
            name: employee.name.clone(),
            vendor_name: employee.vendor_name.clone(),
            labor_category: employee.labor_category.clone(),
            unique_key: employee.unique_key.clone(),
            public_id: None,
        });
        Ok(id)
    }

    async fn update_employee(&mut self, employee_id: i64, update: &EmployeeUpdate) -> StoreResult<()> {
        self.hooks.enter(StoreOp::UpdateEmployee)?;
        match self.working.employees.iter_mut().find(|e| e.employee_id == employee_id) {
            Some(employee) => {
                update.apply(employee);
                Ok(())
            }
            None => Err(StoreError::Permanent(format!("employee {} does not exist", employee_id))),
        }
    }

    async fn find_workstream_by_name(&mut self, name: &str) -> StoreResult<Option<Workstream>> {
        self.hooks.enter(StoreOp::FindWorkstream)?;
        let wanted = name.to_lowercase();
        Ok(self.working.workstreams.iter().find(|w| w.name.to_lowercase() == wanted).cloned())
    }

    async fn insert_workstream(&mut self, name: &str) -> StoreResult<i64> {
        self.hooks.enter(StoreOp::InsertWorkstream)?;
        let id = next_id(self.working.workstreams.len());
        self.working.workstreams.push(Workstream {
            workstream_id: id,
            name: name.to_string(),
        });
        Ok(id)
    }

    async fn insert_weekly_reports(&mut self, rows: &[NewWeeklyReport]) -> StoreResult<Vec<i64>> {
        self.hooks.enter(StoreOp::InsertWeeklyReports)?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let id = next_id(self.working.weekly_reports.len());
            self.working.weekly_reports.push((id, row.clone()));
            ids.push(id);
        }
        Ok(ids)
    }

    async fn insert_hours(&mut self, rows: &[NewHoursEntry]) -> StoreResult<Vec<i64>> {
        self.hooks.enter(StoreOp::InsertHours)?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let id = next_id(self.working.hours.len());
            self.working.hours.push((id, row.clone()));
            ids.push(id);
        }
        Ok(ids)
    }

    async fn insert_accomplishments(&mut self, rows: &[NewAccomplishment]) -> StoreResult<Vec<i64>> {
        self.hooks.enter(StoreOp::InsertAccomplishments)?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let id = next_id(self.working.accomplishments.len());
            self.working.accomplishments.push((id, row.clone()));
            ids.push(id);
        }
        Ok(ids)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.hooks.enter(StoreOp::Commit)?;
        *self.tables.lock() = self.working;
        match self.hooks.lost_acks.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_employee(name: &str, key: &str) -> NewEmployee {
        NewEmployee {
            name: name.into(),
            vendor_name: "Acme".into(),
            labor_category: "Analyst".into(),
            unique_key: key.into(),
        }
    }

    #[tokio::test]
    async fn test_commit_publishes_working_copy() {
        let store = MemoryReportStore::new();
        let mut tx = store.begin().await.unwrap();
        let id = tx.insert_employee(&new_employee("Jane Doe", "k1")).await.unwrap();
        assert_eq!(id, 1);
        assert!(store.tables().employees.is_empty());

        tx.commit().await.unwrap();
        assert_eq!(store.tables().employees.len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_transaction_leaves_nothing() {
        let store = MemoryReportStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_workstream("Data Ops").await.unwrap();
        }
        assert!(store.tables().workstreams.is_empty());
    }

    #[tokio::test]
    async fn test_injected_fault_fires_once_and_counts_calls() {
        let store = MemoryReportStore::new();
        store.fail_next(StoreOp::Commit, StoreError::Transient("connection reset".into()));

        let tx = store.begin().await.unwrap();
        let err = tx.commit().await.unwrap_err();
        assert!(err.is_transient());

        let tx = store.begin().await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.calls(StoreOp::Commit), 2);
        assert_eq!(store.calls(StoreOp::Begin), 2);
    }

    #[tokio::test]
    async fn test_lost_commit_ack_still_applies_writes() {
        let store = MemoryReportStore::new();
        store.lose_next_commit_ack(StoreError::Transient("connection reset during COMMIT".into()));

        let mut tx = store.begin().await.unwrap();
        tx.insert_workstream("Data Ops").await.unwrap();
        let err = tx.commit().await.unwrap_err();

        assert!(err.is_transient());
        assert_eq!(store.tables().workstreams.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_identity_key_is_a_transient_conflict() {
        let store = MemoryReportStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_employee(&new_employee("Jane Doe", "k1")).await.unwrap();
        let err = tx.insert_employee(&new_employee("Jane Doe", "k1")).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_workstream_lookup_is_case_insensitive() {
        let store = MemoryReportStore::new();
        let mut tx = store.begin().await.unwrap();
        let id = tx.insert_workstream("Data Ops").await.unwrap();
        let found = tx.find_workstream_by_name("DATA OPS").await.unwrap().unwrap();
        assert_eq!(found.workstream_id, id);
    }
}
