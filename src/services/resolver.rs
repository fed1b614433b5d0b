//! Entity resolution (get-or-create) for employees and workstreams
//!
//! Everything here runs inside the caller's transaction, so the employee
//! insert and the public-id write that follows it commit or roll back with
//! the rest of the batch.

use std::collections::HashMap;

use tracing::debug;

use crate::defaults::{UNKNOWN_LCAT, UNKNOWN_VENDOR};
use crate::error::StoreResult;
use crate::services::identity::{employee_key, public_id};
use crate::services::normalize::normalize_text;
use crate::services::store::StoreTransaction;
use crate::types::{Employee, EmployeeUpdate, NewEmployee};

/// Normalized vendor, or `None` for blank and sentinel values
fn real_vendor(vendor: Option<&str>) -> Option<String> {
    let vendor = normalize_text(vendor?);
    if vendor.is_empty() || vendor == UNKNOWN_VENDOR {
        None
    } else {
        Some(vendor)
    }
}

/// Whitespace-collapsed labor category, or `None` for blank and sentinel values
fn real_labor_category(labor_category: Option<&str>) -> Option<String> {
    let lcat = labor_category?.split_whitespace().collect::<Vec<_>>().join(" ");
    if lcat.is_empty() || lcat.eq_ignore_ascii_case(UNKNOWN_LCAT) {
        None
    } else {
        Some(lcat)
    }
}

/// Resolve a contractor to an employee id, creating the employee if needed.
///
/// Returns `Ok(None)` when the name is blank after normalization. Sentinel
/// vendor and labor category values on an existing record are backfilled
/// with the first real value supplied; a real value is never overwritten.
///
/// A key miss falls back to a lookup by normalized name:
/// - with a real vendor, the employee recorded under the sentinel vendor is
///   adopted (vendor backfilled and identity key re-derived);
/// - without one, the employee is adopted only if exactly one exists with
///   that name.
pub async fn get_or_create_employee(
    tx: &mut dyn StoreTransaction,
    name: &str,
    vendor: Option<&str>,
    labor_category: Option<&str>,
) -> StoreResult<Option<i64>> {
    let name = normalize_text(name);
    if name.is_empty() {
        return Ok(None);
    }

    let vendor = real_vendor(vendor);
    let labor_category = real_labor_category(labor_category);
    let key = employee_key(&name, vendor.as_deref().unwrap_or(UNKNOWN_VENDOR));

    let existing = match tx.find_employee_by_key(&key).await? {
        Some(employee) => Some(employee),
        None => adopt_by_name(tx, &name, vendor.is_some()).await?,
    };

    if let Some(employee) = existing {
        backfill(tx, &employee, vendor, labor_category).await?;
        return Ok(Some(employee.employee_id));
    }

    let new_employee = NewEmployee {
        name: name.clone(),
        vendor_name: vendor.unwrap_or_else(|| UNKNOWN_VENDOR.to_string()),
        labor_category: labor_category.unwrap_or_else(|| UNKNOWN_LCAT.to_string()),
        unique_key: key,
    };
    let employee_id = tx.insert_employee(&new_employee).await?;

    // Second write: the public id needs the store-assigned id
    let update = EmployeeUpdate {
        public_id: Some(public_id(&name, employee_id)),
        ..Default::default()
    };
    tx.update_employee(employee_id, &update).await?;

    debug!(employee_id, name = %name, vendor = %new_employee.vendor_name, "Created employee");
    Ok(Some(employee_id))
}

async fn adopt_by_name(
    tx: &mut dyn StoreTransaction,
    name: &str,
    has_real_vendor: bool,
) -> StoreResult<Option<Employee>> {
    let mut candidates = tx.find_employees_by_name(name).await?;

    if has_real_vendor {
        return Ok(candidates.into_iter().find(|e| e.vendor_name == UNKNOWN_VENDOR));
    }

    if candidates.len() == 1 {
        return Ok(candidates.pop());
    }
    Ok(None)
}

async fn backfill(
    tx: &mut dyn StoreTransaction,
    employee: &Employee,
    vendor: Option<String>,
    labor_category: Option<String>,
) -> StoreResult<()> {
    let mut update = EmployeeUpdate::default();

    if employee.vendor_name == UNKNOWN_VENDOR {
        if let Some(vendor) = vendor {
            update.unique_key = Some(employee_key(&employee.name, &vendor));
            update.vendor_name = Some(vendor);
        }
    }
    if employee.labor_category == UNKNOWN_LCAT {
        update.labor_category = labor_category;
    }
    // Heals rows written before the public id was part of the insert transaction
    if employee.public_id.is_none() {
        update.public_id = Some(public_id(&employee.name, employee.employee_id));
    }

    if update.is_empty() {
        return Ok(());
    }

    debug!(
        employee_id = employee.employee_id,
        vendor = ?update.vendor_name,
        labor_category = ?update.labor_category,
        "Backfilling employee"
    );
    tx.update_employee(employee.employee_id, &update).await
}

/// Resolve a workstream by case-insensitive normalized name, creating it if needed.
/// Returns `Ok(None)` for a blank name.
pub async fn get_or_create_workstream(
    tx: &mut dyn StoreTransaction,
    name: &str,
) -> StoreResult<Option<i64>> {
    let name = normalize_text(name);
    if name.is_empty() {
        return Ok(None);
    }

    if let Some(workstream) = tx.find_workstream_by_name(&name).await? {
        return Ok(Some(workstream.workstream_id));
    }

    let workstream_id = tx.insert_workstream(&name).await?;
    debug!(workstream_id, name = %name, "Created workstream");
    Ok(Some(workstream_id))
}

// =============================================================================
// PER-BATCH CACHE
// =============================================================================

/// Memoizes resolutions for the lifetime of one pipeline attempt so each
/// distinct contractor or workstream is resolved once, not once per row.
///
/// Must not outlive the transaction it was filled in: ids created by a
/// rolled-back attempt are gone.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    /// (normalized name, real vendor) -> (id, whether a real labor category was applied)
    employees: HashMap<(String, Option<String>), (Option<i64>, bool)>,
    workstreams: HashMap<String, Option<i64>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Labor category does not split the cache. The first real one seen for a
    /// contractor is passed through for backfill; later ones are ignored.
    pub async fn employee(
        &mut self,
        tx: &mut dyn StoreTransaction,
        name: &str,
        vendor: Option<&str>,
        labor_category: Option<&str>,
    ) -> StoreResult<Option<i64>> {
        let cache_key = (normalize_text(name), real_vendor(vendor));
        let has_lcat = real_labor_category(labor_category).is_some();
        if let Some(&(id, lcat_applied)) = self.employees.get(&cache_key) {
            if lcat_applied || !has_lcat || id.is_none() {
                return Ok(id);
            }
        }

        let id = get_or_create_employee(tx, name, vendor, labor_category).await?;
        self.employees.insert(cache_key, (id, has_lcat));
        Ok(id)
    }

    pub async fn workstream(&mut self, tx: &mut dyn StoreTransaction, name: &str) -> StoreResult<Option<i64>> {
        let cache_key = normalize_text(name).to_lowercase();
        if let Some(id) = self.workstreams.get(&cache_key) {
            return Ok(*id);
        }

        let id = get_or_create_workstream(tx, name).await?;
        self.workstreams.insert(cache_key, id);
        Ok(id)
    }

    /// Distinct employee resolutions performed so far
    pub fn employees_resolved(&self) -> usize {
        self.employees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::{MemoryReportStore, ReportStore, StoreOp};

    #[tokio::test]
    async fn test_creates_employee_with_key_and_public_id() {
        let store = MemoryReportStore::new();
        let mut tx = store.begin().await.unwrap();

        let id = get_or_create_employee(tx.as_mut(), "  jane   doe ", Some("acme"), None)
            .await
            .unwrap()
            .unwrap();
        tx.commit().await.unwrap();

        let employee = &store.tables().employees[0];
        assert_eq!(employee.employee_id, id);
        assert_eq!(employee.name, "Jane Doe");
        assert_eq!(employee.vendor_name, "Acme");
        assert_eq!(employee.labor_category, UNKNOWN_LCAT);
        assert_eq!(employee.unique_key, employee_key("Jane Doe", "Acme"));
        assert_eq!(employee.public_id.as_deref(), Some("DOE-JANE-001"));
    }

    #[tokio::test]
    async fn test_equivalent_names_converge_on_one_insert() {
        let store = MemoryReportStore::new();
        let mut tx = store.begin().await.unwrap();

        let first = get_or_create_employee(tx.as_mut(), "Jane Doe", Some("Acme"), None).await.unwrap();
        let second = get_or_create_employee(tx.as_mut(), " JANE\tdoe ", Some(" acme "), None).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.calls(StoreOp::InsertEmployee), 1);
    }

    #[tokio::test]
    async fn test_blank_name_resolves_to_nothing() {
        let store = MemoryReportStore::new();
        let mut tx = store.begin().await.unwrap();

        assert_eq!(get_or_create_employee(tx.as_mut(), "   \n ", Some("Acme"), None).await.unwrap(), None);
        assert_eq!(get_or_create_workstream(tx.as_mut(), "").await.unwrap(), None);
        assert_eq!(store.calls(StoreOp::InsertEmployee), 0);
    }

    #[tokio::test]
    async fn test_sentinel_vendor_is_backfilled_once() {
        let store = MemoryReportStore::new();
        let mut tx = store.begin().await.unwrap();

        let id = get_or_create_employee(tx.as_mut(), "Jane Doe", None, None).await.unwrap();
        let again = get_or_create_employee(tx.as_mut(), "Jane Doe", Some("Acme"), Some("Analyst"))
            .await
            .unwrap();
        assert_eq!(id, again);

        // A different real vendor must not replace the backfilled one
        let third = get_or_create_employee(tx.as_mut(), "Jane Doe", Some("Globex"), Some("Engineer"))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let tables = store.tables();
        let jane = tables.employees.iter().find(|e| Some(e.employee_id) == id).unwrap();
        assert_eq!(jane.vendor_name, "Acme");
        assert_eq!(jane.labor_category, "Analyst");
        assert_eq!(jane.unique_key, employee_key("Jane Doe", "Acme"));
        assert_ne!(third, id);
        assert_eq!(tables.employees.len(), 2);
    }

    #[tokio::test]
    async fn test_real_vendor_never_regresses() {
        let store = MemoryReportStore::new();
        let mut tx = store.begin().await.unwrap();

        let id = get_or_create_employee(tx.as_mut(), "Jane Doe", Some("Acme"), Some("Analyst"))
            .await
            .unwrap();
        let same = get_or_create_employee(tx.as_mut(), "Jane Doe", None, Some("Unknown LCAT"))
            .await
            .unwrap();
        assert_eq!(id, same);
        tx.commit().await.unwrap();

        let tables = store.tables();
        assert_eq!(tables.employees.len(), 1);
        assert_eq!(tables.employees[0].vendor_name, "Acme");
        assert_eq!(tables.employees[0].labor_category, "Analyst");
    }

    #[tokio::test]
    async fn test_sentinel_lookup_is_ambiguous_with_two_vendors() {
        let store = MemoryReportStore::new();
        let mut tx = store.begin().await.unwrap();

        let acme = get_or_create_employee(tx.as_mut(), "Jane Doe", Some("Acme"), None).await.unwrap();
        let globex = get_or_create_employee(tx.as_mut(), "Jane Doe", Some("Globex"), None).await.unwrap();
        let unknown = get_or_create_employee(tx.as_mut(), "Jane Doe", None, None).await.unwrap();

        assert_ne!(acme, globex);
        assert_ne!(unknown, acme);
        assert_ne!(unknown, globex);
    }

    #[tokio::test]
    async fn test_workstream_lookup_is_case_insensitive() {
        let store = MemoryReportStore::new();
        let mut tx = store.begin().await.unwrap();

        let first = get_or_create_workstream(tx.as_mut(), "data  ops").await.unwrap();
        let second = get_or_create_workstream(tx.as_mut(), "DATA OPS").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.calls(StoreOp::InsertWorkstream), 1);
    }

    #[tokio::test]
    async fn test_cache_ignores_later_labor_categories() {
        let store = MemoryReportStore::new();
        let mut tx = store.begin().await.unwrap();
        let mut cache = ResolutionCache::new();

        let first = cache.employee(tx.as_mut(), "Jane Doe", Some("Acme"), Some("Analyst")).await.unwrap();
        let second = cache.employee(tx.as_mut(), "jane  doe", Some("acme"), Some("Engineer")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(cache.employees_resolved(), 1);
        assert_eq!(store.calls(StoreOp::FindEmployee), 1);
    }

    #[tokio::test]
    async fn test_cache_passes_first_real_labor_category_through() {
        let store = MemoryReportStore::new();
        let mut tx = store.begin().await.unwrap();
        let mut cache = ResolutionCache::new();

        let first = cache.employee(tx.as_mut(), "Jane Doe", Some("Acme"), None).await.unwrap();
        let second = cache.employee(tx.as_mut(), "Jane Doe", Some("Acme"), Some("Analyst")).await.unwrap();
        let third = cache.employee(tx.as_mut(), "Jane Doe", Some("Acme"), Some("Engineer")).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second, third);
        assert_eq!(store.calls(StoreOp::FindEmployee), 2);
        assert_eq!(store.tables().employees[0].labor_category, "Analyst");
    }

    #[tokio::test]
    async fn test_cache_resolves_each_contractor_once() {
        let store = MemoryReportStore::new();
        let mut tx = store.begin().await.unwrap();
        let mut cache = ResolutionCache::new();

        for _ in 0..4 {
            cache.employee(tx.as_mut(), "jane doe", Some("Acme"), None).await.unwrap();
            cache.workstream(tx.as_mut(), "Data Ops").await.unwrap();
        }

        assert_eq!(cache.employees_resolved(), 1);
        assert_eq!(store.calls(StoreOp::FindEmployee), 1);
        assert_eq!(store.calls(StoreOp::FindWorkstream), 1);
    }
}
