//! Existing-facts snapshot for duplicate detection
//!
//! `SnapshotCache` hands out a snapshot of every stored natural key, reusing
//! it while it is younger than `max_age`. The pipeline calls `invalidate()`
//! after each successful commit. A `max_age` of zero disables reuse.
//!
//! Safe to share via `Arc<SnapshotCache>` across async tasks.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::error::StoreResult;
use crate::services::dedup::{AccomplishmentKey, WeeklyReportKey};
use crate::services::store::ReportStore;

/// Natural keys of everything already stored
#[derive(Debug, Clone, Default)]
pub struct FactSnapshot {
    pub weekly_reports: HashSet<WeeklyReportKey>,
    pub accomplishments: HashSet<AccomplishmentKey>,
}

impl FactSnapshot {
    pub async fn load(store: &dyn ReportStore) -> StoreResult<Self> {
        let weekly_reports = store.weekly_report_keys().await?.iter().map(WeeklyReportKey::from).collect();
        let accomplishments = store.accomplishment_keys().await?.iter().map(AccomplishmentKey::from).collect();
        Ok(Self {
            weekly_reports,
            accomplishments,
        })
    }
}

#[derive(Default)]
struct CacheState {
    current: Option<(Instant, Arc<FactSnapshot>)>,
    /// Bumped by `invalidate()` so a load that raced with it is not kept
    generation: u64,
}

pub struct SnapshotCache {
    max_age: Duration,
    state: Mutex<CacheState>,
}

impl SnapshotCache {
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// A cache that reloads on every call
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Cached snapshot if still fresh, otherwise a new load from `store`
    pub async fn get(&self, store: &dyn ReportStore) -> StoreResult<Arc<FactSnapshot>> {
        let generation = {
            let state = self.state.lock();
            if let Some((loaded_at, snapshot)) = &state.current {
                if loaded_at.elapsed() < self.max_age {
                    return Ok(Arc::clone(snapshot));
                }
            }
            state.generation
        };

        let snapshot = Arc::new(FactSnapshot::load(store).await?);
        debug!(
            weekly_reports = snapshot.weekly_reports.len(),
            accomplishments = snapshot.accomplishments.len(),
            "Loaded existing-facts snapshot"
        );

        if !self.max_age.is_zero() {
            let mut state = self.state.lock();
            if state.generation == generation {
                state.current = Some((Instant::now(), Arc::clone(&snapshot)));
            }
        }
        Ok(snapshot)
    }

    /// Drop the cached snapshot; the next `get` reloads
    pub fn invalidate(&self) {
        let mut state = self.state.lock();
        state.current = None;
        state.generation += 1;
    }
}
