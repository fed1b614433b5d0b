//! Submission pipeline
//!
//! Drives one grid batch to a terminal state:
//!
//! ```text
//! Idle -> Cleaning -> Validating -> Resolving -> DuplicateChecking -> Inserting -> Committed
//!                          |                                                    \-> Failed
//!                          \-> Failed (violations, nothing written)
//! ```
//!
//! An all-blank batch ends in `NothingToSubmit` without entering the
//! pipeline. Resolution, duplicate checking and inserts share one store
//! transaction. A transient store failure re-runs the whole attempt from
//! `Cleaning` under the configured `RetryPolicy`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::defaults::{ANONYMOUS, SOURCE_MANUAL_FORM};
use crate::error::StoreResult;
use crate::services::cleaner::{clean_batch, CleanRow};
use crate::services::dedup::{partition, AccomplishmentKey, WeeklyReportKey};
use crate::services::normalize::normalize_text;
use crate::services::resolver::ResolutionCache;
use crate::services::retry::RetryPolicy;
use crate::services::snapshot::{FactSnapshot, SnapshotCache};
use crate::services::store::{ReportStore, StoreTransaction};
use crate::services::validator::{required_field_violations, validate_accomplishment_count};
use crate::types::{
    is_blank_row, ColumnMapping, Field, FormKind, FormSchema, NewAccomplishment, NewHoursEntry, NewWeeklyReport,
    PipelineState, RawRow, SubmissionResult, SubmissionStatus, SubmitBatchRequest, Violation,
};

/// Receives state changes and retry notices while a submission runs
pub trait ProgressReporter: Send + Sync {
    fn report(&self, status: SubmissionStatus);
}

/// Discards progress (CLI, tests)
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _status: SubmissionStatus) {}
}

/// A validated row with its resolved ids
struct ResolvedRow<'a> {
    row: &'a CleanRow,
    employee_id: i64,
    workstream_id: Option<i64>,
}

/// A weekly report and the hours entry that goes with it
struct WeeklyCandidate {
    report: NewWeeklyReport,
    hours: Option<NewHoursEntry>,
}

/// Rows one attempt will write, after duplicate removal
#[derive(Default)]
struct WritePlan {
    reports: Vec<NewWeeklyReport>,
    hours: Vec<NewHoursEntry>,
    accomplishments: Vec<NewAccomplishment>,
    duplicates: Vec<String>,
}

pub struct SubmissionPipeline {
    store: Arc<dyn ReportStore>,
    mapping: Arc<ColumnMapping>,
    retry: RetryPolicy,
    snapshots: Arc<SnapshotCache>,
}

impl SubmissionPipeline {
    pub fn new(
        store: Arc<dyn ReportStore>,
        mapping: Arc<ColumnMapping>,
        retry: RetryPolicy,
        snapshots: Arc<SnapshotCache>,
    ) -> Self {
        Self {
            store,
            mapping,
            retry,
            snapshots,
        }
    }

    /// Run one submission to a terminal state. Never panics on bad input;
    /// every outcome is described by the returned result.
    pub async fn submit(
        &self,
        form: FormKind,
        request: SubmitBatchRequest,
        progress: &dyn ProgressReporter,
    ) -> SubmissionResult {
        if request.rows.iter().all(is_blank_row) {
            info!(form = form.as_str(), "Nothing to submit");
            progress.report(SubmissionStatus::State {
                state: PipelineState::NothingToSubmit,
                attempt: 0,
            });
            return SubmissionResult::nothing_to_submit();
        }

        let entered_by = request
            .entered_by
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(ANONYMOUS);
        let rows = request.rows.as_slice();

        debug!(form = form.as_str(), rows = rows.len(), entered_by, "Submission started");

        let outcome = self
            .retry
            .run(
                "submit batch",
                move |attempt| self.run_attempt(form, rows, entered_by, attempt, progress),
                |notice| {
                    progress.report(SubmissionStatus::Retrying {
                        attempt: notice.attempt,
                        max_attempts: notice.max_attempts,
                        delay_ms: notice.delay.as_millis() as u64,
                        cause: notice.cause.clone(),
                    })
                },
            )
            .await;

        let attempts = outcome.attempts;
        let mut result = match outcome.result {
            Ok(result) => result,
            Err(err) => SubmissionResult::failed(format!(
                "Submission failed after {} attempt(s): {}",
                attempts,
                err.message()
            )),
        };
        result.attempts = attempts;

        if result.is_committed() {
            self.snapshots.invalidate();
            info!(
                form = form.as_str(),
                inserted = result.inserted_count,
                duplicates = result.duplicates.len(),
                skipped = result.skipped_rows.len(),
                attempts,
                "Submission committed"
            );
        } else {
            warn!(
                form = form.as_str(),
                violations = result.violations.len(),
                reason = result.failure_reason.as_deref().unwrap_or(""),
                attempts,
                "Submission failed"
            );
        }

        progress.report(SubmissionStatus::State {
            state: result.state,
            attempt: attempts,
        });
        result
    }

    fn transition(&self, state: PipelineState, attempt: u32, progress: &dyn ProgressReporter) {
        debug!(state = ?state, attempt, "Pipeline state");
        progress.report(SubmissionStatus::State { state, attempt });
    }

    /// One pass from `Cleaning` to a committed transaction or a rejection
    async fn run_attempt(
        &self,
        form: FormKind,
        rows: &[RawRow],
        entered_by: &str,
        attempt: u32,
        progress: &dyn ProgressReporter,
    ) -> StoreResult<SubmissionResult> {
        let schema = self.mapping.schema(form);

        self.transition(PipelineState::Cleaning, attempt, progress);
        let (named, unnamed): (Vec<CleanRow>, Vec<CleanRow>) = clean_batch(rows, schema)
            .into_iter()
            .partition(|row| !normalize_text(row.text(Field::ContractorName)).is_empty());
        let skipped_rows: Vec<usize> = unnamed.iter().map(|row| row.row_number).collect();
        if !skipped_rows.is_empty() {
            debug!(rows = ?skipped_rows, "Skipping rows without a contractor name");
        }

        self.transition(PipelineState::Validating, attempt, progress);
        let mut violations = required_field_violations(&named, schema);
        if !schema.accomplishment_slots().is_empty() {
            violations.extend(validate_accomplishment_count(&named).into_iter().map(Violation::from));
        }
        if !violations.is_empty() {
            violations.sort_by_key(|v| v.row);
            let mut result = SubmissionResult::rejected(violations);
            result.skipped_rows = skipped_rows;
            return Ok(result);
        }

        let mut tx = self.store.begin().await?;
        let written = self
            .write_batch(tx.as_mut(), form, schema, &named, entered_by, attempt, progress)
            .await;
        match written {
            Ok(mut result) => {
                if let Err(err) = tx.commit().await {
                    // Outcome unknown: the rows may have landed, so the next
                    // attempt must not trust a snapshot taken before them
                    self.snapshots.invalidate();
                    return Err(err);
                }
                result.skipped_rows = skipped_rows;
                Ok(result)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn write_batch(
        &self,
        tx: &mut dyn StoreTransaction,
        form: FormKind,
        schema: &FormSchema,
        rows: &[CleanRow],
        entered_by: &str,
        attempt: u32,
        progress: &dyn ProgressReporter,
    ) -> StoreResult<SubmissionResult> {
        self.transition(PipelineState::Resolving, attempt, progress);
        let mut cache = ResolutionCache::new();
        let mut resolved = Vec::with_capacity(rows.len());
        for row in rows {
            let employee_id = cache
                .employee(
                    tx,
                    row.text(Field::ContractorName),
                    optional_text(row, Field::VendorName),
                    optional_text(row, Field::LaborCategory),
                )
                .await?;
            let Some(employee_id) = employee_id else {
                continue;
            };
            let workstream_id = match optional_text(row, Field::Workstream) {
                Some(name) => cache.workstream(tx, name).await?,
                None => None,
            };
            resolved.push(ResolvedRow {
                row,
                employee_id,
                workstream_id,
            });
        }
        debug!(rows = resolved.len(), employees = cache.employees_resolved(), "Resolved identities");

        self.transition(PipelineState::DuplicateChecking, attempt, progress);
        let snapshot = self.snapshots.get(self.store.as_ref()).await?;
        let now = Utc::now();
        let mut plan = WritePlan::default();
        if form == FormKind::WeeklyReport {
            plan_weekly_reports(&mut plan, &resolved, &snapshot, entered_by, now);
        }
        if !schema.accomplishment_slots().is_empty() {
            plan_accomplishments(&mut plan, &resolved, &snapshot, entered_by, now);
        }

        self.transition(PipelineState::Inserting, attempt, progress);
        if !plan.reports.is_empty() {
            tx.insert_weekly_reports(&plan.reports).await?;
        }
        if !plan.hours.is_empty() {
            tx.insert_hours(&plan.hours).await?;
        }
        if !plan.accomplishments.is_empty() {
            tx.insert_accomplishments(&plan.accomplishments).await?;
        }

        let mut result = SubmissionResult::new(PipelineState::Committed);
        result.inserted_reports = plan.reports.len();
        result.inserted_hours = plan.hours.len();
        result.inserted_accomplishments = plan.accomplishments.len();
        result.inserted_count = result.inserted_reports + result.inserted_accomplishments;
        result.duplicates = plan.duplicates;
        Ok(result)
    }
}

/// Trimmed cell text, `None` when blank
fn optional_text(row: &CleanRow, field: Field) -> Option<&str> {
    (!row.is_blank(field)).then(|| row.text(field).trim())
}

fn weekly_candidate(resolved: &ResolvedRow<'_>, entered_by: &str, now: DateTime<Utc>) -> WeeklyCandidate {
    let row = resolved.row;
    let week = row.date(Field::ReportingWeek);
    let hours_worked = row.hours_worked();

    let report = NewWeeklyReport {
        employee_id: resolved.employee_id,
        workstream_id: resolved.workstream_id,
        week_start_date: week,
        division_command: normalize_text(row.text(Field::DivisionCommand)),
        work_product_title: normalize_text(row.text(Field::WorkProductTitle)),
        contribution_description: normalize_text(row.text(Field::ContributionDescription)),
        status: normalize_text(row.text(Field::Status)),
        planned_or_unplanned: row.text(Field::PlannedOrUnplanned).trim().to_lowercase(),
        date_completed: row.date(Field::DateCompleted),
        distinct_nfr: normalize_text(row.text(Field::DistinctNfr)),
        distinct_cap: normalize_text(row.text(Field::DistinctCap)),
        effort_percentage: row.effort_percentage,
        contractor_name: normalize_text(row.text(Field::ContractorName)),
        govt_ta_name: normalize_text(row.text(Field::GovtTaName)),
        created_at: now,
        entered_by: entered_by.to_string(),
        source: SOURCE_MANUAL_FORM.to_string(),
    };

    let hours = (hours_worked > 0.0).then(|| NewHoursEntry {
        employee_id: resolved.employee_id,
        workstream_id: resolved.workstream_id,
        reporting_week: week,
        hours_worked,
        level_of_effort: row.effort_percentage,
        created_at: now,
        entered_by: entered_by.to_string(),
        source: SOURCE_MANUAL_FORM.to_string(),
    });

    WeeklyCandidate { report, hours }
}

fn plan_weekly_reports(
    plan: &mut WritePlan,
    resolved: &[ResolvedRow<'_>],
    snapshot: &FactSnapshot,
    entered_by: &str,
    now: DateTime<Utc>,
) {
    let candidates = resolved.iter().map(|r| weekly_candidate(r, entered_by, now)).collect();
    let split = partition(candidates, &snapshot.weekly_reports, |c: &WeeklyCandidate| {
        WeeklyReportKey::from(&c.report)
    });

    plan.duplicates
        .extend(split.duplicates.into_iter().map(|c| c.report.work_product_title));
    for candidate in split.to_insert {
        plan.hours.extend(candidate.hours);
        plan.reports.push(candidate.report);
    }
}

fn plan_accomplishments(
    plan: &mut WritePlan,
    resolved: &[ResolvedRow<'_>],
    snapshot: &FactSnapshot,
    entered_by: &str,
    now: DateTime<Utc>,
) {
    let candidates: Vec<NewAccomplishment> = resolved
        .iter()
        .flat_map(|r| {
            r.row.accomplishments().into_iter().map(move |text| NewAccomplishment {
                employee_id: r.employee_id,
                workstream_id: r.workstream_id,
                date_range: r.row.date(Field::ReportingWeek),
                description: normalize_text(text),
                created_at: now,
                entered_by: entered_by.to_string(),
            })
        })
        .collect();

    let split = partition(candidates, &snapshot.accomplishments, |a: &NewAccomplishment| {
        AccomplishmentKey::from(a)
    });
    plan.duplicates
        .extend(split.duplicates.into_iter().map(|a| a.description));
    plan.accomplishments.extend(split.to_insert);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::NaiveDate;
    use parking_lot::Mutex;

    use crate::defaults::UNKNOWN_LCAT;
    use crate::error::StoreError;
    use crate::services::identity::employee_key;
    use crate::services::retry::Backoff;
    use crate::services::store::{MemoryReportStore, StoreOp};
    use crate::types::{CellValue, ColumnSpec, FieldKind, ViolationRule};

    #[derive(Default)]
    struct RecordingProgress(Mutex<Vec<SubmissionStatus>>);

    impl ProgressReporter for RecordingProgress {
        fn report(&self, status: SubmissionStatus) {
            self.0.lock().push(status);
        }
    }

    impl RecordingProgress {
        fn states(&self) -> Vec<PipelineState> {
            self.0
                .lock()
                .iter()
                .filter_map(|s| match s {
                    SubmissionStatus::State { state, .. } => Some(*state),
                    _ => None,
                })
                .collect()
        }

        fn retries(&self) -> usize {
            self.0
                .lock()
                .iter()
                .filter(|s| matches!(s, SubmissionStatus::Retrying { .. }))
                .count()
        }
    }

    fn pipeline_with(store: &MemoryReportStore, mapping: ColumnMapping, max_attempts: u32) -> SubmissionPipeline {
        SubmissionPipeline::new(
            Arc::new(store.clone()),
            Arc::new(mapping),
            RetryPolicy::new(max_attempts, Backoff::Fixed(Duration::ZERO)),
            Arc::new(SnapshotCache::new(Duration::from_secs(300))),
        )
    }

    fn pipeline(store: &MemoryReportStore) -> SubmissionPipeline {
        pipeline_with(store, ColumnMapping::default(), 3)
    }

    fn cells(pairs: &[(&str, CellValue)]) -> RawRow {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn weekly_row(contractor: &str, vendor: &str, title: &str, hours: CellValue) -> RawRow {
        cells(&[
            ("Reporting Week", "2025-08-04".into()),
            ("Vendor Name", vendor.into()),
            ("Division/Command", "n  code".into()),
            ("Work Product Title", title.into()),
            ("Status", "in progress".into()),
            ("Planned/Unplanned", " Planned ".into()),
            ("Hours", hours),
            ("Contractor Name", contractor.into()),
        ])
    }

    fn accomplishment_row(contractor: &str, slots: &[usize]) -> RawRow {
        let mut row = cells(&[
            ("Contractor Name", contractor.into()),
            ("Reporting Week", "2025-08-04".into()),
            ("Workstream", "data ops".into()),
        ]);
        for slot in slots {
            row.insert(
                format!("Accomplishment {}", slot),
                CellValue::from(format!("finished item {}", slot).as_str()),
            );
        }
        row
    }

    fn request(rows: Vec<RawRow>) -> SubmitBatchRequest {
        SubmitBatchRequest { rows, entered_by: None }
    }

    #[tokio::test]
    async fn test_basic_weekly_submission() {
        let store = MemoryReportStore::new();
        let progress = RecordingProgress::default();

        let result = pipeline(&store)
            .submit(
                FormKind::WeeklyReport,
                request(vec![weekly_row("  jane   doe ", "acme", "write tests", CellValue::Number(20.0))]),
                &progress,
            )
            .await;

        assert_eq!(result.state, PipelineState::Committed);
        assert_eq!(result.inserted_count, 1);
        assert_eq!(result.inserted_hours, 1);
        assert_eq!(result.attempts, 1);

        let tables = store.tables();
        let employee = &tables.employees[0];
        assert_eq!(employee.unique_key, employee_key("Jane Doe", "Acme"));
        assert_eq!(employee.labor_category, UNKNOWN_LCAT);
        assert_eq!(employee.public_id, Some(format!("DOE-JANE-{:03}", employee.employee_id)));

        let (_, report) = &tables.weekly_reports[0];
        assert_eq!(report.week_start_date, NaiveDate::from_ymd_opt(2025, 8, 4));
        assert_eq!(report.work_product_title, "Write Tests");
        assert_eq!(report.division_command, "N Code");
        assert_eq!(report.status, "In Progress");
        assert_eq!(report.planned_or_unplanned, "planned");
        assert_eq!(report.contractor_name, "Jane Doe");
        assert_eq!(report.effort_percentage, 50.0);
        assert_eq!(report.entered_by, ANONYMOUS);
        assert_eq!(report.source, SOURCE_MANUAL_FORM);

        let (_, hours) = &tables.hours[0];
        assert_eq!(hours.hours_worked, 20.0);
        assert_eq!(hours.level_of_effort, 50.0);

        assert_eq!(
            progress.states(),
            vec![
                PipelineState::Cleaning,
                PipelineState::Validating,
                PipelineState::Resolving,
                PipelineState::DuplicateChecking,
                PipelineState::Inserting,
                PipelineState::Committed,
            ]
        );
    }

    #[tokio::test]
    async fn test_retry_after_lost_commit_ack_does_not_reinsert() {
        let store = MemoryReportStore::new();
        store.lose_next_commit_ack(StoreError::Transient("connection reset during COMMIT".into()));
        let progress = RecordingProgress::default();

        let result = pipeline(&store)
            .submit(
                FormKind::WeeklyReport,
                request(vec![weekly_row("Jane Doe", "Acme", "Write Tests", CellValue::Number(8.0))]),
                &progress,
            )
            .await;

        assert_eq!(result.state, PipelineState::Committed);
        assert_eq!(result.attempts, 2);
        assert_eq!(result.inserted_count, 0);
        assert_eq!(result.duplicates, vec!["Write Tests".to_string()]);
        assert_eq!(progress.retries(), 1);

        let tables = store.tables();
        assert_eq!(tables.weekly_reports.len(), 1);
        assert_eq!(tables.hours.len(), 1);
        assert_eq!(tables.employees.len(), 1);
        assert_eq!(store.calls(StoreOp::LoadWeeklyReportKeys), 2);
    }

    #[tokio::test]
    async fn test_resubmission_is_reported_as_duplicate() {
        let store = MemoryReportStore::new();
        let pipeline = pipeline(&store);
        let row = weekly_row("Jane Doe", "Acme", "Write Tests", CellValue::Number(8.0));

        let first = pipeline
            .submit(FormKind::WeeklyReport, request(vec![row.clone()]), &NoopProgress)
            .await;
        let second = pipeline
            .submit(FormKind::WeeklyReport, request(vec![row]), &NoopProgress)
            .await;

        assert_eq!(first.inserted_count, 1);
        assert_eq!(second.state, PipelineState::Committed);
        assert_eq!(second.inserted_count, 0);
        assert_eq!(second.inserted_hours, 0);
        assert_eq!(second.duplicates, vec!["Write Tests".to_string()]);
        assert_eq!(store.tables().weekly_reports.len(), 1);
        assert_eq!(store.tables().hours.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_hours_keep_the_row() {
        let store = MemoryReportStore::new();
        let result = pipeline(&store)
            .submit(
                FormKind::WeeklyReport,
                request(vec![weekly_row("Jane Doe", "Acme", "Write Tests", "abc".into())]),
                &NoopProgress,
            )
            .await;

        assert_eq!(result.inserted_count, 1);
        assert_eq!(result.inserted_hours, 0);
        let tables = store.tables();
        assert_eq!(tables.weekly_reports[0].1.effort_percentage, 0.0);
        assert!(tables.hours.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_rows_within_one_batch() {
        let store = MemoryReportStore::new();
        let result = pipeline(&store)
            .submit(
                FormKind::WeeklyReport,
                request(vec![
                    weekly_row("Jane Doe", "Acme", "Write Tests", CellValue::Number(8.0)),
                    weekly_row("jane doe", "ACME", "write  tests", CellValue::Number(4.0)),
                    weekly_row("Jane Doe", "Acme", "Ship Release", CellValue::Number(4.0)),
                ]),
                &NoopProgress,
            )
            .await;

        assert_eq!(result.inserted_count, 2);
        assert_eq!(result.duplicates, vec!["Write Tests".to_string()]);
        assert_eq!(store.tables().employees.len(), 1);
        assert_eq!(store.calls(StoreOp::InsertEmployee), 1);
    }

    #[tokio::test]
    async fn test_missing_required_field_blocks_the_batch() {
        let store = MemoryReportStore::new();
        let progress = RecordingProgress::default();
        let result = pipeline(&store)
            .submit(
                FormKind::WeeklyReport,
                request(vec![
                    weekly_row("Jane Doe", "Acme", "Write Tests", CellValue::Number(8.0)),
                    weekly_row("John Smith", "Acme", "   ", CellValue::Number(8.0)),
                ]),
                &progress,
            )
            .await;

        assert_eq!(result.state, PipelineState::Failed);
        assert_eq!(result.inserted_count, 0);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].row, 2);
        assert_eq!(result.violations[0].rule, ViolationRule::RequiredField);
        assert!(result.violations[0].detail.contains("Work Product Title"));
        assert_eq!(store.calls(StoreOp::Begin), 0);
        assert!(store.tables().employees.is_empty());
        assert_eq!(progress.states().last(), Some(&PipelineState::Failed));
    }

    #[tokio::test]
    async fn test_blank_contractor_row_is_skipped() {
        let store = MemoryReportStore::new();
        let result = pipeline(&store)
            .submit(
                FormKind::WeeklyReport,
                request(vec![
                    weekly_row("Jane Doe", "Acme", "Write Tests", CellValue::Number(8.0)),
                    weekly_row("  ", "Acme", "Orphan Row", CellValue::Number(8.0)),
                ]),
                &NoopProgress,
            )
            .await;

        assert_eq!(result.state, PipelineState::Committed);
        assert_eq!(result.inserted_count, 1);
        assert_eq!(result.skipped_rows, vec![2]);
        assert!(result.violations.is_empty());
    }

    #[tokio::test]
    async fn test_all_blank_batch_is_nothing_to_submit() {
        let store = MemoryReportStore::new();
        let progress = RecordingProgress::default();
        let blank = cells(&[("Contractor Name", CellValue::Null), ("Hours", "".into())]);

        let result = pipeline(&store)
            .submit(FormKind::WeeklyReport, request(vec![blank.clone(), blank]), &progress)
            .await;

        assert_eq!(result.state, PipelineState::NothingToSubmit);
        assert_eq!(progress.states(), vec![PipelineState::NothingToSubmit]);
        assert_eq!(store.calls(StoreOp::Begin), 0);

        let empty = pipeline(&store).submit(FormKind::Accomplishments, request(vec![]), &NoopProgress).await;
        assert_eq!(empty.state, PipelineState::NothingToSubmit);
    }

    #[tokio::test]
    async fn test_accomplishments_split_across_rows() {
        let store = MemoryReportStore::new();
        let result = pipeline(&store)
            .submit(
                FormKind::Accomplishments,
                request(vec![
                    accomplishment_row("John Smith", &[1, 2, 3]),
                    accomplishment_row("john smith", &[4, 5]),
                ]),
                &NoopProgress,
            )
            .await;

        assert_eq!(result.state, PipelineState::Committed);
        assert_eq!(result.inserted_accomplishments, 5);
        assert_eq!(result.inserted_count, 5);

        let tables = store.tables();
        assert_eq!(tables.employees.len(), 1);
        assert_eq!(tables.workstreams.len(), 1);
        assert_eq!(tables.workstreams[0].name, "Data Ops");
        assert_eq!(tables.accomplishments[0].1.description, "Finished Item 1");
        assert!(tables
            .accomplishments
            .iter()
            .all(|(_, a)| a.workstream_id == Some(tables.workstreams[0].workstream_id)));
    }

    #[tokio::test]
    async fn test_wrong_accomplishment_count_writes_nothing() {
        let store = MemoryReportStore::new();
        let result = pipeline(&store)
            .submit(
                FormKind::Accomplishments,
                request(vec![accomplishment_row("John Smith", &[1, 2, 3, 4])]),
                &NoopProgress,
            )
            .await;

        assert_eq!(result.state, PipelineState::Failed);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].rule, ViolationRule::AccomplishmentCount);
        assert!(result.violations[0].detail.contains("John Smith has 4"));
        assert!(store.tables().accomplishments.is_empty());
        assert_eq!(store.calls(StoreOp::Begin), 0);
    }

    #[tokio::test]
    async fn test_repeated_accomplishments_are_duplicates() {
        let store = MemoryReportStore::new();
        let pipeline = pipeline(&store);
        let batch = vec![accomplishment_row("John Smith", &[1, 2, 3, 4, 5])];

        pipeline
            .submit(FormKind::Accomplishments, request(batch.clone()), &NoopProgress)
            .await;
        let again = pipeline
            .submit(FormKind::Accomplishments, request(batch), &NoopProgress)
            .await;

        assert_eq!(again.inserted_count, 0);
        assert_eq!(again.duplicates.len(), 5);
        assert_eq!(store.tables().accomplishments.len(), 5);
    }

    #[tokio::test]
    async fn test_permanent_failure_rolls_back_everything() {
        let store = MemoryReportStore::new();
        store.fail_next(StoreOp::InsertHours, StoreError::Permanent("column \"hours\" does not exist".into()));

        let result = pipeline(&store)
            .submit(
                FormKind::WeeklyReport,
                request(vec![weekly_row("Jane Doe", "Acme", "Write Tests", CellValue::Number(8.0))]),
                &NoopProgress,
            )
            .await;

        assert_eq!(result.state, PipelineState::Failed);
        assert_eq!(result.attempts, 1);
        assert!(result.failure_reason.unwrap().contains("does not exist"));

        let tables = store.tables();
        assert!(tables.employees.is_empty());
        assert!(tables.weekly_reports.is_empty());
        assert!(tables.hours.is_empty());
    }

    #[tokio::test]
    async fn test_transient_failure_retries_from_the_start() {
        let store = MemoryReportStore::new();
        store.fail_next(StoreOp::Commit, StoreError::Transient("connection reset".into()));
        let progress = RecordingProgress::default();

        let result = pipeline(&store)
            .submit(
                FormKind::WeeklyReport,
                request(vec![weekly_row("Jane Doe", "Acme", "Write Tests", CellValue::Number(8.0))]),
                &progress,
            )
            .await;

        assert_eq!(result.state, PipelineState::Committed);
        assert_eq!(result.attempts, 2);
        assert_eq!(progress.retries(), 1);
        assert_eq!(progress.states().iter().filter(|s| **s == PipelineState::Cleaning).count(), 2);

        let tables = store.tables();
        assert_eq!(tables.employees.len(), 1);
        assert_eq!(tables.weekly_reports.len(), 1);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let store = MemoryReportStore::new();
        store.fail_times(StoreOp::Commit, 3, StoreError::Transient("connection reset".into()));

        let result = pipeline(&store)
            .submit(
                FormKind::WeeklyReport,
                request(vec![weekly_row("Jane Doe", "Acme", "Write Tests", CellValue::Number(8.0))]),
                &NoopProgress,
            )
            .await;

        assert_eq!(result.state, PipelineState::Failed);
        assert_eq!(result.attempts, 3);
        assert!(result.failure_reason.unwrap().contains("connection reset"));
        assert_eq!(store.calls(StoreOp::Commit), 3);
        assert!(store.tables().weekly_reports.is_empty());
    }

    #[tokio::test]
    async fn test_entered_by_is_recorded() {
        let store = MemoryReportStore::new();
        let mut req = request(vec![weekly_row("Jane Doe", "Acme", "Write Tests", CellValue::Number(8.0))]);
        req.entered_by = Some(" mgarcia ".into());

        pipeline(&store).submit(FormKind::WeeklyReport, req, &NoopProgress).await;

        let tables = store.tables();
        assert_eq!(tables.weekly_reports[0].1.entered_by, "mgarcia");
        assert_eq!(tables.hours[0].1.entered_by, "mgarcia");
    }

    #[tokio::test]
    async fn test_weekly_form_with_accomplishment_slots() {
        let mut mapping = ColumnMapping::default();
        let extra = std::iter::once((Field::Workstream, "Workstream".to_string())).chain(
            Field::ACCOMPLISHMENT_SLOTS
                .iter()
                .enumerate()
                .map(|(i, f)| (*f, format!("Accomplishment {}", i + 1))),
        );
        for (field, label) in extra {
            mapping.weekly_reports.columns.push(ColumnSpec {
                field,
                label,
                required: false,
                kind: FieldKind::Text,
            });
        }
        assert_eq!(mapping.validate(), Ok(()));

        let mut first = weekly_row("John Smith", "Acme", "Write Tests", CellValue::Number(20.0));
        first.insert("Workstream".into(), "Data Ops".into());
        for slot in 1..=3 {
            first.insert(format!("Accomplishment {}", slot), CellValue::from(format!("item {}", slot).as_str()));
        }
        let mut second = weekly_row("John Smith", "Acme", "Ship Release", CellValue::Number(20.0));
        for slot in 4..=5 {
            second.insert(format!("Accomplishment {}", slot), CellValue::from(format!("item {}", slot).as_str()));
        }

        let store = MemoryReportStore::new();
        let result = pipeline_with(&store, mapping, 3)
            .submit(FormKind::WeeklyReport, request(vec![first, second]), &NoopProgress)
            .await;

        assert_eq!(result.state, PipelineState::Committed);
        assert_eq!(result.inserted_reports, 2);
        assert_eq!(result.inserted_accomplishments, 5);
        assert_eq!(result.inserted_count, 7);

        let tables = store.tables();
        let workstream_id = tables.workstreams[0].workstream_id;
        assert_eq!(tables.hours[0].1.workstream_id, Some(workstream_id));
        assert_eq!(tables.hours[1].1.workstream_id, None);
    }
}
