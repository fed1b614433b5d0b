//! Submission outcome types returned to the form layer

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Pipeline states; the last three are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Cleaning,
    Validating,
    Resolving,
    DuplicateChecking,
    Inserting,
    Committed,
    Failed,
    NothingToSubmit,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineState::Committed | PipelineState::Failed | PipelineState::NothingToSubmit
        )
    }
}

/// Business rule a row broke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationRule {
    RequiredField,
    AccomplishmentCount,
}

/// Row-level validation failure (row numbers are 1-based)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub row: usize,
    pub rule: ViolationRule,
    pub detail: String,
}

/// A (contractor, week) group whose accomplishment total is not exactly five
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccomplishmentCountViolation {
    pub contractor: String,
    pub week: Option<NaiveDate>,
    pub actual_count: usize,
    /// First row of the group, 1-based
    pub first_row: usize,
}

/// Result object handed back to the form layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub state: PipelineState,
    pub inserted_count: usize,
    pub inserted_reports: usize,
    pub inserted_accomplishments: usize,
    pub inserted_hours: usize,
    /// Human-readable identifiers of skipped duplicates
    pub duplicates: Vec<String>,
    pub violations: Vec<Violation>,
    /// Rows dropped for having no contractor name
    pub skipped_rows: Vec<usize>,
    pub failure_reason: Option<String>,
    pub attempts: u32,
}

impl SubmissionResult {
    pub fn new(state: PipelineState) -> Self {
        Self {
            state,
            inserted_count: 0,
            inserted_reports: 0,
            inserted_accomplishments: 0,
            inserted_hours: 0,
            duplicates: Vec::new(),
            violations: Vec::new(),
            skipped_rows: Vec::new(),
            failure_reason: None,
            attempts: 0,
        }
    }

    pub fn nothing_to_submit() -> Self {
        Self {
            failure_reason: Some("Please fill at least one row before submitting.".to_string()),
            ..Self::new(PipelineState::NothingToSubmit)
        }
    }

    pub fn rejected(violations: Vec<Violation>) -> Self {
        Self {
            failure_reason: Some(format!("{} validation violation(s); nothing was saved", violations.len())),
            violations,
            ..Self::new(PipelineState::Failed)
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            failure_reason: Some(reason.into()),
            ..Self::new(PipelineState::Failed)
        }
    }

    pub fn is_committed(&self) -> bool {
        self.state == PipelineState::Committed
    }
}

/// Progress update published while a submission runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SubmissionStatus {
    State { state: PipelineState, attempt: u32 },
    Retrying { attempt: u32, max_attempts: u32, delay_ms: u64, cause: String },
}
