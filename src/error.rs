//! Store error taxonomy
//!
//! Every data-store failure is either transient (worth retrying the whole
//! submission) or permanent (surfaced immediately).

use thiserror::Error;

/// Result type for data-store primitives
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Unique indexes whose violation means another submission won an identity
/// race. A retry re-runs resolution and finds the winner's row.
const IDENTITY_INDEXES: &[&str] = &["employees_unique_key_idx", "workstreams_name_lower_idx"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Connectivity loss, timeout, lock contention, identity race
    #[error("transient store failure: {0}")]
    Transient(String),

    /// Schema mismatch, constraint violation, malformed data
    #[error("store failure: {0}")]
    Permanent(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }

    pub fn message(&self) -> &str {
        match self {
            StoreError::Transient(m) | StoreError::Permanent(m) => m,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let message = err.to_string();
        match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Transient(message),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();
                let constraint = db_err.constraint().unwrap_or_default();
                if is_transient_sqlstate(&code, constraint) {
                    StoreError::Transient(message)
                } else {
                    StoreError::Permanent(message)
                }
            }
            _ => StoreError::Permanent(message),
        }
    }
}

/// Classify a Postgres SQLSTATE (plus the violated constraint, if any).
fn is_transient_sqlstate(code: &str, constraint: &str) -> bool {
    match code {
        // serialization_failure, deadlock_detected, lock_not_available, admin_shutdown
        "40001" | "40P01" | "55P03" | "57P01" => true,
        // unique_violation: only the identity indexes are a race, not bad data
        "23505" => IDENTITY_INDEXES.contains(&constraint),
        // connection_exception class
        c if c.starts_with("08") => true,
        _ => false,
    }
}
