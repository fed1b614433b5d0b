/// Stored when a submission does not name the contractor's vendor.
pub const UNKNOWN_VENDOR: &str = "Unknown Vendor";

/// Stored when a submission does not name the contractor's labor category.
pub const UNKNOWN_LCAT: &str = "Unknown LCAT";

/// `entered_by` value when the session supplies no identity.
pub const ANONYMOUS: &str = "anonymous";

/// Audit source tag written on every row created through a form submission.
pub const SOURCE_MANUAL_FORM: &str = "manual_form_submission";

/// Hours that count as 100% level of effort for one reporting week.
pub const FULL_TIME_HOURS: f64 = 40.0;

/// Every contractor reports exactly this many accomplishments per week.
pub const ACCOMPLISHMENTS_PER_WEEK: usize = 5;

pub const DEFAULT_SUBMIT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_SUBMIT_RETRY_DELAY_MS: u64 = 2_000;
pub const DEFAULT_SNAPSHOT_MAX_AGE_SECS: u64 = 300;

/// Effort percentage for a number of hours worked in one week.
pub fn effort_percentage(hours_worked: f64) -> f64 {
    (hours_worked / FULL_TIME_HOURS) * 100.0
}

/// Hours represented by an effort percentage, rounded to 2 decimals.
pub fn hours_from_effort(effort_percentage: f64) -> f64 {
    (effort_percentage / 100.0 * FULL_TIME_HOURS * 100.0).round() / 100.0
}
