//! farewatch-cron: recurring per-key jobs.
//!
//! Jobs live in memory only; a process restart drops every schedule.

pub mod scheduler;

pub use scheduler::{JobAction, JobOutcome, NotificationScheduler};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A scheduled recurring job.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledJob {
    /// Unique job ID. Changes every time the key is rescheduled.
    pub id: String,
    /// Key the job is registered under (one job per key).
    pub key: String,
    /// Human-readable summary of what the job does.
    pub description: String,
    /// Seconds between runs.
    pub interval_secs: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last execution time.
    pub last_run: Option<DateTime<Utc>>,
    /// Completed executions.
    pub run_count: u64,
}
