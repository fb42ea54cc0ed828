//! Keyed interval scheduler: one repeating task per key.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::ScheduledJob;

/// Whether a job wants to keep running after an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Continue,
    /// Remove the job from the scheduler.
    Stop,
}

/// Shortest interval a job may run at.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);
/// Longest interval a job may run at; keeps the first deadline representable.
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Async job body, invoked once per interval.
pub type JobAction =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = JobOutcome> + Send>> + Send + Sync>;

struct JobEntry {
    job: ScheduledJob,
    interval: Duration,
    action: JobAction,
    /// Set while the job's task is spawned.
    cancel: Option<CancellationToken>,
}

#[derive(Default)]
struct SchedulerState {
    jobs: HashMap<String, JobEntry>,
    /// Root token while the scheduler is started.
    running: Option<CancellationToken>,
}

/// Owns the key → job table and the tasks driving each job.
///
/// Scheduling a key that already has a job cancels the old job first, so at
/// most one job per key ever runs. Jobs added before [`start`](Self::start)
/// wait until the scheduler is started.
pub struct NotificationScheduler {
    state: Arc<Mutex<SchedulerState>>,
}

impl NotificationScheduler {
    /// Create a stopped scheduler with no jobs.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SchedulerState::default())),
        }
    }

    /// Start running jobs. Pending jobs are spawned now.
    pub async fn start(&self) {
        let mut state = self.state.lock().await;
        if state.running.is_some() {
            return;
        }
        let root = CancellationToken::new();
        for entry in state.jobs.values_mut() {
            entry.cancel = Some(spawn_job(self.state.clone(), entry, &root));
        }
        info!("Notification scheduler started with {} jobs", state.jobs.len());
        state.running = Some(root);
    }

    /// Cancel every job task and clear the table.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if let Some(root) = state.running.take() {
            root.cancel();
        }
        let dropped = state.jobs.len();
        state.jobs.clear();
        info!(dropped, "Notification scheduler stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.running.is_some()
    }

    /// Install a job under `key`, replacing any existing one.
    ///
    /// The first run happens one `interval` after scheduling. `interval` is
    /// clamped to [`MIN_INTERVAL`]..=[`MAX_INTERVAL`].
    pub async fn schedule(
        &self,
        key: &str,
        description: impl Into<String>,
        interval: Duration,
        action: JobAction,
    ) -> ScheduledJob {
        let interval = interval.clamp(MIN_INTERVAL, MAX_INTERVAL);
        let mut state = self.state.lock().await;

        if let Some(old) = state.jobs.remove(key) {
            if let Some(cancel) = old.cancel {
                cancel.cancel();
            }
            info!(job_key = key, old_job_id = %old.job.id, "Replacing scheduled job");
        }

        let job = ScheduledJob {
            id: uuid::Uuid::new_v4().to_string(),
            key: key.to_string(),
            description: description.into(),
            interval_secs: interval.as_secs(),
            created_at: chrono::Utc::now(),
            last_run: None,
            run_count: 0,
        };
        let mut entry = JobEntry {
            job: job.clone(),
            interval,
            action,
            cancel: None,
        };
        if let Some(root) = &state.running {
            entry.cancel = Some(spawn_job(self.state.clone(), &entry, root));
        }
        info!(job_key = key, job_id = %job.id, interval_secs = job.interval_secs, "Job scheduled");
        state.jobs.insert(key.to_string(), entry);
        job
    }

    /// Remove the job under `key`. Returns whether one existed.
    pub async fn cancel(&self, key: &str) -> bool {
        let removed = self.state.lock().await.jobs.remove(key);
        match removed {
            Some(entry) => {
                if let Some(cancel) = entry.cancel {
                    cancel.cancel();
                }
                info!(job_key = key, job_id = %entry.job.id, "Job cancelled");
                true
            }
            None => false,
        }
    }

    /// Snapshot of the job under `key`.
    pub async fn get(&self, key: &str) -> Option<ScheduledJob> {
        self.state.lock().await.jobs.get(key).map(|e| e.job.clone())
    }

    /// List all jobs.
    pub async fn list_jobs(&self) -> Vec<ScheduledJob> {
        self.state
            .lock()
            .await
            .jobs
            .values()
            .map(|e| e.job.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for NotificationScheduler {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_job(
    state: Arc<Mutex<SchedulerState>>,
    entry: &JobEntry,
    root: &CancellationToken,
) -> CancellationToken {
    let cancel = root.child_token();
    let token = cancel.clone();
    let key = entry.job.key.clone();
    let id = entry.job.id.clone();
    let interval = entry.interval;
    let action = entry.action.clone();

    tokio::spawn(async move {
        run_job(state, key, id, interval, action, token).await;
    });
    cancel
}

async fn run_job(
    state: Arc<Mutex<SchedulerState>>,
    key: String,
    id: String,
    interval: Duration,
    action: JobAction,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        debug!(job_key = %key, job_id = %id, "Running job");
        // A cancel while the action is in flight drops it; its result is never seen.
        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = action() => outcome,
        };

        let mut guard = state.lock().await;
        let Some(entry) = guard.jobs.get_mut(&key).filter(|e| e.job.id == id) else {
            break;
        };
        entry.job.last_run = Some(chrono::Utc::now());
        entry.job.run_count += 1;

        if outcome == JobOutcome::Stop {
            guard.jobs.remove(&key);
            info!(job_key = %key, job_id = %id, "Job stopped itself");
            break;
        }
    }

    debug!(job_key = %key, job_id = %id, "Job task exited");
}
