//! Registry of batch scoring jobs.
//!
//! Jobs are created on submit, mutated only by their worker, polled by
//! callers, and reaped once they have been terminal for longer than the TTL.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::error::{DashboardError, Result};

pub const DEFAULT_JOB_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFailure {
    pub feature_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringJob {
    pub id: String,
    pub status: JobStatus,
    /// Items attempted so far, successful or not.
    pub progress: usize,
    pub total: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_feature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub failures: Vec<JobFailure>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

struct JobEntry {
    job: ScoringJob,
    cancel: Arc<AtomicBool>,
}

/// Handle given to the worker that owns a job.
#[derive(Clone)]
pub struct JobHandle {
    pub id: String,
    cancel: Arc<AtomicBool>,
}

impl JobHandle {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

pub struct JobStore {
    jobs: DashMap<String, JobEntry>,
    ttl: chrono::Duration,
    shutdown: Notify,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new(DEFAULT_JOB_TTL_SECS)
    }
}

impl JobStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            jobs: DashMap::new(),
            ttl: chrono::Duration::seconds(ttl_secs.min(i64::MAX as u64 / 1000) as i64),
            shutdown: Notify::new(),
        }
    }

    /// Register a new running job. Expired jobs are reaped first.
    pub fn create(&self, total: usize) -> (ScoringJob, JobHandle) {
        self.reap_expired();

        let now = Utc::now();
        let id = uuid::Uuid::new_v4().to_string();
        let job = ScoringJob {
            id: id.clone(),
            status: JobStatus::Running,
            progress: 0,
            total,
            current_feature: None,
            error: None,
            failures: Vec::new(),
            started_at: now,
            updated_at: now,
            finished_at: None,
        };
        let cancel = Arc::new(AtomicBool::new(false));
        self.jobs.insert(
            id.clone(),
            JobEntry {
                job: job.clone(),
                cancel: cancel.clone(),
            },
        );

        log::info!("Jobs: created {} ({} features)", id, total);
        (job, JobHandle { id, cancel })
    }

    pub fn get(&self, id: &str) -> Result<ScoringJob> {
        self.jobs
            .get(id)
            .map(|e| e.job.clone())
            .ok_or_else(|| DashboardError::not_found("Scoring job", id))
    }

    /// All known jobs, newest first.
    pub fn list(&self) -> Vec<ScoringJob> {
        let mut jobs: Vec<ScoringJob> = self.jobs.iter().map(|e| e.job.clone()).collect();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        jobs
    }

    /// Request cancellation. Observed by the worker before its next item.
    /// Cancelling a finished job is accepted and changes nothing.
    pub fn cancel(&self, id: &str) -> Result<ScoringJob> {
        let entry = self
            .jobs
            .get(id)
            .ok_or_else(|| DashboardError::not_found("Scoring job", id))?;

        if !entry.job.status.is_terminal() {
            entry.cancel.store(true, Ordering::SeqCst);
            log::info!("Jobs: cancellation requested for {}", id);
        }
        Ok(entry.job.clone())
    }

    /// Mutate a running job. Terminal jobs are frozen.
    pub fn update<F>(&self, id: &str, edit: F)
    where
        F: FnOnce(&mut ScoringJob),
    {
        if let Some(mut entry) = self.jobs.get_mut(id) {
            if entry.job.status.is_terminal() {
                return;
            }
            edit(&mut entry.job);
            entry.job.updated_at = Utc::now();
        }
    }

    /// Move a running job into a terminal state.
    pub fn finish(&self, id: &str, status: JobStatus, error: Option<String>) {
        let Some(mut entry) = self.jobs.get_mut(id) else {
            return;
        };
        if entry.job.status.is_terminal() || !status.is_terminal() {
            return;
        }

        let now = Utc::now();
        let job = &mut entry.job;
        job.status = status;
        job.error = error;
        job.current_feature = None;
        if status == JobStatus::Completed {
            job.progress = job.total;
        }
        job.updated_at = now;
        job.finished_at = Some(now);

        log::info!(
            "Jobs: {} finished {:?} ({}/{}, {} failures)",
            id,
            status,
            job.progress,
            job.total,
            job.failures.len()
        );
    }

    pub fn reap_expired(&self) -> usize {
        self.reap_expired_at(Utc::now())
    }

    /// Drop terminal jobs that finished more than the TTL before `now`.
    pub fn reap_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, entry| match entry.job.finished_at {
            Some(done) if entry.job.status.is_terminal() => now - done <= self.ttl,
            _ => true,
        });
        let reaped = before.saturating_sub(self.jobs.len());
        if reaped > 0 {
            log::debug!("Jobs: reaped {} expired jobs", reaped);
        }
        reaped
    }

    pub fn stop_reaper(&self) {
        self.shutdown.notify_one();
    }
}

/// Periodically reap expired jobs until `stop_reaper` is called.
pub async fn run_job_reaper(jobs: Arc<JobStore>, every: Duration) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(every) => {
                jobs.reap_expired();
            },
            _ = jobs.shutdown.notified() => {
                log::info!("Jobs: reaper stopped");
                break;
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_job_is_not_found() {
        let store = JobStore::default();
        assert!(store.get("nope").unwrap_err().is_not_found());
        assert!(store.cancel("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn cancel_sets_flag_on_running_job() {
        let store = JobStore::default();
        let (job, handle) = store.create(3);
        assert_eq!(job.status, JobStatus::Running);
        assert!(!handle.is_cancelled());

        store.cancel(&job.id).unwrap();
        assert!(handle.is_cancelled());
        // Status only changes once the worker observes the flag.
        assert_eq!(store.get(&job.id).unwrap().status, JobStatus::Running);
    }

    #[test]
    fn cancelling_finished_job_is_a_no_op() {
        let store = JobStore::default();
        let (job, handle) = store.create(2);
        store.finish(&job.id, JobStatus::Completed, None);

        let after = store.cancel(&job.id).unwrap();
        assert_eq!(after.status, JobStatus::Completed);
        assert!(!handle.is_cancelled());
    }

    #[test]
    fn terminal_states_are_final() {
        let store = JobStore::default();
        let (job, _) = store.create(4);
        store.update(&job.id, |j| j.progress = 1);
        store.finish(&job.id, JobStatus::Cancelled, None);
        store.finish(&job.id, JobStatus::Completed, None);
        store.update(&job.id, |j| j.progress = 4);

        let job = store.get(&job.id).unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!(job.progress, 1);
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn completion_sets_progress_to_total() {
        let store = JobStore::default();
        let (job, _) = store.create(5);
        store.finish(&job.id, JobStatus::Completed, None);
        assert_eq!(store.get(&job.id).unwrap().progress, 5);
    }

    #[test]
    fn reaping_skips_running_and_fresh_jobs() {
        let store = JobStore::new(60);
        let (running, _) = store.create(1);
        let (done, _) = store.create(1);
        store.finish(&done.id, JobStatus::Failed, Some("boom".to_string()));

        let now = Utc::now();
        assert_eq!(store.reap_expired_at(now), 0);

        let later = now + chrono::Duration::seconds(120);
        assert_eq!(store.reap_expired_at(later), 1);
        assert!(store.get(&done.id).is_err());
        assert!(store.get(&running.id).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn reaper_stops_on_signal() {
        let store = Arc::new(JobStore::new(0));
        let task = tokio::spawn(run_job_reaper(store.clone(), Duration::from_secs(30)));
        tokio::task::yield_now().await;
        store.stop_reaper();
        task.await.unwrap();
    }
}
