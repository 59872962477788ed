//! Queue control surface.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use ytmp3_media::{artifact_path, temp_path};
use ytmp3_models::{Job, JobId, JobStatus};
use ytmp3_queue::{EventSender, JobStore};
use ytmp3_worker::WorkerScheduler;

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};

/// Queue control operations: everything a client can do to the queue.
///
/// The dependency is one-directional: this layer calls into the scheduler
/// (`cancel`/`cancel_all`), never the reverse. Removal of a cancelled job's
/// record and artifacts happens here — the executor deliberately leaves both
/// alone once signalled.
#[derive(Clone)]
pub struct QueueService {
    store: Arc<JobStore>,
    scheduler: Arc<WorkerScheduler>,
    events: EventSender,
    download_dir: PathBuf,
    temp_dir: PathBuf,
    default_quality: String,
}

impl QueueService {
    pub fn new(
        store: Arc<JobStore>,
        scheduler: Arc<WorkerScheduler>,
        events: EventSender,
        config: &ApiConfig,
    ) -> Self {
        Self {
            store,
            scheduler,
            events,
            download_dir: config.download_dir.clone(),
            temp_dir: config.temp_dir.clone(),
            default_quality: config.default_quality.clone(),
        }
    }

    /// Append pending jobs for each URL, in request order.
    pub fn submit(&self, urls: Vec<String>, quality: String) -> ApiResult<Vec<Job>> {
        if urls.is_empty() {
            return Err(ApiError::bad_request("At least one URL is required"));
        }
        let quality = if quality.trim().is_empty() {
            self.default_quality.clone()
        } else {
            quality
        };

        let jobs: Vec<Job> = urls.into_iter().map(|url| Job::new(url, &quality)).collect();
        info!(count = jobs.len(), "Submitting downloads");
        self.store.append(jobs.clone());
        Ok(jobs)
    }

    /// All jobs in submission order.
    pub fn list(&self) -> Vec<Job> {
        self.store.list()
    }

    /// One job, or 404.
    pub fn get(&self, id: &JobId) -> ApiResult<Job> {
        self.store
            .get(id)
            .ok_or_else(|| ApiError::not_found("Download not found"))
    }

    /// Cancel-or-remove one job.
    ///
    /// An in-flight job gets its cancellation handle signalled; a pending
    /// one is simply never dispatched once the record is gone. Either way
    /// the record and any artifact files are removed here.
    pub async fn cancel(&self, id: &JobId) -> ApiResult<()> {
        let job = self.get(id)?;

        let was_active = self.scheduler.cancel(id);
        debug!(job_id = %id, was_active, "Cancelling download");

        self.delete_artifacts(&job).await;
        self.store.remove(id);
        self.events.state_changed_now(id);
        Ok(())
    }

    /// Reset a failed/cancelled job to pending for another attempt.
    pub fn retry(&self, id: &JobId) -> ApiResult<Job> {
        let mut job = self.get(id)?;
        if !job.retry() {
            return Err(ApiError::bad_request(
                "Only failed or cancelled downloads can be retried",
            ));
        }
        info!(job_id = %id, attempt = job.attempt, "Retrying download");
        self.store.put(id, job.clone());
        self.events.state_changed_now(id);
        Ok(job)
    }

    /// Remove completed/skipped jobs and their artifacts.
    pub async fn clear_completed(&self) {
        for job in self.store.list() {
            if matches!(job.status, JobStatus::Completed | JobStatus::Skipped) {
                self.delete_artifacts(&job).await;
                self.store.remove(&job.id);
                self.events.state_changed_now(&job.id);
            }
        }
    }

    /// Cancel every in-flight job and remove all pending/active records.
    pub async fn cancel_all(&self) {
        self.scheduler.cancel_all();

        for job in self.store.list() {
            if job.status == JobStatus::Pending || job.status.is_active() {
                self.delete_artifacts(&job).await;
                self.store.remove(&job.id);
                self.events.state_changed_now(&job.id);
            }
        }
    }

    /// Cancel everything, remove every record, wipe artifacts from disk.
    pub async fn clear_all(&self) {
        self.scheduler.cancel_all();

        for job in self.store.list() {
            self.delete_artifacts(&job).await;
            self.store.remove(&job.id);
            self.events.state_changed_now(&job.id);
        }

        // Sweep stragglers the records no longer point at.
        if let Ok(mut entries) = tokio::fs::read_dir(&self.download_dir).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "mp3") {
                    let _ = tokio::fs::remove_file(&path).await;
                }
            }
        }
    }

    /// Best-effort removal of a job's files: the finished artifact (or the
    /// one its title would map to) and any in-flight temp file.
    async fn delete_artifacts(&self, job: &Job) {
        let mut paths = Vec::new();
        if let Some(fp) = &job.file_path {
            paths.push(PathBuf::from(fp));
        }
        if !job.title.is_empty() {
            paths.push(artifact_path(&self.download_dir, &job.title));
            paths.push(temp_path(&self.temp_dir, &job.title));
        }

        for path in paths {
            if tokio::fs::remove_file(&path).await.is_ok() {
                debug!(path = %path.display(), "Deleted artifact");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use crate::testing::{test_state, ScriptedMedia};
    use ytmp3_models::QueueStats;

    fn submit_one(state: &AppState, url: &str) -> JobId {
        state
            .queue
            .submit(vec![url.to_string()], "192k".into())
            .unwrap()[0]
            .id
            .clone()
    }

    #[tokio::test]
    async fn submit_rejects_empty_url_list() {
        let (state, _tmp) = test_state(ScriptedMedia::idle());
        let err = state.queue.submit(vec![], "192k".into()).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn submit_preserves_order_and_defaults_quality() {
        let (state, _tmp) = test_state(ScriptedMedia::idle());
        let jobs = state
            .queue
            .submit(
                vec!["https://e.com/1".into(), "https://e.com/2".into()],
                "".into(),
            )
            .unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].quality, "192k");

        let listed = state.queue.list();
        assert_eq!(listed[0].url, "https://e.com/1");
        assert_eq!(listed[1].url, "https://e.com/2");
    }

    #[tokio::test]
    async fn get_unknown_id_is_not_found() {
        let (state, _tmp) = test_state(ScriptedMedia::idle());
        let err = state.queue.get(&"missing".into()).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn cancel_pending_removes_it_from_the_list() {
        let (state, _tmp) = test_state(ScriptedMedia::idle());
        let id = submit_one(&state, "https://e.com/pending");

        state.queue.cancel(&id).await.unwrap();
        assert!(state.queue.list().is_empty());
        assert!(state.queue.get(&id).is_err());

        // Cancelling again is a 404, not a panic.
        assert!(state.queue.cancel(&id).await.is_err());
    }

    #[tokio::test]
    async fn retry_is_rejected_unless_failed_or_cancelled() {
        let (state, _tmp) = test_state(ScriptedMedia::idle());
        let id = submit_one(&state, "https://e.com/x");

        // Pending: rejected.
        assert!(state.queue.retry(&id).is_err());

        // Completed: rejected.
        let mut job = state.queue.get(&id).unwrap();
        job.complete("/d/x.mp3", 1);
        state.store.put(&id, job);
        assert!(state.queue.retry(&id).is_err());

        // Failed: resets error, bumps attempt.
        let mut job = state.queue.get(&id).unwrap();
        job.status = JobStatus::Failed;
        job.error = Some("boom".into());
        state.store.put(&id, job);

        let retried = state.queue.retry(&id).unwrap();
        assert_eq!(retried.status, JobStatus::Pending);
        assert_eq!(retried.error, None);
        assert_eq!(retried.attempt, 2);
    }

    #[tokio::test]
    async fn clear_completed_removes_only_finished_jobs() {
        let (state, _tmp) = test_state(ScriptedMedia::idle());
        let done = submit_one(&state, "https://e.com/done");
        let skipped = submit_one(&state, "https://e.com/skipped");
        let pending = submit_one(&state, "https://e.com/pending");
        let failed = submit_one(&state, "https://e.com/failed");

        let mut j = state.queue.get(&done).unwrap();
        j.complete("/d/done.mp3", 1);
        state.store.put(&done, j);
        let mut j = state.queue.get(&skipped).unwrap();
        j.skip("/d/skipped.mp3", 1);
        state.store.put(&skipped, j);
        let mut j = state.queue.get(&failed).unwrap();
        j.fail("boom");
        state.store.put(&failed, j);

        state.queue.clear_completed().await;

        let remaining: Vec<JobId> = state.queue.list().into_iter().map(|j| j.id).collect();
        assert_eq!(remaining, vec![pending, failed]);
    }

    #[tokio::test]
    async fn clear_all_empties_the_store() {
        let (state, _tmp) = test_state(ScriptedMedia::idle());
        submit_one(&state, "https://e.com/1");
        submit_one(&state, "https://e.com/2");

        state.queue.clear_all().await;
        assert!(state.queue.list().is_empty());
        assert_eq!(state.fanout.current_stats(), QueueStats::default());
    }

    #[tokio::test]
    async fn stats_follow_the_snapshot() {
        let (state, _tmp) = test_state(ScriptedMedia::idle());
        submit_one(&state, "https://e.com/1");
        let failed = submit_one(&state, "https://e.com/2");
        let mut j = state.queue.get(&failed).unwrap();
        j.fail("boom");
        state.store.put(&failed, j);

        let stats = state.fanout.current_stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(
            stats.total,
            stats.pending + stats.active + stats.completed + stats.failed
        );
    }
}
