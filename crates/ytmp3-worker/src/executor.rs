//! Per-job execution: the download lifecycle state machine.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn, Instrument};

use ytmp3_media::{
    artifact_path, temp_path, FetchProgress, MediaError, MediaSource, Transcoder,
};
use ytmp3_models::{Job, JobId};
use ytmp3_queue::{EventSender, JobStore, Phase};

use crate::config::WorkerConfig;

/// Shared dependencies for job execution.
pub struct ExecutionContext {
    pub store: Arc<JobStore>,
    pub events: EventSender,
    pub source: Arc<dyn MediaSource>,
    pub transcoder: Arc<dyn Transcoder>,
    pub config: WorkerConfig,
}

/// Drives a single job from dispatch to a terminal state.
///
/// The executor owns all store writes for its job while it runs, with one
/// exception: cancellation. A cancelled run returns without touching the
/// record, because the canceller removes the job (and any artifact) itself
/// and a late write would resurrect it.
pub struct JobExecutor {
    ctx: Arc<ExecutionContext>,
    cancel: watch::Receiver<bool>,
}

impl JobExecutor {
    pub fn new(ctx: Arc<ExecutionContext>, cancel: watch::Receiver<bool>) -> Self {
        Self { ctx, cancel }
    }

    /// Run the job to a terminal state (or to cancellation).
    pub async fn run(mut self, job: Job) {
        let span = tracing::info_span!("job", job_id = %job.id);
        self.execute(job).instrument(span).await;
    }

    async fn execute(&mut self, mut job: Job) {
        let job_id = job.id.clone();

        job.begin_fetching();
        self.write_through(&job).await;
        info!(url = %job.url, attempt = job.attempt, "Job dispatched");

        // Phase 1: metadata resolution.
        let track = match self.ctx.source.resolve(&job.url).await {
            Ok(track) => track,
            Err(e) if e.is_cancelled() => return,
            Err(e) => return self.fail(&job_id, e).await,
        };
        if self.cancel_requested() {
            return;
        }

        job = match self.ctx.store.get(&job_id) {
            Some(j) => j,
            None => return, // removed while resolving
        };
        job.begin_downloading(&track.title);
        self.write_through(&job).await;

        // Idempotent re-submission: the artifact path is deterministic in
        // the title, so a finished download short-circuits here.
        let artifact = artifact_path(&self.ctx.config.download_dir, &track.title);
        if let Ok(meta) = tokio::fs::metadata(&artifact).await {
            info!(path = %artifact.display(), "Artifact already exists, skipping");
            job.skip(artifact.to_string_lossy(), meta.len());
            self.write_through(&job).await;
            return;
        }

        if let Err(e) = self.prepare_dirs().await {
            return self.fail(&job_id, e.into()).await;
        }

        let temp = temp_path(&self.ctx.config.temp_dir, &track.title);
        // A stale temp file from an earlier attempt would confuse yt-dlp's
        // resume logic.
        let _ = tokio::fs::remove_file(&temp).await;

        let sink = Arc::new(ProgressSink::new(
            Arc::clone(&self.ctx.store),
            self.ctx.events.clone(),
            job_id.clone(),
            self.ctx.config.flush_interval,
        ));

        // Phase 2: transfer.
        let fetch_sink = Arc::clone(&sink);
        let fetched = self
            .ctx
            .source
            .fetch(
                &job.url,
                &temp,
                self.cancel.clone(),
                Box::new(move |p| fetch_sink.record_fetch(p)),
            )
            .await;

        match fetched {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {
                let _ = tokio::fs::remove_file(&temp).await;
                return;
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp).await;
                return self.fail(&job_id, e).await;
            }
        }
        if self.cancel_requested() {
            let _ = tokio::fs::remove_file(&temp).await;
            return;
        }

        // Phase 3: conversion.
        job = match self.ctx.store.get(&job_id) {
            Some(j) => j,
            None => return,
        };
        job.begin_converting();
        let quality = job.quality.clone();
        self.write_through(&job).await;

        let convert_sink = Arc::clone(&sink);
        let converted = self
            .ctx
            .transcoder
            .convert(
                &temp,
                &artifact,
                &quality,
                self.cancel.clone(),
                Box::new(move |percent| convert_sink.record_convert(percent)),
            )
            .await;

        let _ = tokio::fs::remove_file(&temp).await;

        match converted {
            Ok(()) => {
                let size = tokio::fs::metadata(&artifact)
                    .await
                    .map(|m| m.len())
                    .unwrap_or(0);
                let Some(mut job) = self.ctx.store.get(&job_id) else {
                    return;
                };
                job.complete(artifact.to_string_lossy(), size);
                self.write_through(&job).await;
                info!(size_bytes = size, "Job completed");
            }
            Err(e) if e.is_cancelled() => {}
            Err(e) => self.fail(&job_id, e).await,
        }
    }

    fn cancel_requested(&self) -> bool {
        *self.cancel.borrow()
    }

    async fn prepare_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.ctx.config.download_dir).await?;
        tokio::fs::create_dir_all(&self.ctx.config.temp_dir).await?;
        Ok(())
    }

    /// Write the record and emit a state event, bypassing the flush throttle.
    ///
    /// Every phase boundary goes through here so terminal/phase states are
    /// always delivered even when the throttle just swallowed a sample.
    async fn write_through(&self, job: &Job) {
        self.ctx.store.put(&job.id, job.clone());
        if let Err(e) = self.ctx.events.state_changed(&job.id).await {
            debug!("state event not delivered: {}", e);
        }
    }

    async fn fail(&self, job_id: &JobId, error: MediaError) {
        warn!("Job failed: {}", error);
        let Some(mut job) = self.ctx.store.get(job_id) else {
            return;
        };
        job.fail(error.to_string());
        self.write_through(&job).await;
    }
}

/// Throttled progress writer shared with the blocking callback contexts.
///
/// Callbacks fire at the child process's native frequency; writing the store
/// and emitting an event on every sample would amplify a busy transfer into
/// thousands of writes. Samples inside the flush interval are dropped; phase
/// boundaries flush synchronously via [`JobExecutor::write_through`].
struct ProgressSink {
    store: Arc<JobStore>,
    events: EventSender,
    job_id: JobId,
    interval: Duration,
    last_flush: Mutex<Option<Instant>>,
}

impl ProgressSink {
    fn new(store: Arc<JobStore>, events: EventSender, job_id: JobId, interval: Duration) -> Self {
        Self {
            store,
            events,
            job_id,
            interval,
            last_flush: Mutex::new(None),
        }
    }

    fn record_fetch(&self, p: FetchProgress) {
        self.flush(Phase::Downloading, |job| {
            job.progress.percent = job.progress.percent.max(p.percent);
            job.progress.downloaded_bytes = p.downloaded_bytes;
            job.progress.total_bytes = p.total_bytes;
            job.progress.speed = format_speed(p.speed);
        });
    }

    fn record_convert(&self, percent: f64) {
        self.flush(Phase::Converting, |job| {
            job.progress.percent = job.progress.percent.max(percent);
        });
    }

    fn flush(&self, phase: Phase, update: impl Fn(&mut Job)) {
        {
            let mut last = self.last_flush.lock().expect("flush clock poisoned");
            let now = Instant::now();
            if last.is_some_and(|t| now.duration_since(t) < self.interval) {
                return;
            }
            *last = Some(now);
        }

        // The record may have been removed by a concurrent cancel; a miss
        // simply drops the sample.
        let Some(mut job) = self.store.get(&self.job_id) else {
            return;
        };
        update(&mut job);
        let percent = job.progress.percent;
        self.store.put(&self.job_id, job);
        self.events.progress(&self.job_id, phase, percent);
    }
}

fn format_speed(bytes_per_sec: f64) -> String {
    if bytes_per_sec > 0.0 {
        format!("{:.1} KB/s", bytes_per_sec / 1024.0)
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ytmp3_queue::ProgressChannel;

    fn sink_with_interval(store: Arc<JobStore>, id: JobId, interval: Duration) -> ProgressSink {
        let (events, _rx) = ProgressChannel::bounded(16);
        ProgressSink::new(store, events, id, interval)
    }

    fn seeded_store() -> (Arc<JobStore>, JobId) {
        let store = Arc::new(JobStore::new());
        let mut job = Job::new("https://e.com/v", "192k");
        job.begin_fetching();
        job.begin_downloading("T");
        let id = job.id.clone();
        store.append([job]);
        (store, id)
    }

    #[tokio::test]
    async fn samples_inside_the_interval_are_dropped() {
        let (store, id) = seeded_store();
        let sink = sink_with_interval(Arc::clone(&store), id.clone(), Duration::from_secs(60));

        sink.record_fetch(FetchProgress {
            percent: 10.0,
            downloaded_bytes: 10,
            total_bytes: 100,
            speed: 1024.0,
        });
        sink.record_fetch(FetchProgress {
            percent: 50.0,
            downloaded_bytes: 50,
            total_bytes: 100,
            speed: 1024.0,
        });

        let job = store.get(&id).unwrap();
        assert_eq!(job.progress.percent, 10.0);
        assert_eq!(job.progress.downloaded_bytes, 10);
    }

    #[tokio::test]
    async fn zero_interval_flushes_every_sample_monotonically() {
        let (store, id) = seeded_store();
        let sink = sink_with_interval(Arc::clone(&store), id.clone(), Duration::ZERO);

        sink.record_convert(40.0);
        sink.record_convert(30.0); // regressions are clamped
        sink.record_convert(60.0);

        let job = store.get(&id).unwrap();
        assert_eq!(job.progress.percent, 60.0);
    }

    #[tokio::test]
    async fn sample_for_removed_job_is_ignored() {
        let (store, id) = seeded_store();
        let sink = sink_with_interval(Arc::clone(&store), id.clone(), Duration::ZERO);
        store.remove(&id);

        sink.record_convert(50.0);
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn speed_formatting() {
        assert_eq!(format_speed(2048.0), "2.0 KB/s");
        assert_eq!(format_speed(0.0), "");
    }
}
