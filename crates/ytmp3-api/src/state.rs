//! Application state.

use std::sync::Arc;

use tokio::sync::mpsc;

use ytmp3_media::{FfmpegTranscoder, MediaSource, Transcoder, YtdlpSource};
use ytmp3_queue::{JobStore, ProgressChannel, QueueEvent};
use ytmp3_worker::{ExecutionContext, WorkerConfig, WorkerScheduler};

use crate::config::ApiConfig;
use crate::fanout::NotificationFanout;
use crate::services::QueueService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<JobStore>,
    pub scheduler: Arc<WorkerScheduler>,
    pub fanout: Arc<NotificationFanout>,
    pub queue: QueueService,
}

impl AppState {
    /// Wire up state with the production collaborators (yt-dlp, ffmpeg).
    ///
    /// Returns the progress event receiver; the caller hands it to
    /// [`NotificationFanout::run`] alongside spawning the scheduler.
    pub fn new(config: ApiConfig, worker_config: WorkerConfig) -> (Self, mpsc::Receiver<QueueEvent>) {
        Self::with_collaborators(
            config,
            worker_config,
            Arc::new(YtdlpSource::new()),
            Arc::new(FfmpegTranscoder::new()),
        )
    }

    /// Wire up state with explicit collaborators (used by tests).
    pub fn with_collaborators(
        config: ApiConfig,
        worker_config: WorkerConfig,
        source: Arc<dyn MediaSource>,
        transcoder: Arc<dyn Transcoder>,
    ) -> (Self, mpsc::Receiver<QueueEvent>) {
        let store = Arc::new(JobStore::new());
        let (events, events_rx) = ProgressChannel::bounded(worker_config.event_buffer);

        let scheduler = Arc::new(WorkerScheduler::new(ExecutionContext {
            store: Arc::clone(&store),
            events: events.clone(),
            source,
            transcoder,
            config: worker_config,
        }));

        let fanout = Arc::new(NotificationFanout::new(Arc::clone(&store)));
        let queue = QueueService::new(Arc::clone(&store), Arc::clone(&scheduler), events, &config);

        (
            Self {
                config,
                store,
                scheduler,
                fanout,
                queue,
            },
            events_rx,
        )
    }
}
