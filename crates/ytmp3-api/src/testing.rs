//! Test fixtures shared by the crate's unit tests.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::watch;

use ytmp3_media::{
    ConvertProgressFn, FetchProgressFn, MediaResult, MediaSource, TrackInfo, Transcoder,
};
use ytmp3_worker::WorkerConfig;

use crate::config::ApiConfig;
use crate::state::AppState;

/// Trivial collaborator double for tests that never dispatch jobs.
pub(crate) struct ScriptedMedia;

impl ScriptedMedia {
    /// A collaborator that would resolve/convert instantly if ever invoked.
    pub(crate) fn idle() -> Arc<Self> {
        Arc::new(Self)
    }
}

#[async_trait]
impl MediaSource for ScriptedMedia {
    async fn resolve(&self, url: &str) -> MediaResult<TrackInfo> {
        Ok(TrackInfo {
            title: url.rsplit('/').next().unwrap_or("track").to_string(),
            duration: 1.0,
        })
    }

    async fn fetch(
        &self,
        _url: &str,
        dest: &Path,
        _cancel: watch::Receiver<bool>,
        _on_progress: FetchProgressFn,
    ) -> MediaResult<()> {
        tokio::fs::write(dest, b"raw").await?;
        Ok(())
    }
}

#[async_trait]
impl Transcoder for ScriptedMedia {
    async fn convert(
        &self,
        _input: &Path,
        output: &Path,
        _bitrate: &str,
        _cancel: watch::Receiver<bool>,
        _on_progress: ConvertProgressFn,
    ) -> MediaResult<()> {
        tokio::fs::write(output, b"mp3").await?;
        Ok(())
    }
}

/// App state over a temp directory; the scheduler is built but not running,
/// so submitted jobs stay pending unless a test drives them.
pub(crate) fn test_state(media: Arc<ScriptedMedia>) -> (AppState, TempDir) {
    let tmp = TempDir::new().expect("tempdir");
    let config = ApiConfig {
        download_dir: tmp.path().join("downloads"),
        temp_dir: tmp.path().join("tmp"),
        ..ApiConfig::default()
    };
    let worker_config = WorkerConfig {
        poll_interval: Duration::from_millis(10),
        flush_interval: Duration::ZERO,
        download_dir: config.download_dir.clone(),
        temp_dir: config.temp_dir.clone(),
        ..WorkerConfig::default()
    };

    let (state, mut events_rx) =
        AppState::with_collaborators(config, worker_config, media.clone(), media);
    // Keep the channel drained so state emission never backs up.
    tokio::spawn(async move { while events_rx.recv().await.is_some() {} });
    (state, tmp)
}
