//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs (the concurrency cap)
    pub max_concurrent_jobs: usize,
    /// Dispatch loop poll interval
    pub poll_interval: Duration,
    /// Minimum interval between progress flushes to the store
    pub flush_interval: Duration,
    /// Graceful shutdown drain timeout
    pub shutdown_timeout: Duration,
    /// Where finished MP3 artifacts land
    pub download_dir: PathBuf,
    /// Scratch directory for in-flight transfers
    pub temp_dir: PathBuf,
    /// Bound of the progress event buffer
    pub event_buffer: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 3,
            poll_interval: Duration::from_secs(1),
            flush_interval: Duration::from_millis(500),
            shutdown_timeout: Duration::from_secs(30),
            download_dir: PathBuf::from("./downloads"),
            temp_dir: std::env::temp_dir().join("ytmp3"),
            event_buffer: 256,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_concurrent_jobs),
            poll_interval: Duration::from_millis(
                std::env::var("WORKER_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
            ),
            flush_interval: Duration::from_millis(
                std::env::var("WORKER_FLUSH_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(500),
            ),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            download_dir: std::env::var("DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.download_dir),
            temp_dir: std::env::var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_dir),
            event_buffer: std::env::var("EVENT_BUFFER")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.event_buffer),
        }
    }
}
