//! Download job definitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a download job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle status of a download job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting in the queue for a worker slot
    #[default]
    Pending,
    /// Resolving title/duration from the source
    #[serde(rename = "fetching")]
    FetchingInfo,
    /// Transferring the raw audio stream
    Downloading,
    /// Transcoding to MP3
    Converting,
    /// Artifact produced successfully
    Completed,
    /// Ended with an error (may be retried)
    Failed,
    /// Cancelled by the user (may be retried)
    Cancelled,
    /// Artifact already existed; nothing to do
    Skipped,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::FetchingInfo => "fetching",
            JobStatus::Downloading => "downloading",
            JobStatus::Converting => "converting",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Skipped => "skipped",
        }
    }

    /// Terminal states receive no further updates from the executor.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled | JobStatus::Skipped
        )
    }

    /// Active states occupy a concurrency slot.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            JobStatus::FetchingInfo | JobStatus::Downloading | JobStatus::Converting
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transfer progress within the current phase.
///
/// `percent` is monotonically non-decreasing within a phase and resets to 0
/// when a new phase begins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobProgress {
    pub percent: f64,
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    /// Human-readable transfer rate, e.g. "512.3 KB/s"; empty when unknown.
    pub speed: String,
}

/// One URL-to-artifact unit of work.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID, assigned at creation
    pub id: JobId,

    /// Source URL, immutable after creation
    pub url: String,

    /// Resolved display title; empty until metadata resolution completes
    #[serde(default)]
    pub title: String,

    /// Current lifecycle status
    #[serde(default)]
    pub status: JobStatus,

    /// Progress within the current phase
    #[serde(default)]
    pub progress: JobProgress,

    /// Target bitrate, e.g. "192k"
    pub quality: String,

    /// Artifact path; set only on completed/skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    /// Artifact size in bytes; set only on completed/skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,

    /// Failure message; set only on failed, cleared on retry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Dispatch timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Terminal-state timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Execution attempt counter; incremented only by explicit retry
    #[serde(default = "default_attempt")]
    pub attempt: u32,
}

fn default_attempt() -> u32 {
    1
}

impl Job {
    /// Create a new pending job.
    pub fn new(url: impl Into<String>, quality: impl Into<String>) -> Self {
        Self {
            id: JobId::new(),
            url: url.into(),
            title: String::new(),
            status: JobStatus::Pending,
            progress: JobProgress::default(),
            quality: quality.into(),
            file_path: None,
            file_size: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            attempt: 1,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Mark the job as dispatched: metadata resolution begins.
    pub fn begin_fetching(&mut self) {
        self.status = JobStatus::FetchingInfo;
        self.started_at = Some(Utc::now());
    }

    /// Enter the transfer phase with a resolved title.
    pub fn begin_downloading(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.status = JobStatus::Downloading;
        self.progress = JobProgress::default();
    }

    /// Enter the transcode phase; percent restarts, byte counters are kept.
    pub fn begin_converting(&mut self) {
        self.status = JobStatus::Converting;
        self.progress.percent = 0.0;
        self.progress.speed = String::new();
    }

    /// Mark the job as completed with its artifact.
    pub fn complete(&mut self, file_path: impl Into<String>, file_size: u64) {
        self.status = JobStatus::Completed;
        self.finish_with_artifact(file_path, file_size);
    }

    /// Mark the job as skipped: the artifact already existed.
    pub fn skip(&mut self, file_path: impl Into<String>, file_size: u64) {
        self.status = JobStatus::Skipped;
        self.finish_with_artifact(file_path, file_size);
    }

    fn finish_with_artifact(&mut self, file_path: impl Into<String>, file_size: u64) {
        self.file_path = Some(file_path.into());
        self.file_size = Some(file_size);
        self.progress.percent = 100.0;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the job as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }

    /// Whether an explicit retry is allowed from the current status.
    pub fn can_retry(&self) -> bool {
        matches!(self.status, JobStatus::Failed | JobStatus::Cancelled)
    }

    /// Reset a failed/cancelled job back to pending.
    ///
    /// Returns false (and leaves the job untouched) from any other status.
    pub fn retry(&mut self) -> bool {
        if !self.can_retry() {
            return false;
        }
        self.status = JobStatus::Pending;
        self.error = None;
        self.attempt += 1;
        self.progress = JobProgress::default();
        self.completed_at = None;
        true
    }
}
