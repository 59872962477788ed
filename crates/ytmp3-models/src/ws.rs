//! WebSocket message schemas.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::Job;
use crate::stats::QueueStats;

/// Notification envelope pushed to connected observers.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    /// A job's record changed (progress or state transition)
    #[serde(rename = "job:update")]
    JobUpdate(Job),

    /// Fresh aggregate queue counters
    #[serde(rename = "queue:stats")]
    QueueStats(QueueStats),
}

impl WsMessage {
    pub fn job_update(job: Job) -> Self {
        Self::JobUpdate(job)
    }

    pub fn queue_stats(stats: QueueStats) -> Self {
        Self::QueueStats(stats)
    }
}
