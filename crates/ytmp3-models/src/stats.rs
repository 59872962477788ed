//! Derived queue statistics.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::{Job, JobStatus};

/// Aggregate queue counters, recomputed from a full job snapshot.
///
/// `active` covers the three in-flight phases; `completed` also counts
/// skipped jobs (both outcomes leave an artifact behind). Cancelled jobs are
/// removed from the store rather than kept, so every stored job falls into
/// exactly one bucket and `total = pending + active + completed + failed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

impl QueueStats {
    /// Aggregate stats over a point-in-time job snapshot.
    pub fn aggregate<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> Self {
        let mut stats = Self::default();
        for job in jobs {
            stats.total += 1;
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::FetchingInfo | JobStatus::Downloading | JobStatus::Converting => {
                    stats.active += 1
                }
                JobStatus::Completed | JobStatus::Skipped => stats.completed += 1,
                JobStatus::Failed | JobStatus::Cancelled => stats.failed += 1,
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_with_status(status: JobStatus) -> Job {
        let mut job = Job::new("https://example.com/v", "192k");
        job.status = status;
        job
    }

    #[test]
    fn buckets_partition_the_snapshot() {
        let jobs = vec![
            job_with_status(JobStatus::Pending),
            job_with_status(JobStatus::FetchingInfo),
            job_with_status(JobStatus::Downloading),
            job_with_status(JobStatus::Converting),
            job_with_status(JobStatus::Completed),
            job_with_status(JobStatus::Skipped),
            job_with_status(JobStatus::Failed),
        ];

        let stats = QueueStats::aggregate(&jobs);
        assert_eq!(stats.total, 7);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.active, 3);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(
            stats.total,
            stats.pending + stats.active + stats.completed + stats.failed
        );
    }

    #[test]
    fn empty_snapshot_is_all_zero() {
        let jobs: Vec<Job> = Vec::new();
        let stats = QueueStats::aggregate(&jobs);
        assert_eq!(stats, QueueStats::default());
    }
}
