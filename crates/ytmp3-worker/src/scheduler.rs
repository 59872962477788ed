//! Dispatch loop and in-flight job tracking.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use ytmp3_models::{JobId, JobStatus};

use crate::executor::{ExecutionContext, JobExecutor};

/// A dispatched job's cancellation handle.
///
/// Handles live in the scheduler-owned arena below and nowhere else; an
/// entry exists exactly while the execution task runs, so the arena's size
/// is the number of occupied concurrency slots.
struct ActiveJob {
    cancel: watch::Sender<bool>,
}

/// Polls the store for pending jobs and runs them under a concurrency cap.
///
/// Dispatch is FIFO by submission order. The loop wakes every poll interval;
/// within one tick it launches as many pending jobs as free slots allow.
/// This is a polling design: dispatch latency is bounded by the interval,
/// not by submission.
pub struct WorkerScheduler {
    ctx: Arc<ExecutionContext>,
    active: Mutex<HashMap<JobId, ActiveJob>>,
    shutdown: watch::Sender<bool>,
}

impl WorkerScheduler {
    pub fn new(ctx: ExecutionContext) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            ctx: Arc::new(ctx),
            active: Mutex::new(HashMap::new()),
            shutdown,
        }
    }

    /// Run the dispatch loop until [`stop`](Self::stop), then drain.
    pub async fn run(self: Arc<Self>) {
        info!(
            cap = self.ctx.config.max_concurrent_jobs,
            poll_ms = self.ctx.config.poll_interval.as_millis() as u64,
            "Starting worker scheduler"
        );

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut ticker = tokio::time::interval(self.ctx.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping scheduler");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.dispatch_ready();
                }
            }
        }

        info!("Waiting for in-flight jobs to complete...");
        let _ = tokio::time::timeout(self.ctx.config.shutdown_timeout, self.wait_idle()).await;
        info!("Worker scheduler stopped");
    }

    /// Launch pending jobs, oldest first, up to the concurrency cap.
    fn dispatch_ready(self: &Arc<Self>) {
        let cap = self.ctx.config.max_concurrent_jobs;
        if self.active_count() >= cap {
            return;
        }

        for job in self.ctx.store.list() {
            if job.status != JobStatus::Pending {
                continue;
            }

            let cancel_rx = {
                let mut active = self.active.lock().expect("active arena poisoned");
                if active.len() >= cap {
                    break;
                }
                // A pending-looking snapshot entry may already be running if
                // its executor hasn't written the dispatch state yet.
                if active.contains_key(&job.id) {
                    continue;
                }
                let (cancel_tx, cancel_rx) = watch::channel(false);
                active.insert(job.id.clone(), ActiveJob { cancel: cancel_tx });
                cancel_rx
            };

            debug!(job_id = %job.id, "Dispatching job");
            let this = Arc::clone(self);
            let job_id = job.id.clone();
            tokio::spawn(async move {
                JobExecutor::new(Arc::clone(&this.ctx), cancel_rx)
                    .run(job)
                    .await;
                this.active
                    .lock()
                    .expect("active arena poisoned")
                    .remove(&job_id);
            });
        }
    }

    /// Signal cancellation for one in-flight job.
    ///
    /// Returns whether an in-flight execution was found. The slot is
    /// relinquished when the execution actually ends, which is prompt but
    /// not synchronous: the underlying child process has to die first.
    pub fn cancel(&self, id: &JobId) -> bool {
        let active = self.active.lock().expect("active arena poisoned");
        match active.get(id) {
            Some(entry) => {
                info!(job_id = %id, "Cancelling in-flight job");
                let _ = entry.cancel.send(true);
                true
            }
            None => false,
        }
    }

    /// Signal cancellation for every in-flight job; returns how many.
    pub fn cancel_all(&self) -> usize {
        let active = self.active.lock().expect("active arena poisoned");
        for entry in active.values() {
            let _ = entry.cancel.send(true);
        }
        let count = active.len();
        if count > 0 {
            info!(count, "Cancelled all in-flight jobs");
        }
        count
    }

    /// Number of occupied concurrency slots.
    pub fn active_count(&self) -> usize {
        self.active.lock().expect("active arena poisoned").len()
    }

    /// Whether a job currently holds a slot.
    pub fn is_active(&self, id: &JobId) -> bool {
        self.active
            .lock()
            .expect("active arena poisoned")
            .contains_key(id)
    }

    /// End the dispatch loop; in-flight jobs keep running into the drain.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    async fn wait_idle(&self) {
        loop {
            if self.active_count() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
