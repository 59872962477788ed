//! Observer fan-out for queue notifications.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

use ytmp3_models::{QueueStats, WsMessage};
use ytmp3_queue::{JobStore, QueueEvent};

/// Per-observer send buffer. A slower consumer loses frames, not the
/// connection; stats frames are periodic so it self-heals.
const OBSERVER_BUFFER_SIZE: usize = 32;

/// Identifies one connected observer.
pub type ObserverId = u64;

/// Relays queue events to every connected observer.
///
/// Events name a job id; the fanout re-reads the store so the frame carries
/// the freshest record (a removed job yields only a stats frame). Stats are
/// always recomputed from a fresh `list()` scan, never cached.
pub struct NotificationFanout {
    store: Arc<JobStore>,
    observers: RwLock<HashMap<ObserverId, mpsc::Sender<String>>>,
    next_id: AtomicU64,
}

impl NotificationFanout {
    pub fn new(store: Arc<JobStore>) -> Self {
        Self {
            store,
            observers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register an observer; the receiver yields serialized frames.
    pub async fn subscribe(&self) -> (ObserverId, mpsc::Receiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(OBSERVER_BUFFER_SIZE);
        self.observers.write().await.insert(id, tx);
        info!(observer_id = id, "Observer subscribed");
        (id, rx)
    }

    /// Remove an observer.
    pub async fn unsubscribe(&self, id: ObserverId) {
        if self.observers.write().await.remove(&id).is_some() {
            info!(observer_id = id, "Observer unsubscribed");
        }
    }

    /// Number of currently connected observers.
    pub async fn observer_count(&self) -> usize {
        self.observers.read().await.len()
    }

    /// Serialize once and deliver to every observer.
    ///
    /// Observers whose channel has closed are evicted; a full buffer only
    /// costs that observer this frame.
    pub async fn publish(&self, message: &WsMessage) {
        let frame = match serde_json::to_string(message) {
            Ok(f) => f,
            Err(e) => {
                debug!("Failed to serialize notification: {}", e);
                return;
            }
        };

        let mut dead = Vec::new();
        {
            let observers = self.observers.read().await;
            for (id, tx) in observers.iter() {
                match tx.try_send(frame.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        debug!(observer_id = *id, "Observer buffer full, frame dropped");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => dead.push(*id),
                }
            }
        }

        if !dead.is_empty() {
            let mut observers = self.observers.write().await;
            for id in dead {
                observers.remove(&id);
                debug!(observer_id = id, "Evicted disconnected observer");
            }
        }
    }

    /// Aggregate stats over the store's current snapshot.
    pub fn current_stats(&self) -> QueueStats {
        QueueStats::aggregate(&self.store.list())
    }

    /// Drain the progress channel until the sending side closes.
    ///
    /// Each event produces a `job:update` (when the record still exists) and
    /// a fresh `queue:stats` frame.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<QueueEvent>) {
        info!("Notification fanout started");
        while let Some(event) = events.recv().await {
            if let Some(job) = self.store.get(event.job_id()) {
                self.publish(&WsMessage::job_update(job)).await;
            }
            self.publish(&WsMessage::queue_stats(self.current_stats()))
                .await;
        }
        info!("Notification fanout stopped");
    }
}
