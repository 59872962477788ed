//! Progress events from execution contexts to the notification layer.
//!
//! Workers push events through a bounded channel instead of calling into the
//! notification layer directly; the fanout side drains the receiver at its
//! own pace. Per-job emission order is preserved by the channel; nothing is
//! guaranteed across jobs.

use tokio::sync::mpsc;
use tracing::debug;

use ytmp3_models::JobId;

use crate::error::{QueueError, QueueResult};

/// Default bound for the event buffer.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// One of the three in-flight lifecycle stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    FetchingInfo,
    Downloading,
    Converting,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::FetchingInfo => "fetching",
            Phase::Downloading => "downloading",
            Phase::Converting => "converting",
        }
    }
}

/// Event pushed through the progress channel.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    /// Throttled progress sample within a phase.
    Progress {
        job_id: JobId,
        phase: Phase,
        percent: f64,
    },
    /// The job record changed state; consumers re-read the store.
    StateChanged { job_id: JobId },
}

impl QueueEvent {
    pub fn job_id(&self) -> &JobId {
        match self {
            QueueEvent::Progress { job_id, .. } => job_id,
            QueueEvent::StateChanged { job_id } => job_id,
        }
    }
}

/// Factory for the bounded event conduit.
pub struct ProgressChannel;

impl ProgressChannel {
    /// Create a bounded channel pair with the given buffer capacity.
    pub fn bounded(capacity: usize) -> (EventSender, mpsc::Receiver<QueueEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (EventSender { tx }, rx)
    }
}

/// Cheap, cloneable emitting half of the progress channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<QueueEvent>,
}

impl EventSender {
    /// Emit a progress sample without blocking the emitting context.
    ///
    /// A full buffer drops the sample: intermediate progress is disposable,
    /// and the next flush re-establishes the current value.
    pub fn progress(&self, job_id: &JobId, phase: Phase, percent: f64) {
        let event = QueueEvent::Progress {
            job_id: job_id.clone(),
            phase,
            percent,
        };
        if let Err(e) = self.tx.try_send(event) {
            debug!(job_id = %job_id, "progress event dropped: {}", e);
        }
    }

    /// Emit a state transition, waiting for buffer space if needed.
    ///
    /// State transitions are not disposable; this only fails once the
    /// consumer side has shut down.
    pub async fn state_changed(&self, job_id: &JobId) -> QueueResult<()> {
        self.tx
            .send(QueueEvent::StateChanged {
                job_id: job_id.clone(),
            })
            .await
            .map_err(|_| QueueError::ChannelClosed)
    }

    /// Non-async variant of [`state_changed`](Self::state_changed) for
    /// synchronous call sites; falls back to dropping when the buffer is
    /// full rather than blocking.
    pub fn state_changed_now(&self, job_id: &JobId) {
        let event = QueueEvent::StateChanged {
            job_id: job_id.clone(),
        };
        if let Err(e) = self.tx.try_send(event) {
            debug!(job_id = %job_id, "state event dropped: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_arrive_in_emission_order() {
        let (tx, mut rx) = ProgressChannel::bounded(8);
        let id = JobId::new();

        tx.progress(&id, Phase::Downloading, 10.0);
        tx.progress(&id, Phase::Downloading, 20.0);
        tx.state_changed(&id).await.unwrap();

        match rx.recv().await.unwrap() {
            QueueEvent::Progress { percent, .. } => assert_eq!(percent, 10.0),
            other => panic!("unexpected event: {other:?}"),
        }
        match rx.recv().await.unwrap() {
            QueueEvent::Progress { percent, .. } => assert_eq!(percent, 20.0),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(
            rx.recv().await.unwrap(),
            QueueEvent::StateChanged { .. }
        ));
    }

    #[tokio::test]
    async fn full_buffer_drops_progress_but_keeps_channel_usable() {
        let (tx, mut rx) = ProgressChannel::bounded(1);
        let id = JobId::new();

        tx.progress(&id, Phase::Downloading, 1.0);
        // Buffer is full; this sample is dropped silently.
        tx.progress(&id, Phase::Downloading, 2.0);

        match rx.recv().await.unwrap() {
            QueueEvent::Progress { percent, .. } => assert_eq!(percent, 1.0),
            other => panic!("unexpected event: {other:?}"),
        }

        tx.progress(&id, Phase::Downloading, 3.0);
        match rx.recv().await.unwrap() {
            QueueEvent::Progress { percent, .. } => assert_eq!(percent, 3.0),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn state_changed_errors_after_receiver_drop() {
        let (tx, rx) = ProgressChannel::bounded(1);
        drop(rx);
        let err = tx.state_changed(&JobId::new()).await.unwrap_err();
        assert!(matches!(err, QueueError::ChannelClosed));
    }
}
