//! Queue error types.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    /// The notification side of the progress channel has shut down.
    #[error("Event channel closed")]
    ChannelClosed,
}
