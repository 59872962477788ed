//! In-process job queue state.
//!
//! This crate provides:
//! - [`JobStore`]: the single source of truth for job records, keyed storage
//!   plus an insertion-ordered index that fixes dispatch order
//! - [`ProgressChannel`]: a bounded event conduit from worker execution
//!   contexts to the notification layer

pub mod error;
pub mod events;
pub mod store;

pub use error::{QueueError, QueueResult};
pub use events::{EventSender, Phase, ProgressChannel, QueueEvent};
pub use store::JobStore;
