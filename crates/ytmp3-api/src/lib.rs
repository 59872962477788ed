//! Axum HTTP/WS API for the download queue.

pub mod config;
pub mod error;
pub mod fanout;
pub mod handlers;
pub mod routes;
pub mod services;
pub mod state;
#[cfg(test)]
pub(crate) mod testing;
pub mod ws;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use fanout::NotificationFanout;
pub use routes::create_router;
pub use services::QueueService;
pub use state::AppState;
