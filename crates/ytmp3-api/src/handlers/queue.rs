//! Queue-wide handlers.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use ytmp3_models::QueueStats;

use crate::state::AppState;

/// Aggregate queue statistics, computed on demand.
pub async fn get_stats(State(state): State<AppState>) -> Json<QueueStats> {
    Json(state.fanout.current_stats())
}

/// Remove completed/skipped downloads (and their files).
pub async fn clear_completed(State(state): State<AppState>) -> Json<Value> {
    state.queue.clear_completed().await;
    Json(json!({"message": "Completed downloads removed"}))
}

/// Cancel every pending and in-flight download.
pub async fn cancel_all(State(state): State<AppState>) -> Json<Value> {
    state.queue.cancel_all().await;
    Json(json!({"message": "All downloads cancelled"}))
}

/// Empty the queue and wipe artifacts from disk.
pub async fn clear_all(State(state): State<AppState>) -> Json<Value> {
    state.queue.clear_all().await;
    Json(json!({"message": "Queue cleared"}))
}
