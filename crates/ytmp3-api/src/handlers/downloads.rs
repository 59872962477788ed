//! Download queue handlers.

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use ytmp3_models::{DownloadRequest, Job};

use crate::error::ApiResult;
use crate::state::AppState;

/// Add URLs to the download queue.
pub async fn add_downloads(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> ApiResult<Json<Vec<Job>>> {
    let jobs = state.queue.submit(request.urls, request.quality)?;
    Ok(Json(jobs))
}

/// List all downloads in submission order.
pub async fn list_downloads(State(state): State<AppState>) -> Json<Vec<Job>> {
    Json(state.queue.list())
}

/// Fetch one download.
pub async fn get_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Job>> {
    Ok(Json(state.queue.get(&id.as_str().into())?))
}

/// Cancel a download: signal it if in flight, then remove record and files.
pub async fn cancel_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.queue.cancel(&id.as_str().into()).await?;
    Ok(Json(json!({"message": "Download removed"})))
}

/// Retry a failed/cancelled download.
pub async fn retry_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Job>> {
    Ok(Json(state.queue.retry(&id.as_str().into())?))
}
