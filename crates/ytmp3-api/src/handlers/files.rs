//! Artifact file handlers.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::Response;
use axum::Json;
use serde_json::{json, Value};
use tokio_util::io::ReaderStream;

use ytmp3_models::FileEntry;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Reject names that could escape the download directory.
fn validate_filename(filename: &str) -> ApiResult<()> {
    if filename.is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
    {
        return Err(ApiError::bad_request("Invalid filename"));
    }
    Ok(())
}

/// List MP3 artifacts on disk.
pub async fn list_files(State(state): State<AppState>) -> ApiResult<Json<Vec<FileEntry>>> {
    let mut files = Vec::new();

    let mut entries = match tokio::fs::read_dir(&state.config.download_dir).await {
        Ok(entries) => entries,
        // No downloads yet means no directory yet.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Json(files)),
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "mp3") {
            let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
            files.push(FileEntry {
                filename: entry.file_name().to_string_lossy().to_string(),
                size,
            });
        }
    }

    Ok(Json(files))
}

/// Stream one MP3 artifact as an attachment.
pub async fn download_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    validate_filename(&filename)?;

    let path = state.config.download_dir.join(&filename);
    let file = match tokio::fs::File::open(&path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("File not found"))
        }
        Err(e) => return Err(e.into()),
    };
    let size = file.metadata().await?.len();

    let body = Body::from_stream(ReaderStream::new(file));
    Response::builder()
        .header(header::CONTENT_TYPE, "audio/mpeg")
        .header(header::CONTENT_LENGTH, size)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(body)
        .map_err(|e| ApiError::internal(e.to_string()))
}

/// Delete one MP3 artifact.
pub async fn delete_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Json<Value>> {
    validate_filename(&filename)?;

    let path = state.config.download_dir.join(&filename);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => Ok(Json(json!({"message": "File removed"}))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ApiError::not_found("File not found"))
        }
        Err(e) => Err(e.into()),
    }
}

/// Delete every MP3 artifact.
pub async fn delete_all_files(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let mut deleted = 0u32;

    if let Ok(mut entries) = tokio::fs::read_dir(&state.config.download_dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "mp3")
                && tokio::fs::remove_file(&path).await.is_ok()
            {
                deleted += 1;
            }
        }
    }

    Ok(Json(json!({"message": format!("{deleted} files removed")})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_validation_blocks_traversal() {
        assert!(validate_filename("song.mp3").is_ok());
        assert!(validate_filename("../etc/passwd").is_err());
        assert!(validate_filename("a/b.mp3").is_err());
        assert!(validate_filename("a\\b.mp3").is_err());
        assert!(validate_filename("").is_err());
    }
}
