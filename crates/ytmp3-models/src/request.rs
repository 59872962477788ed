//! Request/response payloads for the HTTP API.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Submission payload: one or more URLs plus an optional target bitrate.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DownloadRequest {
    pub urls: Vec<String>,
    #[serde(default = "default_quality")]
    pub quality: String,
}

fn default_quality() -> String {
    "192k".to_string()
}

/// One artifact on disk, as listed by the files endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FileEntry {
    pub filename: String,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_defaults_when_omitted() {
        let req: DownloadRequest =
            serde_json::from_str(r#"{"urls": ["https://example.com/v"]}"#).unwrap();
        assert_eq!(req.quality, "192k");
        assert_eq!(req.urls.len(), 1);
    }
}
