//! Audio stream source backed by yt-dlp.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cancel::cancelled;
use crate::error::{MediaError, MediaResult};

/// Resolved metadata for a source URL.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    /// Display title
    pub title: String,
    /// Duration in seconds (0 when unknown)
    pub duration: f64,
}

/// One progress sample during the transfer phase.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FetchProgress {
    /// 0-100, derived from byte counters (0 when the total is unknown)
    pub percent: f64,
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    /// Instantaneous rate in bytes/second (0 when unknown)
    pub speed: f64,
}

/// Callback invoked at the transfer's native progress frequency.
pub type FetchProgressFn = Box<dyn Fn(FetchProgress) + Send + Sync>;

/// Resolves metadata and fetches raw audio streams.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Resolve title and duration for a URL.
    ///
    /// Fails with [`MediaError::NoAudioStream`] when the URL has no
    /// audio-capable stream, [`MediaError::ResolveFailed`] on transport
    /// errors.
    async fn resolve(&self, url: &str) -> MediaResult<TrackInfo>;

    /// Fetch the best audio stream into `dest`, reporting progress.
    ///
    /// Cancellation kills the underlying transfer and returns
    /// [`MediaError::Cancelled`].
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        cancel: watch::Receiver<bool>,
        on_progress: FetchProgressFn,
    ) -> MediaResult<()>;
}

/// Machine-readable progress line prefix, see [`PROGRESS_TEMPLATE`].
const PROGRESS_PREFIX: &str = "dl:";

/// Progress template handed to yt-dlp: emits one parseable line per
/// progress tick on stdout.
const PROGRESS_TEMPLATE: &str =
    "download:dl:%(progress.downloaded_bytes)s:%(progress.total_bytes)s:%(progress.speed)s";

/// yt-dlp metadata dump, reduced to the fields we keep.
#[derive(Debug, Deserialize)]
struct YtdlpMetadata {
    title: Option<String>,
    duration: Option<f64>,
}

/// Production [`MediaSource`] driving the yt-dlp CLI.
#[derive(Debug, Clone, Default)]
pub struct YtdlpSource;

impl YtdlpSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaSource for YtdlpSource {
    async fn resolve(&self, url: &str) -> MediaResult<TrackInfo> {
        which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)?;

        debug!(url = %url, "Resolving metadata with yt-dlp");

        let output = Command::new("yt-dlp")
            .args(["--dump-json", "--no-download", "--no-playlist"])
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("yt-dlp stderr: {}", stderr);
            return Err(classify_resolve_error(url, &stderr));
        }

        let meta: YtdlpMetadata = serde_json::from_slice(&output.stdout)?;
        let title = match meta.title {
            Some(t) if !t.is_empty() => t,
            _ => return Err(MediaError::no_audio_stream(url)),
        };

        Ok(TrackInfo {
            title,
            duration: meta.duration.unwrap_or(0.0),
        })
    }

    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        mut cancel: watch::Receiver<bool>,
        on_progress: FetchProgressFn,
    ) -> MediaResult<()> {
        which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)?;

        info!(url = %url, dest = %dest.display(), "Fetching audio stream");

        let mut child = Command::new("yt-dlp")
            .args([
                "-f",
                "bestaudio/best",
                "--no-playlist",
                "--newline",
                "--progress-template",
                PROGRESS_TEMPLATE,
                "-o",
            ])
            .arg(dest)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child.stdout.take().expect("stdout not captured");
        let stderr = child.stderr.take().expect("stderr not captured");

        // Progress lines arrive on stdout at the transfer's native frequency.
        let progress_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(progress) = parse_fetch_line(&line) {
                    on_progress(progress);
                }
            }
        });

        // Collect stderr separately so a failure has a message to report.
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut collected = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                collected.push(line);
            }
            collected
        });

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancelled(&mut cancel) => {
                info!(url = %url, "Fetch cancelled, killing yt-dlp");
                let _ = child.kill().await;
                let _ = progress_task.await;
                let _ = stderr_task.await;
                return Err(MediaError::Cancelled);
            }
        };

        let _ = progress_task.await;
        let stderr_lines = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let message = stderr_lines
                .last()
                .cloned()
                .unwrap_or_else(|| "yt-dlp exited with non-zero status".to_string());
            warn!(url = %url, "Fetch failed: {}", message);
            return Err(MediaError::fetch_failed(message));
        }

        // yt-dlp can exit 0 without producing output on some extractor paths.
        let size = tokio::fs::metadata(dest).await.map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(MediaError::fetch_failed("Output file not created"));
        }

        info!(
            dest = %dest.display(),
            size_kb = size / 1024,
            "Fetched audio stream"
        );

        Ok(())
    }
}

/// Classify a failed metadata lookup from yt-dlp's stderr.
fn classify_resolve_error(url: &str, stderr: &str) -> MediaError {
    let no_stream = stderr.contains("Unsupported URL")
        || stderr.contains("is not a valid URL")
        || stderr.contains("No video formats found")
        || stderr.contains("Video unavailable")
        || stderr.contains("Requested format is not available");

    if no_stream {
        MediaError::no_audio_stream(url)
    } else {
        let message = stderr
            .lines()
            .last()
            .unwrap_or("Unknown error")
            .to_string();
        MediaError::resolve_failed(message)
    }
}

/// Parse one `--progress-template` line.
///
/// Expected shape: `dl:<downloaded>:<total>:<speed>` where any field may be
/// `NA`/`None` while yt-dlp has no estimate yet.
fn parse_fetch_line(line: &str) -> Option<FetchProgress> {
    let rest = line.trim().strip_prefix(PROGRESS_PREFIX)?;
    let mut fields = rest.splitn(3, ':');

    let downloaded = parse_counter(fields.next()?);
    let total = parse_counter(fields.next()?);
    let speed = fields.next().map(parse_rate).unwrap_or(0.0);

    let percent = if total > 0 {
        (downloaded as f64 / total as f64) * 100.0
    } else {
        0.0
    };

    Some(FetchProgress {
        percent,
        downloaded_bytes: downloaded,
        total_bytes: total,
        speed,
    })
}

fn parse_counter(field: &str) -> u64 {
    field.trim().parse::<f64>().map(|v| v as u64).unwrap_or(0)
}

fn parse_rate(field: &str) -> f64 {
    field.trim().parse::<f64>().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_progress_lines() {
        let p = parse_fetch_line("dl:1024:4096:512.5").unwrap();
        assert_eq!(p.downloaded_bytes, 1024);
        assert_eq!(p.total_bytes, 4096);
        assert!((p.percent - 25.0).abs() < 0.01);
        assert!((p.speed - 512.5).abs() < 0.01);
    }

    #[test]
    fn tolerates_unknown_fields() {
        let p = parse_fetch_line("dl:2048:NA:None").unwrap();
        assert_eq!(p.downloaded_bytes, 2048);
        assert_eq!(p.total_bytes, 0);
        assert_eq!(p.percent, 0.0);
        assert_eq!(p.speed, 0.0);
    }

    #[test]
    fn ignores_non_progress_lines() {
        assert!(parse_fetch_line("[download] Destination: x.part").is_none());
        assert!(parse_fetch_line("").is_none());
    }

    #[test]
    fn classifies_missing_streams_vs_transport_errors() {
        let err = classify_resolve_error("u", "ERROR: Unsupported URL: u");
        assert!(matches!(err, MediaError::NoAudioStream { .. }));

        let err = classify_resolve_error("u", "ERROR: unable to download webpage: timed out");
        assert!(matches!(err, MediaError::ResolveFailed { .. }));
    }
}
