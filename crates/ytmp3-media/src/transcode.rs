//! MP3 transcoding via the FFmpeg CLI.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cancel::cancelled;
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_audio;

/// Callback invoked with the conversion percentage (0-100).
pub type ConvertProgressFn = Box<dyn Fn(f64) + Send + Sync>;

/// Converts a fetched audio stream into an MP3 artifact.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Transcode `input` to MP3 at `bitrate`, writing `output`.
    ///
    /// A non-zero exit or a missing/empty output file is a
    /// [`MediaError::ConversionFailed`]; cancellation kills the encoder and
    /// returns [`MediaError::Cancelled`].
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        bitrate: &str,
        cancel: watch::Receiver<bool>,
        on_progress: ConvertProgressFn,
    ) -> MediaResult<()>;
}

/// Builder for the MP3 encode command line.
#[derive(Debug, Clone)]
pub struct Mp3Command {
    input: PathBuf,
    output: PathBuf,
    bitrate: String,
    log_level: String,
}

impl Mp3Command {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>, bitrate: impl Into<String>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            bitrate: bitrate.into(),
            log_level: "error".to_string(),
        }
    }

    /// Set the FFmpeg log level (default "error").
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    ///
    /// Progress goes to stderr (`-progress pipe:2`) so stdout stays quiet;
    /// with `-v error` the two interleave without ambiguity because progress
    /// lines are strictly `key=value`.
    pub fn build_args(&self) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-v".to_string(),
            self.log_level.clone(),
            "-progress".to_string(),
            "pipe:2".to_string(),
            "-nostats".to_string(),
            "-i".to_string(),
            self.input.to_string_lossy().to_string(),
            "-vn".to_string(),
            "-acodec".to_string(),
            "libmp3lame".to_string(),
            "-b:a".to_string(),
            self.bitrate.clone(),
            self.output.to_string_lossy().to_string(),
        ]
    }
}

/// Running tally parsed out of FFmpeg's `-progress` stream.
#[derive(Debug, Clone, Copy, Default)]
struct ConvertState {
    out_time_ms: i64,
    is_complete: bool,
}

/// Production [`Transcoder`] driving the FFmpeg CLI.
#[derive(Debug, Clone, Default)]
pub struct FfmpegTranscoder;

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        bitrate: &str,
        mut cancel: watch::Receiver<bool>,
        on_progress: ConvertProgressFn,
    ) -> MediaResult<()> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }

        // Duration drives the percentage mapping; 0 means progress stays at 0
        // until completion.
        let total_duration_ms = match probe_audio(input).await {
            Ok(info) => (info.duration * 1000.0) as i64,
            Err(e) => {
                warn!(input = %input.display(), "Duration probe failed: {}", e);
                0
            }
        };

        let cmd = Mp3Command::new(input, output, bitrate);
        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stderr = child.stderr.take().expect("stderr not captured");

        let progress_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut state = ConvertState::default();
            let mut tail = Vec::new();

            while let Ok(Some(line)) = lines.next_line().await {
                if parse_progress_line(&line, &mut state) {
                    on_progress(state.percent(total_duration_ms));
                } else if !line.contains('=') {
                    // Anything that is not a progress key/value is an error log.
                    tail.push(line);
                }
            }
            tail
        });

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancelled(&mut cancel) => {
                info!(output = %output.display(), "Conversion cancelled, killing FFmpeg");
                let _ = child.kill().await;
                let _ = progress_task.await;
                return Err(MediaError::Cancelled);
            }
        };

        let error_tail = progress_task.await.unwrap_or_default();

        if !status.success() {
            let message = error_tail
                .last()
                .cloned()
                .unwrap_or_else(|| "FFmpeg exited with non-zero status".to_string());
            return Err(MediaError::conversion_failed(message, status.code()));
        }

        let size = tokio::fs::metadata(output).await.map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(MediaError::conversion_failed(
                "Output file not created",
                status.code(),
            ));
        }

        info!(
            output = %output.display(),
            size_kb = size / 1024,
            "Conversion complete"
        );

        Ok(())
    }
}

impl ConvertState {
    /// Current percentage, capped just under 100 until FFmpeg reports `end`.
    fn percent(&self, total_duration_ms: i64) -> f64 {
        if self.is_complete {
            return 100.0;
        }
        if total_duration_ms <= 0 || self.out_time_ms <= 0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / total_duration_ms as f64) * 100.0).min(99.9)
    }
}

/// Parse one line of FFmpeg's `-progress` output into the running state.
///
/// Returns true when the line closes a progress block (`progress=...`),
/// which is the moment to report.
fn parse_progress_line(line: &str, state: &mut ConvertState) -> bool {
    let line = line.trim();

    if let Some((key, value)) = line.split_once('=') {
        match key {
            "out_time_us" => {
                if let Ok(us) = value.parse::<i64>() {
                    state.out_time_ms = us / 1000;
                }
            }
            "out_time_ms" => {
                // Despite the name this field is also microseconds.
                if let Ok(us) = value.parse::<i64>() {
                    state.out_time_ms = us / 1000;
                }
            }
            "progress" => {
                if value == "end" {
                    state.is_complete = true;
                }
                return true;
            }
            _ => {}
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_builder_produces_mp3_encode_args() {
        let cmd = Mp3Command::new("in.part", "out.mp3", "192k");
        let args = cmd.build_args();

        assert_eq!(args.first().map(String::as_str), Some("-y"));
        assert!(args.contains(&"-vn".to_string()));
        assert!(args.contains(&"libmp3lame".to_string()));
        assert!(args.contains(&"192k".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("out.mp3"));

        // -b:a immediately precedes the bitrate
        let pos = args.iter().position(|a| a == "-b:a").unwrap();
        assert_eq!(args[pos + 1], "192k");
    }

    #[test]
    fn progress_parsing_tracks_out_time_and_completion() {
        let mut state = ConvertState::default();

        assert!(!parse_progress_line("out_time_us=5000000", &mut state));
        assert_eq!(state.out_time_ms, 5000);

        assert!(parse_progress_line("progress=continue", &mut state));
        assert!(!state.is_complete);
        assert!((state.percent(10_000) - 50.0).abs() < 0.01);

        assert!(parse_progress_line("progress=end", &mut state));
        assert!(state.is_complete);
        assert_eq!(state.percent(10_000), 100.0);
    }

    #[test]
    fn percent_is_capped_until_end() {
        let state = ConvertState {
            out_time_ms: 20_000,
            is_complete: false,
        };
        assert!((state.percent(10_000) - 99.9).abs() < 0.01);
        assert_eq!(state.percent(0), 0.0);
    }
}
