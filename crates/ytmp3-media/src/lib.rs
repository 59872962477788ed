//! External media collaborators: stream fetching and MP3 transcoding.
//!
//! Both collaborators are CLI tools driven as child processes:
//! - [`MediaSource`] resolves metadata and fetches the raw audio stream
//!   (yt-dlp)
//! - [`Transcoder`] converts the fetched stream to MP3 (ffmpeg), with the
//!   duration probed up front (ffprobe) so progress maps to a percentage
//!
//! Each trait has a production implementation here and is narrow enough for
//! the worker's tests to substitute doubles.

pub mod cancel;
pub mod error;
pub mod paths;
pub mod probe;
pub mod source;
pub mod transcode;

pub use error::{MediaError, MediaResult};
pub use paths::{artifact_path, sanitize_filename, temp_path};
pub use probe::{probe_audio, AudioInfo};
pub use source::{FetchProgress, FetchProgressFn, MediaSource, TrackInfo, YtdlpSource};
pub use transcode::{ConvertProgressFn, FfmpegTranscoder, Mp3Command, Transcoder};
