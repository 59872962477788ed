//! Artifact path computation.

use std::path::{Path, PathBuf};

/// Characters stripped from titles before they become file names.
const INVALID_FILENAME_CHARS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Replace characters that are invalid in file names with underscores.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if INVALID_FILENAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Deterministic MP3 artifact path for a resolved title.
///
/// Re-submitting a URL whose title already produced an artifact lands on the
/// same path, which is what makes re-submission idempotent.
pub fn artifact_path(download_dir: impl AsRef<Path>, title: &str) -> PathBuf {
    download_dir
        .as_ref()
        .join(format!("{}.mp3", sanitize_filename(title)))
}

/// Scratch path the raw stream is fetched into before transcoding.
pub fn temp_path(temp_dir: impl AsRef<Path>, title: &str) -> PathBuf {
    temp_dir
        .as_ref()
        .join(format!("{}.part", sanitize_filename(title)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_invalid_chars() {
        assert_eq!(
            sanitize_filename(r#"a\b/c*d?e:f"g<h>i|j"#),
            "a_b_c_d_e_f_g_h_i_j"
        );
        assert_eq!(sanitize_filename("Plain Title - ok!"), "Plain Title - ok!");
    }

    #[test]
    fn artifact_path_is_deterministic() {
        let a = artifact_path("/downloads", "Song: Live?");
        let b = artifact_path("/downloads", "Song: Live?");
        assert_eq!(a, b);
        assert_eq!(a, PathBuf::from("/downloads/Song_ Live_.mp3"));
    }

    #[test]
    fn temp_path_uses_part_extension() {
        assert_eq!(
            temp_path("/tmp/ytmp3", "Song"),
            PathBuf::from("/tmp/ytmp3/Song.part")
        );
    }
}
