//! Audio source resolution.
//!
//! A job's audio comes from exactly one of two places:
//! - a local media file, used in place
//! - a remote video URL, pulled down through a [`MediaExtractor`] into a
//!   job-owned temporary directory
//!
//! Remote sources own their temporary directory outright: dropping the
//! [`AudioSource`] reclaims the directory (and the extracted file inside it)
//! on every exit path, including cancellation and failure.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, ensure};
use tempfile::TempDir;
use tracing::{debug, info};

use crate::error::Error;

/// Where a resolved audio file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote,
}

/// A resolved, on-disk audio input for one job.
#[derive(Debug)]
pub struct AudioSource {
    origin: Origin,
    path: PathBuf,

    // Present only for remote sources. Held so the extraction directory lives
    // exactly as long as the source and is removed when it drops.
    temp_dir: Option<TempDir>,
}

impl AudioSource {
    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file is job-owned scratch (remote extraction).
    pub fn is_temporary(&self) -> bool {
        self.temp_dir.is_some()
    }
}

/// Capability for pulling the audio track of a remote video onto disk.
///
/// Implementations produce exactly one encoded audio file inside `out_dir` and
/// return its path. `cookie_file`, when given, authenticates the extraction
/// (member-gated or login-only content).
pub trait MediaExtractor {
    fn extract_audio(
        &self,
        url: &str,
        out_dir: &Path,
        cookie_file: Option<&Path>,
    ) -> Result<PathBuf>;
}

/// Resolve the inputs for one job into an [`AudioSource`].
///
/// Exactly one of `local` / `url` must be provided. Supplying both is rejected
/// as ambiguous rather than silently preferring one; supplying neither is an
/// acquisition failure.
pub fn resolve_source(
    local: Option<&Path>,
    url: Option<&str>,
    cookie_file: Option<&Path>,
    extractor: &dyn MediaExtractor,
) -> crate::Result<AudioSource> {
    match (local, url) {
        (None, None) => Err(Error::acquisition(
            "no input given: provide a local file or a video URL",
        )),
        (Some(_), Some(_)) => Err(Error::acquisition(
            "ambiguous input: both a local file and a URL were given; provide exactly one",
        )),
        (Some(path), None) => {
            debug!(path = %path.display(), "using local audio source");
            Ok(AudioSource {
                origin: Origin::Local,
                path: path.to_owned(),
                temp_dir: None,
            })
        }
        (None, Some(url)) => resolve_remote(url, cookie_file, extractor).map_err(Error::Acquisition),
    }
}

fn resolve_remote(
    url: &str,
    cookie_file: Option<&Path>,
    extractor: &dyn MediaExtractor,
) -> Result<AudioSource> {
    let temp_dir = TempDir::new().context("failed to create extraction directory")?;

    // Only pass a cookie file through when it actually exists; a stale path
    // should not fail an otherwise public extraction.
    let cookie_file = cookie_file.filter(|p| p.is_file());

    info!(url, "extracting audio from remote source");
    let path = extractor
        .extract_audio(url, temp_dir.path(), cookie_file)
        .with_context(|| format!("audio extraction failed for '{url}'"))?;

    ensure!(
        path.is_file(),
        "extractor reported '{}' but the file does not exist",
        path.display()
    );

    Ok(AudioSource {
        origin: Origin::Remote,
        path,
        temp_dir: Some(temp_dir),
    })
}

/// [`MediaExtractor`] backed by the `yt-dlp` binary.
///
/// Downloads best-available audio and post-processes it into a single mp3 at a
/// fixed quality tier, matching what the transcription engine can decode.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    binary: PathBuf,
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("yt-dlp"),
        }
    }
}

impl YtDlpExtractor {
    /// Use a specific `yt-dlp` binary instead of resolving from `PATH`.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl MediaExtractor for YtDlpExtractor {
    fn extract_audio(
        &self,
        url: &str,
        out_dir: &Path,
        cookie_file: Option<&Path>,
    ) -> Result<PathBuf> {
        let out_template = out_dir.join("audio.%(ext)s");

        let mut cmd = Command::new(&self.binary);
        cmd.args(["--no-warnings", "--no-progress", "--quiet"])
            .args(["-f", "bestaudio/best"])
            .args(["-x", "--audio-format", "mp3", "--audio-quality", "192K"])
            .arg("-o")
            .arg(&out_template)
            .arg(url);

        if let Some(cookies) = cookie_file {
            cmd.arg("--cookies").arg(cookies);
        }

        let output = cmd
            .output()
            .with_context(|| format!("failed to run '{}'", self.binary.display()))?;

        ensure!(
            output.status.success(),
            "yt-dlp exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );

        // The post-processor rewrites the extension, so the final name is fixed.
        Ok(out_dir.join("audio.mp3"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    struct FakeExtractor {
        fail: bool,
        write_file: bool,
    }

    impl MediaExtractor for FakeExtractor {
        fn extract_audio(
            &self,
            _url: &str,
            out_dir: &Path,
            _cookie_file: Option<&Path>,
        ) -> Result<PathBuf> {
            ensure!(!self.fail, "simulated network failure");
            let path = out_dir.join("audio.mp3");
            if self.write_file {
                fs::write(&path, b"fake audio")?;
            }
            Ok(path)
        }
    }

    #[test]
    fn local_path_resolves_without_io() -> Result<()> {
        let extractor = FakeExtractor {
            fail: true, // must not be called
            write_file: false,
        };
        let source = resolve_source(
            Some(Path::new("/videos/talk.mp4")),
            None,
            None,
            &extractor,
        )?;
        assert_eq!(source.origin(), Origin::Local);
        assert!(!source.is_temporary());
        assert_eq!(source.path(), Path::new("/videos/talk.mp4"));
        Ok(())
    }

    #[test]
    fn missing_input_is_an_acquisition_error() {
        let extractor = FakeExtractor {
            fail: false,
            write_file: true,
        };
        let err = resolve_source(None, None, None, &extractor).unwrap_err();
        assert_eq!(err.stage(), "acquisition");
        assert!(err.to_string().contains("no input"));
    }

    #[test]
    fn both_inputs_are_rejected_as_ambiguous() {
        let extractor = FakeExtractor {
            fail: false,
            write_file: true,
        };
        let err = resolve_source(
            Some(Path::new("/videos/talk.mp4")),
            Some("https://example.com/v"),
            None,
            &extractor,
        )
        .unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
    }

    #[test]
    fn remote_source_owns_its_temp_dir() -> anyhow::Result<()> {
        let extractor = FakeExtractor {
            fail: false,
            write_file: true,
        };
        let source = resolve_source(None, Some("https://example.com/v"), None, &extractor)?;
        assert_eq!(source.origin(), Origin::Remote);
        assert!(source.is_temporary());

        let path = source.path().to_owned();
        assert!(path.is_file());

        drop(source);
        assert!(!path.exists(), "temp audio must be reclaimed on drop");
        Ok(())
    }

    #[test]
    fn extraction_failure_surfaces_as_acquisition_error() {
        let extractor = FakeExtractor {
            fail: true,
            write_file: false,
        };
        let err = resolve_source(None, Some("https://example.com/v"), None, &extractor).unwrap_err();
        assert_eq!(err.stage(), "acquisition");
        assert!(err.to_string().contains("simulated network failure"));
    }

    #[test]
    fn missing_output_file_surfaces_as_acquisition_error() {
        let extractor = FakeExtractor {
            fail: false,
            write_file: false,
        };
        let err = resolve_source(None, Some("https://example.com/v"), None, &extractor).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
