//! Transcript serialization.
//!
//! Takes a finished (or partially finished) segment sequence and persists it
//! as a plain-text file and/or an SRT subtitle file. Writing is idempotent
//! given identical segments and base name; distinct jobs use a
//! timestamp-derived base name so repeated runs never collide.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::info;

use crate::engine::Segment;
use crate::error::Error;
use crate::segment_encoder::SegmentEncoder;
use crate::srt_encoder::SrtEncoder;
use crate::text_encoder::TextEncoder;

/// Which output files to produce.
#[derive(Debug, Clone, Copy)]
pub struct WriteOpts {
    pub write_text: bool,
    pub write_subtitles: bool,
}

impl Default for WriteOpts {
    fn default() -> Self {
        Self {
            write_text: true,
            write_subtitles: true,
        }
    }
}

/// Base name for a new transcript: `transcript_<YYYYMMDD_HHMMSS>`.
pub fn default_base_name() -> String {
    format!("transcript_{}", Local::now().format("%Y%m%d_%H%M%S"))
}

/// Serialize `segments` under `output_dir`, creating the directory if absent.
///
/// Writes `<base_name>.txt` and/or `<base_name>.srt` per `opts` and returns
/// the paths actually written (possibly empty when both flags are off).
/// Filesystem faults surface as [`Error::Write`].
pub fn write_transcript(
    segments: &[Segment],
    output_dir: &Path,
    base_name: &str,
    opts: WriteOpts,
) -> crate::Result<Vec<PathBuf>> {
    write_transcript_inner(segments, output_dir, base_name, opts).map_err(Error::Write)
}

fn write_transcript_inner(
    segments: &[Segment],
    output_dir: &Path,
    base_name: &str,
    opts: WriteOpts,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output directory '{}'", output_dir.display()))?;

    let mut written = Vec::new();

    if opts.write_text {
        let path = output_dir.join(format!("{base_name}.txt"));
        write_with_encoder(segments, &path, TextEncoder::new)?;
        written.push(path);
    }

    if opts.write_subtitles {
        let path = output_dir.join(format!("{base_name}.srt"));
        write_with_encoder(segments, &path, SrtEncoder::new)?;
        written.push(path);
    }

    if !written.is_empty() {
        info!(
            files = written.len(),
            segments = segments.len(),
            dir = %output_dir.display(),
            "transcript written"
        );
    }

    Ok(written)
}

fn write_with_encoder<E, F>(segments: &[Segment], path: &Path, make: F) -> Result<()>
where
    E: SegmentEncoder,
    F: FnOnce(BufWriter<File>) -> E,
{
    let file =
        File::create(path).with_context(|| format!("failed to create '{}'", path.display()))?;
    let mut encoder = make(BufWriter::new(file));

    for segment in segments {
        encoder
            .write_segment(segment)
            .with_context(|| format!("failed while writing '{}'", path.display()))?;
    }

    encoder.close()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments() -> Vec<Segment> {
        vec![
            Segment {
                start_seconds: 0.0,
                end_seconds: 2.5,
                text: "hello".to_owned(),
            },
            Segment {
                start_seconds: 2.5,
                end_seconds: 5.0,
                text: "world".to_owned(),
            },
            Segment {
                start_seconds: 5.0,
                end_seconds: 7.0,
                text: "test".to_owned(),
            },
        ]
    }

    #[test]
    fn writes_both_formats_and_creates_the_directory() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let out_dir = tmp.path().join("nested").join("transcripts");

        let written = write_transcript(&segments(), &out_dir, "t", WriteOpts::default())?;
        assert_eq!(written.len(), 2);

        let txt = fs::read_to_string(out_dir.join("t.txt"))?;
        assert_eq!(txt, "hello\nworld\ntest\n");

        let srt = fs::read_to_string(out_dir.join("t.srt"))?;
        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:02,500\nhello\n\n"));
        assert!(srt.contains("3\n00:00:05,000 --> 00:00:07,000\ntest\n\n"));
        Ok(())
    }

    #[test]
    fn text_round_trip_preserves_line_count_and_order() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let written = write_transcript(
            &segments(),
            tmp.path(),
            "t",
            WriteOpts {
                write_text: true,
                write_subtitles: false,
            },
        )?;
        assert_eq!(written.len(), 1);

        let lines: Vec<String> = fs::read_to_string(&written[0])?
            .lines()
            .map(str::to_owned)
            .collect();
        let expected: Vec<String> = segments().iter().map(|s| s.text.clone()).collect();
        assert_eq!(lines, expected);
        Ok(())
    }

    #[test]
    fn both_flags_off_writes_nothing() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let written = write_transcript(
            &segments(),
            tmp.path(),
            "t",
            WriteOpts {
                write_text: false,
                write_subtitles: false,
            },
        )?;
        assert!(written.is_empty());
        Ok(())
    }

    #[test]
    fn rewriting_the_same_base_name_is_idempotent() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        write_transcript(&segments(), tmp.path(), "t", WriteOpts::default())?;
        let first = fs::read_to_string(tmp.path().join("t.srt"))?;

        write_transcript(&segments(), tmp.path(), "t", WriteOpts::default())?;
        let second = fs::read_to_string(tmp.path().join("t.srt"))?;

        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn default_base_name_is_timestamp_derived() {
        let name = default_base_name();
        assert!(name.starts_with("transcript_"));
        // transcript_YYYYMMDD_HHMMSS
        assert_eq!(name.len(), "transcript_".len() + 15);
    }
}
