use anyhow::Result;
use std::io::Write;

use crate::engine::Segment;
use crate::segment_encoder::SegmentEncoder;

/// A `SegmentEncoder` that writes segments in SubRip (SRT) format.
///
/// Block layout, reproduced exactly for compatibility with standard subtitle
/// consumers:
///
/// ```text
/// 1
/// 00:00:00,000 --> 00:00:02,500
/// hello
///
/// ```
///
/// Blocks are 1-indexed; the timestamp line uses `HH:MM:SS,mmm` with the
/// fractional part truncated (not rounded) to milliseconds.
pub struct SrtEncoder<W: Write> {
    w: W,

    /// 1-based index of the next block.
    next_index: u64,

    /// Whether the encoder has been closed.
    closed: bool,
}

impl<W: Write> SrtEncoder<W> {
    /// Create a new SRT encoder that writes to the provided writer.
    pub fn new(w: W) -> Self {
        Self {
            w,
            next_index: 1,
            closed: false,
        }
    }
}

impl<W: Write> SegmentEncoder for SrtEncoder<W> {
    /// Write a single subtitle block.
    fn write_segment(&mut self, seg: &Segment) -> Result<()> {
        if self.closed {
            anyhow::bail!("cannot write segment: encoder is already closed");
        }

        let start = format_timestamp_srt(seg.start_seconds);
        let end = format_timestamp_srt(seg.end_seconds);

        writeln!(&mut self.w, "{}", self.next_index)?;
        writeln!(&mut self.w, "{start} --> {end}")?;
        writeln!(&mut self.w, "{}", seg.text)?;

        // Blank line separates blocks.
        writeln!(&mut self.w)?;

        self.next_index += 1;
        Ok(())
    }

    /// Flush the underlying writer. This is idempotent.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        self.w.flush()?;
        self.closed = true;

        Ok(())
    }
}

/// Format seconds into an SRT timestamp (`HH:MM:SS,mmm`).
///
/// Policy: floor to whole seconds for H/M/S; the fractional remainder is
/// truncated to milliseconds. Truncation (not rounding) keeps a block's end
/// from drifting past the next block's start.
fn format_timestamp_srt(seconds: f32) -> String {
    let seconds = f64::from(seconds.max(0.0));

    let whole = seconds.floor() as u64;
    let h = whole / 3600;
    let m = (whole % 3600) / 60;
    let s = whole % 60;
    let ms = ((seconds - whole as f64) * 1000.0) as u64;

    format!("{h:02}:{m:02}:{s:02},{ms:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f32, end: f32, text: &str) -> Segment {
        Segment {
            start_seconds: start,
            end_seconds: end,
            text: text.to_string(),
        }
    }

    #[test]
    fn srt_formats_indexed_blocks() -> anyhow::Result<()> {
        let mut out = Vec::new();
        let mut enc = SrtEncoder::new(&mut out);

        enc.write_segment(&seg(0.0, 2.5, "hello"))?;
        enc.write_segment(&seg(2.5, 5.0, "world"))?;
        enc.close()?;

        let s = std::str::from_utf8(&out)?;
        assert_eq!(
            s,
            "1\n00:00:00,000 --> 00:00:02,500\nhello\n\n\
             2\n00:00:02,500 --> 00:00:05,000\nworld\n\n"
        );
        Ok(())
    }

    #[test]
    fn srt_timestamp_truncates_milliseconds() {
        assert_eq!(format_timestamp_srt(65.4321), "00:01:05,432");
        assert_eq!(format_timestamp_srt(0.0), "00:00:00,000");
        assert_eq!(format_timestamp_srt(3600.0), "01:00:00,000");
        // Truncation, not rounding.
        assert_eq!(format_timestamp_srt(1.9996), "00:00:01,999");
    }

    #[test]
    fn srt_close_without_segments_emits_nothing() -> anyhow::Result<()> {
        let mut out = Vec::new();
        let mut enc = SrtEncoder::new(&mut out);
        enc.close()?;
        assert_eq!(std::str::from_utf8(&out)?, "");
        Ok(())
    }

    #[test]
    fn srt_write_after_close_errors() -> anyhow::Result<()> {
        let mut out = Vec::new();
        let mut enc = SrtEncoder::new(&mut out);
        enc.close()?;
        let err = enc.write_segment(&seg(0.0, 1.0, "nope")).unwrap_err();
        assert!(err.to_string().contains("already closed"));
        Ok(())
    }
}
