use anyhow::Result;
use std::io::Write;

use crate::engine::Segment;
use crate::segment_encoder::SegmentEncoder;

/// A `SegmentEncoder` that writes one plain-text line per segment.
///
/// Only the segment text is written, in segment order, newline-terminated,
/// UTF-8. Timing information is the SRT encoder's business.
pub struct TextEncoder<W: Write> {
    w: W,
    closed: bool,
}

impl<W: Write> TextEncoder<W> {
    /// Create a new plain-text encoder that writes to the provided writer.
    pub fn new(w: W) -> Self {
        Self { w, closed: false }
    }
}

impl<W: Write> SegmentEncoder for TextEncoder<W> {
    fn write_segment(&mut self, seg: &Segment) -> Result<()> {
        if self.closed {
            anyhow::bail!("cannot write segment: encoder is already closed");
        }

        writeln!(&mut self.w, "{}", seg.text)?;
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
