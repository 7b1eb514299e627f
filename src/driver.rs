//! Transcription driving: engine load plus cancellable segment streaming.
//!
//! The driver owns the pipeline's cancellation granularity: the shared
//! [`CancelToken`] is consulted once per emitted segment, before the segment
//! is accepted. Cancellation latency is therefore bounded by at most one
//! in-flight segment, never more.

use std::path::Path;

use tracing::debug;

use crate::engine::{EngineHandle, Segment, SpeechEngine, TranscribeOpts};
use crate::error::Error;
use crate::job::CancelToken;

/// How a segment stream ended, short of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The engine exhausted the audio.
    Completed,
    /// Cancellation was observed at a segment boundary. A normal stop, not a
    /// failure.
    Stopped,
}

/// Instantiate `engine` for `profile`.
pub fn load_engine<E: SpeechEngine>(
    engine: &E,
    profile: &crate::device::DeviceProfile,
) -> crate::Result<E::Handle> {
    engine.load(profile).map_err(Error::ModelLoad)
}

/// Stream segments for `audio` through `on_segment`, polling `cancel` at each
/// segment boundary.
///
/// Segments are forwarded in emission order; the driver never re-orders or
/// merges. Engine failures map to [`Error::Transcription`] and abort the
/// stream; segments already forwarded stay with the caller.
pub fn stream_segments<H: EngineHandle + ?Sized>(
    handle: &mut H,
    audio: &Path,
    opts: &TranscribeOpts,
    cancel: &CancelToken,
    mut on_segment: impl FnMut(&Segment) -> crate::Result<()>,
) -> crate::Result<StreamOutcome> {
    let mut stopped = false;
    let mut forward_err: Option<Error> = None;

    let run = handle.transcribe(audio, opts, &mut |segment| {
        if cancel.is_requested() {
            stopped = true;
            return Ok(false);
        }
        match on_segment(segment) {
            Ok(()) => Ok(true),
            Err(err) => {
                // Sink errors are ours, not the engine's. Stop the stream and
                // carry the original error past the engine boundary.
                forward_err = Some(err);
                Ok(false)
            }
        }
    });

    if let Some(err) = forward_err {
        return Err(err);
    }
    run.map_err(Error::Transcription)?;

    if stopped {
        debug!("segment stream stopped at cancellation boundary");
        Ok(StreamOutcome::Stopped)
    } else {
        Ok(StreamOutcome::Completed)
    }
}
