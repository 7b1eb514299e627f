//! The speech-engine capability seam.
//!
//! The pipeline never talks to a concrete recognizer directly. It drives a
//! pair of small traits:
//! - [`SpeechEngine`] loads a model for a resolved [`DeviceProfile`] and hands
//!   back an engine handle
//! - [`EngineHandle`] streams timed segments for one audio file through a
//!   callback sink
//!
//! The built-in implementation lives in [`crate::backends::whisper`]; tests
//! drive the pipeline with scripted fakes.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::device::DeviceProfile;

/// Beam-search width passed to every engine. Fixed; not user-configurable.
pub const BEAM_SIZE: usize = 5;

/// A contiguous span of recognized speech.
///
/// Segments are produced in engine emission order and are never re-sorted or
/// merged downstream.
#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    pub start_seconds: f32,
    pub end_seconds: f32,
    pub text: String,
}

/// Options that control how a transcription is performed.
///
/// This is *library-level configuration*, not CLI flags directly; the CLI maps
/// user input into this type so other frontends can construct it
/// programmatically.
#[derive(Debug, Clone, Default)]
pub struct TranscribeOpts {
    /// Optional language hint (e.g. `"en"`, `"zh"`).
    ///
    /// `None` lets the engine auto-detect the spoken language; an explicit
    /// code is passed through unchanged.
    pub language: Option<String>,

    /// Whether to apply voice activity detection before recognition.
    ///
    /// Pure pass-through: the engine decides what filtering means; no silence
    /// inference happens in the pipeline itself.
    pub vad: bool,
}

/// Capability for instantiating a speech engine on a device/precision profile.
pub trait SpeechEngine {
    /// Loaded engine state, ready to transcribe.
    type Handle: EngineHandle;

    /// Instantiate the engine for `profile`.
    ///
    /// Fails when the model cannot be loaded for the requested device (for
    /// example, an accelerator build that finds no usable device at runtime).
    fn load(&self, profile: &DeviceProfile) -> Result<Self::Handle>;
}

/// Streaming transcription interface returned by [`SpeechEngine::load`].
pub trait EngineHandle {
    /// Transcribe one audio file, emitting segments through `on_segment` in
    /// emission order.
    ///
    /// Returning `Ok(false)` from the callback signals "stop early"; the
    /// engine must stop emitting and return `Ok(())`. Any engine-level failure
    /// aborts the stream; segments already delivered stay with the caller.
    fn transcribe(
        &mut self,
        audio: &Path,
        opts: &TranscribeOpts,
        on_segment: &mut dyn FnMut(&Segment) -> Result<bool>,
    ) -> Result<()>;
}
