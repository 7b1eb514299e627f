//! `vidscribe` — transcribe local media files or remote video URLs into text
//! and SRT subtitle files.
//!
//! This crate provides:
//! - Audio source resolution (local file, or remote URL via an extractor)
//! - Device/precision profile resolution from probed hardware
//! - A cancellable transcription pipeline run on an isolated worker
//! - Pluggable output encoders (plain text, SRT)
//!
//! The library is designed to be driven by CLIs and other frontends through
//! typed requests and progress events, with an emphasis on guaranteed cleanup
//! of temporary resources and minimal surprises.

// Job coordination (most consumers should start here).
pub mod job;

// Pipeline stages.
pub mod device;
pub mod driver;
pub mod source;
pub mod writer;

// Speech-engine capability seam and the built-in whisper backend.
pub mod engine;
pub mod backends;

// Audio decoding into engine-ready samples.
pub mod decode;

// Encoder interfaces and implementations.
pub mod segment_encoder;
pub mod srt_encoder;
pub mod text_encoder;

// Errors.
pub mod error;

// Logging configuration and control.
#[cfg(feature = "logging")]
pub mod logging;

pub use crate::device::{ComputeMode, Device, DeviceProfile, HardwareProbe, HardwareReport};
pub use crate::engine::{EngineHandle, Segment, SpeechEngine, TranscribeOpts};
pub use crate::error::{Error, Result};
pub use crate::job::{CancelToken, Coordinator, JobHandle, JobRequest, JobState, ProgressEvent};
pub use crate::source::{AudioSource, MediaExtractor, Origin, YtDlpExtractor};
pub use crate::writer::WriteOpts;
