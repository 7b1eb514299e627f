//! Concrete speech-engine implementations.

pub mod whisper;
