use thiserror::Error;

/// Vidscribe's crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Vidscribe's crate-wide error type.
///
/// Each variant corresponds to one pipeline stage so callers (and logs) can tell
/// *where* a job fell over without parsing message strings. Internals build rich
/// error chains with `anyhow` and convert at the stage boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// The audio source could not be produced (missing input, extraction
    /// failure, or the extractor reported success but left no file behind).
    #[error("audio acquisition failed: {0:#}")]
    Acquisition(#[source] anyhow::Error),

    /// The speech engine could not be instantiated for the requested
    /// device/precision profile.
    #[error("model load failed: {0:#}")]
    ModelLoad(#[source] anyhow::Error),

    /// The engine failed mid-stream. Segments already emitted before the
    /// failure remain with the caller.
    #[error("transcription failed: {0:#}")]
    Transcription(#[source] anyhow::Error),

    /// A filesystem fault while serializing the transcript.
    #[error("transcript write failed: {0:#}")]
    Write(#[source] anyhow::Error),
}

impl Error {
    /// Stage tag for structured log fields.
    pub fn stage(&self) -> &'static str {
        match self {
            Error::Acquisition(_) => "acquisition",
            Error::ModelLoad(_) => "model_load",
            Error::Transcription(_) => "transcription",
            Error::Write(_) => "write",
        }
    }

    pub(crate) fn acquisition(msg: impl Into<String>) -> Self {
        Error::Acquisition(anyhow::anyhow!(msg.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_tags_match_variants() {
        assert_eq!(Error::acquisition("nope").stage(), "acquisition");
        assert_eq!(Error::Write(anyhow::anyhow!("disk full")).stage(), "write");
    }

    #[test]
    fn display_includes_cause_chain() {
        let inner = anyhow::anyhow!("no such host").context("extractor exited with status 1");
        let err = Error::Acquisition(inner);
        let msg = err.to_string();
        assert!(msg.contains("extractor exited with status 1"));
        assert!(msg.contains("no such host"));
    }
}
