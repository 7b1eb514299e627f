//! Built-in speech engine powered by `whisper-rs` / `whisper.cpp`.
//!
//! The adapter maps the pipeline's capability traits onto whisper.cpp:
//! - [`crate::device::Device`] selects GPU vs CPU inference (`use_gpu`)
//! - precision is carried by the model file itself (whisper.cpp quantization
//!   is baked in at conversion time), so the profile's precision informs model
//!   choice rather than a runtime switch
//! - the `vad` flag silences non-speech spans through a Whisper VAD model
//!   before the recognition pass, when one is configured

use std::os::raw::{c_char, c_void};
use std::path::Path;
use std::sync::Once;

use anyhow::{anyhow, Context, Result, ensure};
use tracing::debug;
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, WhisperSegment,
    WhisperVadContext, WhisperVadContextParams, WhisperVadParams,
};

use crate::decode::{decode_file_to_mono_16k, TARGET_SAMPLE_RATE};
use crate::device::{Device, DeviceProfile};
use crate::engine::{EngineHandle, Segment, SpeechEngine, TranscribeOpts, BEAM_SIZE};

/// A no-op log callback used to silence logs emitted by whisper.cpp.
unsafe extern "C" fn whisper_log_callback(
    _level: u32,
    _c_msg: *const c_char,
    _user_data: *mut c_void,
) {
    // Intentionally left empty.
}

/// Ensure whisper logging is configured exactly once for the lifetime of the process.
fn init_whisper_logging() {
    static INIT: Once = Once::new();

    INIT.call_once(|| unsafe {
        whisper_rs::set_log_callback(Some(whisper_log_callback), std::ptr::null_mut());
    });
}

/// [`SpeechEngine`] backed by a whisper.cpp model on disk.
#[derive(Debug, Clone)]
pub struct WhisperEngine {
    model_path: String,
    vad_model_path: Option<String>,
}

impl WhisperEngine {
    pub fn new(model_path: impl Into<String>) -> Self {
        Self {
            model_path: model_path.into(),
            vad_model_path: None,
        }
    }

    /// Configure a Whisper VAD model. Without one, the `vad` option is a
    /// no-op for this backend.
    pub fn with_vad_model(mut self, vad_model_path: impl Into<String>) -> Self {
        self.vad_model_path = Some(vad_model_path.into());
        self
    }
}

impl SpeechEngine for WhisperEngine {
    type Handle = WhisperHandle;

    fn load(&self, profile: &DeviceProfile) -> Result<Self::Handle> {
        init_whisper_logging();

        ensure!(
            !self.model_path.trim().is_empty(),
            "model path must be provided"
        );

        let mut ctx_params = WhisperContextParameters::default();
        ctx_params.use_gpu(profile.device == Device::Accelerator);

        let ctx = WhisperContext::new_with_params(&self.model_path, ctx_params)
            .with_context(|| {
                format!(
                    "failed to load model from '{}' for {:?}/{:?}",
                    self.model_path, profile.device, profile.precision
                )
            })?;

        let vad_ctx = match &self.vad_model_path {
            Some(path) => {
                ensure!(
                    Path::new(path).is_file(),
                    "VAD model not found at '{path}'"
                );
                let vad_ctx =
                    WhisperVadContext::new(path, WhisperVadContextParams::default())
                        .with_context(|| format!("failed to load VAD model from '{path}'"))?;
                Some(vad_ctx)
            }
            None => None,
        };

        Ok(WhisperHandle { ctx, vad_ctx })
    }
}

/// Loaded whisper.cpp state for one job.
pub struct WhisperHandle {
    ctx: WhisperContext,
    vad_ctx: Option<WhisperVadContext>,
}

impl std::fmt::Debug for WhisperHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperHandle")
            .field("vad", &self.vad_ctx.is_some())
            .finish_non_exhaustive()
    }
}

impl EngineHandle for WhisperHandle {
    fn transcribe(
        &mut self,
        audio: &Path,
        opts: &TranscribeOpts,
        on_segment: &mut dyn FnMut(&Segment) -> Result<bool>,
    ) -> Result<()> {
        let mut samples = decode_file_to_mono_16k(audio)?;

        if opts.vad {
            if let Some(vad_ctx) = self.vad_ctx.as_mut() {
                let found_speech = silence_non_speech(vad_ctx, &mut samples)?;
                if !found_speech {
                    debug!("VAD found no speech; nothing to transcribe");
                    return Ok(());
                }
            }
        }

        let params = build_full_params(opts);
        let mut state = self
            .ctx
            .create_state()
            .context("failed to create whisper state")?;
        state
            .full(params, &samples)
            .context("failed to run whisper full()")?;

        for whisper_segment in state.as_iter() {
            let segment = to_segment(whisper_segment)?;
            if !on_segment(&segment)? {
                return Ok(());
            }
        }

        Ok(())
    }
}

fn build_full_params(opts: &TranscribeOpts) -> FullParams<'_, '_> {
    let mut params = FullParams::new(SamplingStrategy::BeamSearch {
        beam_size: BEAM_SIZE as i32,
        patience: 1.0,
    });

    params.set_n_threads(num_cpus::get() as i32);
    params.set_translate(false);
    params.set_language(opts.language.as_deref());
    params.set_no_context(true);
    params.set_single_segment(false);

    params.set_print_progress(false);
    params.set_print_special(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);

    params
}

fn to_segment(segment: WhisperSegment) -> Result<Segment> {
    let text = segment
        .to_str()
        .context("failed to get segment text")?
        .to_owned();

    Ok(Segment {
        start_seconds: centiseconds_to_seconds(segment.start_timestamp()),
        end_seconds: centiseconds_to_seconds(segment.end_timestamp()),
        text,
    })
}

// Whisper timestamps are centiseconds (10ms units).
fn centiseconds_to_seconds(cs: i64) -> f32 {
    cs as f32 / 100.0
}

/// Run VAD and zero out non-speech regions in place, preserving the timeline.
///
/// Returns `false` when the detector finds no speech at all.
fn silence_non_speech(ctx: &mut WhisperVadContext, samples: &mut [f32]) -> Result<bool> {
    let mut vad_params = WhisperVadParams::default();
    // Cap max speech duration to avoid producing extremely long segments.
    vad_params.set_max_speech_duration(15.0);

    let segments = ctx.segments_from_samples(vad_params, samples)?;
    let n = segments.num_segments();
    if n == 0 {
        return Ok(false);
    }

    let sample_rate = TARGET_SAMPLE_RATE as f32;
    let mut cursor = 0usize;

    for i in 0..n {
        let start_cs = segments
            .get_segment_start_timestamp(i)
            .ok_or_else(|| anyhow!("missing start timestamp for VAD segment {i}"))?;
        let end_cs = segments
            .get_segment_end_timestamp(i)
            .ok_or_else(|| anyhow!("missing end timestamp for VAD segment {i}"))?;

        // Centiseconds → seconds → sample indices, clamped so slicing is safe.
        let start_idx = (((start_cs / 100.0) * sample_rate).floor() as usize).min(samples.len());
        let end_idx = (((end_cs / 100.0) * sample_rate).ceil() as usize).min(samples.len());

        if start_idx > cursor {
            samples[cursor..start_idx].fill(0.0);
        }
        cursor = cursor.max(end_idx.max(start_idx));
    }

    if cursor < samples.len() {
        samples[cursor..].fill(0.0);
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centiseconds_convert_to_seconds() {
        assert_eq!(centiseconds_to_seconds(0), 0.0);
        assert_eq!(centiseconds_to_seconds(250), 2.5);
        assert_eq!(centiseconds_to_seconds(654), 6.54);
    }

    #[test]
    fn load_fails_for_missing_model_file() {
        let engine = WhisperEngine::new("/nonexistent/ggml-small.bin");
        let profile = DeviceProfile {
            device: Device::Cpu,
            precision: crate::device::Precision::Float32,
        };
        assert!(engine.load(&profile).is_err());
    }

    #[test]
    fn load_rejects_empty_model_path() {
        let engine = WhisperEngine::new("   ");
        let profile = DeviceProfile {
            device: Device::Cpu,
            precision: crate::device::Precision::Float32,
        };
        let err = engine.load(&profile).unwrap_err();
        assert!(err.to_string().contains("model path"));
    }
}
