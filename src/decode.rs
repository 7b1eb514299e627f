//! Decode media files (audio or video containers) into mono `f32` samples at
//! the engine's target sample rate.
//!
//! Responsibilities:
//! - probe the container and pick the default audio track
//! - decode packets into interleaved `f32` PCM
//! - downmix to mono (equal-weight average)
//! - resample to 16 kHz when the source rate differs
//!
//! Inputs are seekable files on disk (a local media file or the extractor's
//! output), so we probe with an extension hint instead of streaming blind.

use std::fs::File;
use std::path::Path;

use anyhow::{anyhow, bail, ensure, Context, Result};
use rubato::{Resampler, SincFixedIn, WindowFunction};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Target mono sample rate (Hz) expected by the speech engine.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Decode `path` fully into mono samples at [`TARGET_SAMPLE_RATE`].
pub fn decode_file_to_mono_16k(path: &Path) -> Result<Vec<f32>> {
    let file =
        File::open(path).with_context(|| format!("failed to open '{}'", path.display()))?;

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let source = MediaSourceStream::new(Box::new(file), Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("failed to probe media format of '{}'", path.display()))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .cloned()
        .with_context(|| format!("no decodable audio track in '{}'", path.display()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("failed to create audio decoder for track")?;

    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut mono: Vec<f32> = Vec::new();
    let mut src_rate: u32 = 0;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // End of stream shows up as an unexpected-EOF IO error.
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(err) => return Err(anyhow!(err)).context("failed to read next packet"),
        };

        if packet.track_id() != track.id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Recoverable bad frame; keep iterating.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(err) => return Err(anyhow!(err)).context("failed to decode audio packet"),
        };

        let spec = *decoded.spec();
        src_rate = spec.rate;
        let channels = spec.channels.count();
        if channels == 0 {
            bail!("decoded audio had zero channels");
        }

        let buf = sample_buf
            .get_or_insert_with(|| SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
        buf.copy_interleaved_ref(decoded);

        append_downmixed_mono(buf.samples(), channels, &mut mono);
    }

    ensure!(
        !mono.is_empty(),
        "no audio samples decoded from '{}'",
        path.display()
    );

    if src_rate == TARGET_SAMPLE_RATE {
        return Ok(mono);
    }
    resample_to_target(&mono, src_rate)
}

/// Downmix interleaved samples into mono by averaging channels.
fn append_downmixed_mono(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels == 1 {
        out.extend_from_slice(interleaved);
        return;
    }

    let frames = interleaved.len() / channels;
    out.reserve(frames);

    for f in 0..frames {
        let base = f * channels;
        let mut acc = 0.0;
        for c in 0..channels {
            acc += interleaved[base + c];
        }
        out.push(acc / channels as f32);
    }
}

/// Resample a full mono buffer from `src_rate` to [`TARGET_SAMPLE_RATE`].
///
/// rubato expects exact input block sizes; the tail is zero-padded to fill the
/// final block.
fn resample_to_target(mono_src: &[f32], src_rate: u32) -> Result<Vec<f32>> {
    // Source frames fed per `process()` call.
    let in_chunk_src_frames = 2048;

    let mut rs = SincFixedIn::<f32>::new(
        TARGET_SAMPLE_RATE as f64 / src_rate as f64,
        2.0,
        rubato::SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: rubato::SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        },
        in_chunk_src_frames,
        1, // mono
    )
    .map_err(|e| anyhow!(e))
    .context("failed to init resampler")?;

    let in_max = rs.input_frames_max();
    let mut padded = mono_src.to_vec();
    let rem = padded.len() % in_max;
    if rem != 0 {
        padded.resize(padded.len() + (in_max - rem), 0.0);
    }

    let ratio = TARGET_SAMPLE_RATE as f64 / src_rate as f64;
    let mut out = Vec::with_capacity((mono_src.len() as f64 * ratio) as usize + in_max);

    for block in padded.chunks(in_max) {
        let input = vec![block.to_vec()];
        let processed = rs
            .process(&input, None)
            .map_err(|e| anyhow!(e))
            .context("resampler process failed")?;

        ensure!(processed.len() == 1, "expected mono output from resampler");
        out.extend_from_slice(&processed[0]);
    }

    Ok(out)
}
