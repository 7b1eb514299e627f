use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

use vidscribe::backends::whisper::WhisperEngine;
use vidscribe::device::{ComputeMode, NvidiaSmiProbe};
use vidscribe::job::{Coordinator, JobRequest, JobState, ProgressEvent};
use vidscribe::source::YtDlpExtractor;

#[derive(Parser, Debug)]
#[command(name = "vidscribe")]
#[command(about = "Transcribe a local media file or a remote video URL")]
struct Params {
    /// Path to a whisper.cpp model file (e.g. `ggml-small.bin`).
    #[arg(short = 'm', long = "model")]
    model_path: String,

    /// Optional path to a Whisper VAD model file.
    #[arg(long = "vad-model")]
    vad_model_path: Option<String>,

    /// Local media file to transcribe.
    #[arg(short = 'f', long = "file", conflicts_with = "url")]
    file: Option<PathBuf>,

    /// Remote video URL to extract audio from.
    #[arg(short = 'u', long = "url")]
    url: Option<String>,

    /// Cookie file for member-gated or login-only videos.
    #[arg(long = "cookies")]
    cookie_file: Option<PathBuf>,

    /// Compute mode.
    #[arg(long = "mode", value_enum, default_value_t = ComputeMode::Auto)]
    mode: ComputeMode,

    /// Language hint (e.g. `en`, `zh`). Omit for auto-detection.
    #[arg(short = 'l', long = "language")]
    language: Option<String>,

    /// Apply voice activity detection before recognition.
    #[arg(long = "enable-vad", default_value_t = false)]
    enable_vad: bool,

    /// Directory the transcript files are written into.
    #[arg(short = 'o', long = "output-dir", default_value = "transcripts")]
    output_dir: PathBuf,

    /// Skip the plain-text output file.
    #[arg(long = "skip-txt", default_value_t = false)]
    skip_txt: bool,

    /// Skip the SRT subtitle output file.
    #[arg(long = "skip-srt", default_value_t = false)]
    skip_srt: bool,
}

fn main() -> Result<()> {
    vidscribe::logging::init();
    let params = Params::parse();

    let mut engine = WhisperEngine::new(&params.model_path);
    if let Some(vad_model) = &params.vad_model_path {
        engine = engine.with_vad_model(vad_model);
    }

    let request = JobRequest {
        local_path: params.file,
        url: params.url,
        cookie_file: params.cookie_file,
        mode: params.mode,
        language: params.language,
        vad: params.enable_vad,
        output_dir: params.output_dir,
        write_text: !params.skip_txt,
        write_subtitles: !params.skip_srt,
    };

    let coordinator = Coordinator::new();
    let Some(handle) = coordinator.start(request, engine, YtDlpExtractor::default(), NvidiaSmiProbe)
    else {
        bail!("a transcription job is already running");
    };

    let mut final_state = None;
    for event in handle.events().iter() {
        match event {
            ProgressEvent::StateChanged(state) => eprintln!("state: {state:?}"),
            ProgressEvent::SegmentTranscribed(segment) => {
                println!("[{:.1}s] {}", segment.start_seconds, segment.text.trim());
            }
            ProgressEvent::Finished {
                state,
                error,
                outputs,
            } => {
                match state {
                    JobState::Completed => eprintln!("done: {} file(s) written", outputs.len()),
                    JobState::Stopped => eprintln!("stopped: partial transcript written"),
                    _ => eprintln!("failed: {}", error.as_deref().unwrap_or("unknown error")),
                }
                final_state = Some(state);
            }
        }
    }
    handle.join();

    match final_state {
        Some(JobState::Failed) => bail!("transcription failed"),
        Some(_) => Ok(()),
        None => bail!("worker exited without reporting a result"),
    }
}
