//! Job coordination: worker isolation, cancellation, progress events.
//!
//! One [`Coordinator`] runs at most one [`TranscriptionJob`] at a time, on a
//! dedicated worker thread. The caller never shares mutable state with the
//! worker; everything it observes arrives as typed [`ProgressEvent`]s over a
//! channel, in production order. The only state crossing the boundary is the
//! cancel flag and the active flag, both atomics.
//!
//! Cleanup is unconditional: the remote source's temporary directory is owned
//! by the worker-scoped [`crate::source::AudioSource`] and is reclaimed on
//! every exit path, terminal state notwithstanding.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::device::{resolve_profile, ComputeMode, HardwareProbe};
use crate::driver::{load_engine, stream_segments, StreamOutcome};
use crate::engine::{Segment, SpeechEngine, TranscribeOpts};
use crate::source::{resolve_source, MediaExtractor};
use crate::writer::{default_base_name, write_transcript, WriteOpts};

/// Cooperative stop signal shared between the caller and the worker.
///
/// Polled at segment boundaries only (see [`crate::driver`]), so cancellation
/// latency is bounded by one segment's processing time.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a cooperative stop. Idempotent.
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lifecycle of a transcription job.
///
/// Transitions are monotonic; `Completed`, `Stopped` and `Failed` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobState {
    Pending,
    Downloading,
    LoadingModel,
    Transcribing,
    Completed,
    Stopped,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Stopped | JobState::Failed)
    }

    // Monotonicity rank. Terminal states share the top slot.
    fn rank(self) -> u8 {
        match self {
            JobState::Pending => 0,
            JobState::Downloading => 1,
            JobState::LoadingModel => 2,
            JobState::Transcribing => 3,
            JobState::Completed | JobState::Stopped | JobState::Failed => 4,
        }
    }
}

/// Typed progress message emitted by the worker, observed in production order.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    StateChanged(JobState),
    /// One segment was accepted; `segment.end_seconds` doubles as the elapsed
    /// transcribed time.
    SegmentTranscribed(Segment),
    /// Terminal notification: the job's final state, the originating error
    /// message when it failed, and the output files that were written.
    Finished {
        state: JobState,
        error: Option<String>,
        outputs: Vec<PathBuf>,
    },
}

/// Everything needed to run one transcription job.
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Local media file to transcribe. Mutually exclusive with `url`.
    pub local_path: Option<PathBuf>,
    /// Remote video URL to extract audio from. Mutually exclusive with
    /// `local_path`.
    pub url: Option<String>,
    /// Optional cookie file authenticating the remote extraction.
    pub cookie_file: Option<PathBuf>,
    pub mode: ComputeMode,
    pub language: Option<String>,
    pub vad: bool,
    pub output_dir: PathBuf,
    pub write_text: bool,
    pub write_subtitles: bool,
}

/// Caller-side handle to a running job.
pub struct JobHandle {
    cancel: CancelToken,
    events: Receiver<ProgressEvent>,
    worker: Option<JoinHandle<()>>,
}

impl JobHandle {
    /// Ask the worker to stop at the next segment boundary.
    pub fn request_cancel(&self) {
        self.cancel.request();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// The worker's progress event stream.
    pub fn events(&self) -> &Receiver<ProgressEvent> {
        &self.events
    }

    /// Wait for the worker to finish and drain any remaining events.
    pub fn join(mut self) -> Vec<ProgressEvent> {
        if let Some(worker) = self.worker.take() {
            // The worker never panics by design; if it somehow does, the
            // channel disconnects and the drain below still terminates.
            let _ = worker.join();
        }
        self.events.try_iter().collect()
    }
}

/// Runs transcription jobs one at a time on an isolated worker thread.
#[derive(Debug, Clone, Default)]
pub struct Coordinator {
    active: Arc<AtomicBool>,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a job is currently running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Start a job, or return `None` when one is already active (an idempotent
    /// no-op, not an error).
    pub fn start<E, X, P>(
        &self,
        request: JobRequest,
        engine: E,
        extractor: X,
        probe: P,
    ) -> Option<JobHandle>
    where
        E: SpeechEngine + Send + 'static,
        X: MediaExtractor + Send + 'static,
        P: HardwareProbe + Send + 'static,
    {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("job start ignored: another job is active");
            return None;
        }

        let cancel = CancelToken::new();
        let (tx, rx) = mpsc::channel();

        let worker_cancel = cancel.clone();
        let active = Arc::clone(&self.active);

        let worker = thread::spawn(move || {
            // Clears the active flag on every exit path, panics included.
            let _release = ActiveGuard(active);
            run_job(request, engine, extractor, probe, worker_cancel, tx);
        });

        Some(JobHandle {
            cancel,
            events: rx,
            worker: Some(worker),
        })
    }
}

struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Advance the job state machine and notify the caller.
fn advance(state: &mut JobState, next: JobState, tx: &Sender<ProgressEvent>) {
    debug_assert!(
        next.rank() > state.rank(),
        "non-monotonic transition {state:?} -> {next:?}"
    );
    *state = next;
    info!(state = ?next, "job state");
    let _ = tx.send(ProgressEvent::StateChanged(next));
}

fn run_job<E, X, P>(
    request: JobRequest,
    engine: E,
    extractor: X,
    probe: P,
    cancel: CancelToken,
    tx: Sender<ProgressEvent>,
) where
    E: SpeechEngine,
    X: MediaExtractor,
    P: HardwareProbe,
{
    let mut state = JobState::Pending;
    let _ = tx.send(ProgressEvent::StateChanged(state));

    match run_pipeline(&request, &engine, &extractor, &probe, &cancel, &mut state, &tx) {
        Ok((final_state, outputs)) => {
            advance(&mut state, final_state, &tx);
            match final_state {
                JobState::Stopped => warn!("job stopped by user request"),
                _ => info!(outputs = outputs.len(), "job completed"),
            }
            let _ = tx.send(ProgressEvent::Finished {
                state: final_state,
                error: None,
                outputs,
            });
        }
        Err(err) => {
            error!(stage = err.stage(), error = %err, "job failed");
            advance(&mut state, JobState::Failed, &tx);
            let _ = tx.send(ProgressEvent::Finished {
                state: JobState::Failed,
                error: Some(err.to_string()),
                outputs: Vec::new(),
            });
        }
    }
}

fn run_pipeline<E, X, P>(
    request: &JobRequest,
    engine: &E,
    extractor: &X,
    probe: &P,
    cancel: &CancelToken,
    state: &mut JobState,
    tx: &Sender<ProgressEvent>,
) -> crate::Result<(JobState, Vec<PathBuf>)>
where
    E: SpeechEngine,
    X: MediaExtractor,
    P: HardwareProbe,
{
    if request.url.is_some() {
        advance(state, JobState::Downloading, tx);
    }

    // `source` owns any extraction temp dir until the end of this function,
    // which covers success, cancellation, and every error return.
    let source = resolve_source(
        request.local_path.as_deref(),
        request.url.as_deref(),
        request.cookie_file.as_deref(),
        extractor,
    )?;

    advance(state, JobState::LoadingModel, tx);
    let report = probe.probe();
    let profile = resolve_profile(&report, request.mode);
    info!(device = ?profile.device, precision = ?profile.precision, "device profile resolved");

    let mut handle = load_engine(engine, &profile)?;

    advance(state, JobState::Transcribing, tx);
    let opts = TranscribeOpts {
        language: request.language.clone(),
        vad: request.vad,
    };

    let mut segments: Vec<Segment> = Vec::new();
    let outcome = stream_segments(&mut handle, source.path(), &opts, cancel, |segment| {
        debug!(
            start = segment.start_seconds,
            end = segment.end_seconds,
            "segment accepted"
        );
        segments.push(segment.clone());
        let _ = tx.send(ProgressEvent::SegmentTranscribed(segment.clone()));
        Ok(())
    })?;

    // A user-stopped job still flushes the segments it collected; only a hard
    // failure discards them.
    let outputs = write_transcript(
        &segments,
        &request.output_dir,
        &default_base_name(),
        WriteOpts {
            write_text: request.write_text,
            write_subtitles: request.write_subtitles,
        },
    )?;

    let final_state = match outcome {
        StreamOutcome::Completed => JobState::Completed,
        StreamOutcome::Stopped => JobState::Stopped,
    };
    Ok((final_state, outputs))
}
