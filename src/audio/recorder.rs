//! Recording state machine.
//!
//! Drives a capture source, accumulates its chunks, and finalizes them into
//! a timestamped 16-bit PCM WAV file. The capture callback does nothing but
//! copy and enqueue; duration and cancellation logic live on the thread that
//! called [`Recorder::record`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::sync::CancellationToken;

use super::chunk::{AudioChunk, AudioSession};
use super::error::CaptureError;
use super::queue::ChunkQueue;
use super::source::{CaptureSource, SourceFactory};
use super::wav;

/// How often a timed recording re-checks its cancellation token, so an
/// external stop still interrupts it promptly.
const TOKEN_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound on waiting for the recording thread during shutdown.
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Options for one recording run.
#[derive(Default)]
pub struct RecordOptions {
    /// Hard duration limit. `None` records until the token is cancelled.
    pub duration: Option<Duration>,
    /// Invoked with elapsed seconds after every received chunk. Runs on the
    /// capture thread: side effects only, and it must not block or panic.
    pub on_progress: Option<Box<dyn Fn(f64) + Send + Sync>>,
    /// Queues fed a copy of every chunk, e.g. the live transcription feed.
    pub taps: Vec<ChunkQueue>,
}

/// Accumulates chunks from a capture source and writes the finished WAV.
///
/// At most one recording may be active per instance; a second call to
/// [`record`](Self::record) while one runs is rejected with
/// [`CaptureError::AlreadyRecording`].
pub struct Recorder {
    output_dir: PathBuf,
    recording: AtomicBool,
}

impl Recorder {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            recording: AtomicBool::new(false),
        }
    }

    /// Record from `source` until the duration elapses or the token is
    /// cancelled, then write the WAV and return its path.
    ///
    /// Blocks the calling thread for the whole recording. Fails with
    /// [`CaptureError::NoAudioCaptured`] if no chunk arrived before stop.
    pub fn record(
        &self,
        source: &mut dyn CaptureSource,
        token: &CancellationToken,
        opts: RecordOptions,
    ) -> Result<PathBuf, CaptureError> {
        if self.recording.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::AlreadyRecording);
        }

        let result = self.run(source, token, opts);
        self.recording.store(false, Ordering::SeqCst);
        result
    }

    fn run(
        &self,
        source: &mut dyn CaptureSource,
        token: &CancellationToken,
        opts: RecordOptions,
    ) -> Result<PathBuf, CaptureError> {
        let sample_rate = source.sample_rate();
        let channels = source.channels();

        let session = Arc::new(Mutex::new(AudioSession::new(sample_rate, channels)));
        let sink_session = Arc::clone(&session);
        let taps = opts.taps;
        let on_progress = opts.on_progress;
        let mut frames_seen: u64 = 0;

        source.start(Box::new(move |chunk: AudioChunk| {
            for tap in &taps {
                tap.push(chunk.clone());
            }
            frames_seen += chunk.frames as u64;
            sink_session.lock().unwrap().push(chunk);
            if let Some(on_progress) = &on_progress {
                on_progress(frames_seen as f64 / sample_rate as f64);
            }
        }))?;

        match opts.duration {
            Some(duration) => {
                // Timed recording, still interruptible by the token.
                let deadline = Instant::now() + duration;
                loop {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        break;
                    }
                    if token.wait_timeout(remaining.min(TOKEN_CHECK_INTERVAL)) {
                        break;
                    }
                }
            }
            None => token.wait(),
        }

        source.stop();

        let session = {
            let mut guard = session.lock().unwrap();
            std::mem::replace(&mut *guard, AudioSession::new(sample_rate, channels))
        };

        if session.is_empty() {
            return Err(CaptureError::NoAudioCaptured);
        }

        let duration = session.duration_seconds();
        let path = self.output_path()?;
        let samples = session.concat();
        wav::write_pcm16(&path, &samples, sample_rate, channels)?;

        info!("Saved {:.1}s of audio to {:?}", duration, path);
        Ok(path)
    }

    fn output_path(&self) -> Result<PathBuf, CaptureError> {
        std::fs::create_dir_all(&self.output_dir)?;

        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let path = self.output_dir.join(format!("meeting-{timestamp}.wav"));

        // Handle collision by appending a counter.
        if path.exists() {
            for i in 1..100 {
                let alt = self.output_dir.join(format!("meeting-{timestamp}-{i}.wav"));
                if !alt.exists() {
                    return Ok(alt);
                }
            }
        }

        Ok(path)
    }
}

/// Handle to a recording running on its own thread.
pub struct RecordingHandle {
    token: CancellationToken,
    result_rx: mpsc::Receiver<Result<PathBuf, CaptureError>>,
    thread: Option<JoinHandle<()>>,
}

impl Recorder {
    /// Run a recording on a dedicated thread.
    ///
    /// The capture source is built by `factory` inside that thread (cpal
    /// streams must live on the thread that owns them). The handle shares
    /// `token`: cancelling it from any clone ends the recording.
    pub fn spawn(
        factory: SourceFactory,
        output_dir: PathBuf,
        opts: RecordOptions,
        token: CancellationToken,
    ) -> Result<RecordingHandle, CaptureError> {
        let thread_token = token.clone();
        let (result_tx, result_rx) = mpsc::channel();

        let thread = thread::Builder::new()
            .name("recorder".to_string())
            .spawn(move || {
                let recorder = Recorder::new(output_dir);
                let result = factory().and_then(|mut source| {
                    recorder.record(source.as_mut(), &thread_token, opts)
                });
                let _ = result_tx.send(result);
            })?;

        Ok(RecordingHandle {
            token,
            result_rx,
            thread: Some(thread),
        })
    }
}

impl RecordingHandle {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Signal stop and wait for the WAV to be finalized.
    ///
    /// The wait is bounded: a recorder that fails to finish within the join
    /// timeout is detached rather than hanging shutdown.
    pub fn stop(mut self) -> Result<PathBuf, CaptureError> {
        self.token.cancel();

        match self.result_rx.recv_timeout(JOIN_TIMEOUT) {
            Ok(result) => {
                if let Some(thread) = self.thread.take() {
                    let _ = thread.join();
                }
                result
            }
            Err(_) => {
                warn!(
                    "Recorder did not finish within {:?}; detaching",
                    JOIN_TIMEOUT
                );
                Err(CaptureError::Stream(
                    "recorder shutdown timed out".to_string(),
                ))
            }
        }
    }
}
