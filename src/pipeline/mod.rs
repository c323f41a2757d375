//! Session orchestration.
//!
//! Wires one capture source into the recorder and, optionally, a live
//! transcription worker, all under a single shared cancellation token. The
//! watcher-driven variant starts and ends sessions on meeting start/end
//! events.

use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::audio::{ChunkQueue, RecordOptions, Recorder, RecordingHandle, SourceFactory};
use crate::sync::CancellationToken;
use crate::transcription::{
    LiveConfig, LiveTranscriptionWorker, LiveWorkerHandle, TranscribeOptions,
    TranscriptionBackend,
};
use crate::watcher::{MeetingEvent, MeetingWatcher, ProcessLister};

/// How often the auto loop re-checks its token while waiting for events.
const EVENT_POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// Everything a finished session produced.
pub struct SessionOutcome {
    pub wav_path: PathBuf,
    pub live_transcript: String,
}

/// Live-preview half of a session.
pub struct LiveOptions {
    pub backend: Arc<dyn TranscriptionBackend>,
    pub transcribe: TranscribeOptions,
    pub config: LiveConfig,
    pub on_transcript: Box<dyn FnMut(&str) + Send>,
}

/// Options for one meeting session.
#[derive(Default)]
pub struct SessionOptions {
    pub duration: Option<Duration>,
    pub on_progress: Option<Box<dyn Fn(f64) + Send + Sync>>,
    pub live: Option<LiveOptions>,
}

/// A recording (and optional live transcription) in flight.
pub struct MeetingSession {
    token: CancellationToken,
    recording: RecordingHandle,
    live: Option<LiveWorkerHandle>,
}

impl MeetingSession {
    /// Start capturing. The source is built by `factory` on the recording
    /// thread and feeds the recorder directly; when live options are given,
    /// a second queue tees the same chunk stream into a live transcription
    /// worker.
    pub fn begin(
        factory: SourceFactory,
        output_dir: PathBuf,
        opts: SessionOptions,
    ) -> Result<Self> {
        let token = CancellationToken::new();

        let mut taps = Vec::new();
        let live = match opts.live {
            Some(live_opts) => {
                let queue = ChunkQueue::new();
                taps.push(queue.clone());

                let worker = LiveTranscriptionWorker::new(
                    live_opts.backend,
                    live_opts.transcribe,
                    queue,
                    token.clone(),
                    live_opts.config,
                    live_opts.on_transcript,
                );
                Some(
                    worker
                        .spawn()
                        .context("Failed to spawn live transcription worker")?,
                )
            }
            None => None,
        };

        let recording = match Recorder::spawn(
            factory,
            output_dir,
            RecordOptions {
                duration: opts.duration,
                on_progress: opts.on_progress,
                taps,
            },
            token.clone(),
        ) {
            Ok(handle) => handle,
            Err(e) => {
                // Don't leave the live worker polling a queue nobody feeds.
                token.cancel();
                if let Some(live) = live {
                    let _ = live.stop();
                }
                return Err(e).context("Failed to spawn recorder");
            }
        };

        info!("Meeting session started");

        Ok(Self {
            token,
            recording,
            live,
        })
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Stop the session: cancel the shared token, collect the finished WAV
    /// and whatever live transcript accumulated.
    pub fn end(self) -> Result<SessionOutcome> {
        self.token.cancel();

        let wav_path = self.recording.stop()?;
        let live_transcript = match self.live {
            Some(handle) => handle.stop(),
            None => String::new(),
        };

        info!("Meeting session ended: {:?}", wav_path);

        Ok(SessionOutcome {
            wav_path,
            live_transcript,
        })
    }
}

/// Watcher-driven capture: start a session when a meeting process appears,
/// end it when the process goes away. Runs until `token` is cancelled; a
/// session still active at shutdown is finalized.
///
/// `start_session` is called on each STARTED edge; failures to start are
/// logged and the event is dropped (the next STARTED edge retries).
pub fn run_auto<L>(
    watcher: MeetingWatcher<L>,
    mut start_session: impl FnMut() -> Result<MeetingSession>,
    mut on_session: impl FnMut(SessionOutcome),
    token: &CancellationToken,
) -> Result<()>
where
    L: ProcessLister + 'static,
{
    let (event_tx, event_rx) = mpsc::channel();
    let watcher_handle = watcher.spawn(token.clone(), move |event| {
        let _ = event_tx.send(event);
    })?;

    let mut active: Option<MeetingSession> = None;

    while !token.is_cancelled() {
        let event = match event_rx.recv_timeout(EVENT_POLL_TIMEOUT) {
            Ok(event) => event,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };

        match event {
            MeetingEvent::Started(name) => {
                if active.is_none() {
                    info!("Starting session for {}", name);
                    match start_session() {
                        Ok(session) => active = Some(session),
                        Err(e) => warn!("Failed to start session: {}", e),
                    }
                }
            }
            MeetingEvent::Ended(name) => {
                if let Some(session) = active.take() {
                    info!("Ending session for {}", name);
                    finish_session(session, &mut on_session);
                }
            }
        }
    }

    if let Some(session) = active.take() {
        finish_session(session, &mut on_session);
    }
    watcher_handle.stop();

    Ok(())
}

fn finish_session(session: MeetingSession, on_session: &mut impl FnMut(SessionOutcome)) {
    match session.end() {
        Ok(outcome) => on_session(outcome),
        Err(e) => warn!("Session finalization failed: {}", e),
    }
}
