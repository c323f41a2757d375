//! Live transcription worker.
//!
//! Consumes a private chunk queue fed the same audio as the recorder,
//! batches roughly `chunk_seconds` of samples, and transcribes each batch
//! through the backend. A failed attempt is logged and dropped; the live
//! preview must never take the recording down with it.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::audio::{wav, AudioChunk, ChunkQueue};
use crate::sync::CancellationToken;

use super::backend::{TranscribeOptions, TranscriptionBackend};

const POP_TIMEOUT: Duration = Duration::from_millis(500);
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Stream parameters for the live worker.
#[derive(Debug, Clone, Copy)]
pub struct LiveConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Seconds of audio to accumulate before each transcription attempt.
    pub chunk_seconds: f64,
}

/// What happened to one transcription attempt. Failures are recorded here
/// and logged instead of propagating out of the loop.
#[derive(Debug)]
enum AttemptOutcome {
    Transcribed(usize),
    Empty,
    Failed(String),
}

pub struct LiveTranscriptionWorker {
    backend: Arc<dyn TranscriptionBackend>,
    opts: TranscribeOptions,
    queue: ChunkQueue,
    token: CancellationToken,
    config: LiveConfig,
    on_transcript: Box<dyn FnMut(&str) + Send>,
    transcript_parts: Vec<String>,
    failed_attempts: u64,
}

impl LiveTranscriptionWorker {
    pub fn new(
        backend: Arc<dyn TranscriptionBackend>,
        opts: TranscribeOptions,
        queue: ChunkQueue,
        token: CancellationToken,
        config: LiveConfig,
        on_transcript: impl FnMut(&str) + Send + 'static,
    ) -> Self {
        // The live path is always quiet; progress chatter belongs to the
        // primary transcription only.
        let opts = TranscribeOptions { quiet: true, ..opts };

        Self {
            backend,
            opts,
            queue,
            token,
            config,
            on_transcript: Box::new(on_transcript),
            transcript_parts: Vec::new(),
            failed_attempts: 0,
        }
    }

    /// Consume the queue until cancellation, then flush whatever is left.
    /// Returns the accumulated transcript.
    pub fn run(mut self) -> String {
        let target_frames = (self.config.chunk_seconds * self.config.sample_rate as f64) as usize;
        let mut buffer: Vec<AudioChunk> = Vec::new();
        let mut buffered_frames = 0usize;

        while !self.token.is_cancelled() {
            let Some(chunk) = self.queue.pop(POP_TIMEOUT) else {
                continue;
            };

            buffered_frames += chunk.frames;
            buffer.push(chunk);

            if buffered_frames >= target_frames {
                let batch = std::mem::take(&mut buffer);
                buffered_frames = 0;
                self.transcribe_batch(batch);
            }
        }

        // Flush-on-stop: one final attempt on the partial batch.
        if !buffer.is_empty() {
            self.transcribe_batch(buffer);
        }

        if self.failed_attempts > 0 {
            warn!(
                "{} live transcription attempts failed and were dropped",
                self.failed_attempts
            );
        }

        self.transcript_parts.join("\n")
    }

    fn transcribe_batch(&mut self, batch: Vec<AudioChunk>) {
        match self.attempt(batch) {
            AttemptOutcome::Transcribed(chars) => {
                debug!("Live batch transcribed: {} chars", chars);
            }
            AttemptOutcome::Empty => {
                debug!("Live batch produced no text");
            }
            AttemptOutcome::Failed(reason) => {
                self.failed_attempts += 1;
                warn!("Live transcription attempt failed: {}", reason);
            }
        }
    }

    fn attempt(&mut self, batch: Vec<AudioChunk>) -> AttemptOutcome {
        let total = batch.iter().map(|c| c.samples.len()).sum();
        let mut samples = Vec::with_capacity(total);
        for chunk in &batch {
            samples.extend_from_slice(&chunk.samples);
        }

        // Chunks carry the effective channel count, which may be narrower
        // than the configured one when the device clamped it.
        let channels = batch
            .first()
            .map(|c| c.channels)
            .unwrap_or(self.config.channels);

        // The guard deletes the temp WAV on every exit path below.
        let tmp = match tempfile::Builder::new().suffix(".wav").tempfile() {
            Ok(tmp) => tmp,
            Err(e) => return AttemptOutcome::Failed(format!("temp file: {e}")),
        };

        if let Err(e) = wav::write_pcm16(tmp.path(), &samples, self.config.sample_rate, channels) {
            return AttemptOutcome::Failed(format!("wav write: {e}"));
        }

        let result = match self.backend.transcribe(tmp.path(), &self.opts) {
            Ok(result) => result,
            Err(e) => return AttemptOutcome::Failed(e.to_string()),
        };

        let text = result.text.trim();
        if text.is_empty() {
            return AttemptOutcome::Empty;
        }

        self.transcript_parts.push(text.to_string());
        let full = self.transcript_parts.join("\n");
        (self.on_transcript)(&full);
        AttemptOutcome::Transcribed(text.len())
    }

    /// Run the worker on its own thread.
    pub fn spawn(self) -> std::io::Result<LiveWorkerHandle> {
        let token = self.token.clone();
        let (result_tx, result_rx) = mpsc::channel();

        let thread = thread::Builder::new()
            .name("live-transcriber".to_string())
            .spawn(move || {
                let transcript = self.run();
                let _ = result_tx.send(transcript);
            })?;

        Ok(LiveWorkerHandle {
            token,
            result_rx,
            thread: Some(thread),
        })
    }
}

/// Handle to a live worker thread.
pub struct LiveWorkerHandle {
    token: CancellationToken,
    result_rx: mpsc::Receiver<String>,
    thread: Option<JoinHandle<()>>,
}

impl LiveWorkerHandle {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancel the worker and wait briefly for its final flush.
    ///
    /// Returns the accumulated transcript. A worker stuck in a backend call
    /// past the join timeout is detached and whatever it produced is lost,
    /// so shutdown never hangs on it.
    pub fn stop(mut self) -> String {
        self.token.cancel();

        match self.result_rx.recv_timeout(JOIN_TIMEOUT) {
            Ok(transcript) => {
                if let Some(thread) = self.thread.take() {
                    let _ = thread.join();
                }
                transcript
            }
            Err(_) => {
                warn!(
                    "Live transcription worker did not stop within {:?}; detaching",
                    JOIN_TIMEOUT
                );
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcription::backend::BackendError;
    use crate::transcription::TranscriptionResult;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Backend that counts calls and replies with canned text.
    struct CountingBackend {
        calls: AtomicUsize,
        reply: Option<&'static str>,
    }

    impl CountingBackend {
        fn replying(reply: &'static str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                reply: Some(reply),
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                reply: None,
            }
        }
    }

    impl TranscriptionBackend for CountingBackend {
        fn transcribe(
            &self,
            audio_path: &Path,
            _opts: &TranscribeOptions,
        ) -> Result<TranscriptionResult, BackendError> {
            assert!(audio_path.exists(), "temp WAV must exist during the call");
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Some(reply) => Ok(TranscriptionResult {
                    text: reply.to_string(),
                    segments: Vec::new(),
                }),
                None => Err(BackendError::Failed("model error".to_string())),
            }
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    const SAMPLE_RATE: u32 = 1_000;

    fn config() -> LiveConfig {
        LiveConfig {
            sample_rate: SAMPLE_RATE,
            channels: 1,
            chunk_seconds: 5.0,
        }
    }

    fn seconds_of_audio(queue: &ChunkQueue, seconds: usize, seq_base: u64) {
        for i in 0..seconds {
            queue.push(AudioChunk::new(
                vec![0.1; SAMPLE_RATE as usize],
                1,
                seq_base + i as u64,
            ));
        }
    }

    #[test]
    fn test_threshold_batches_plus_final_flush() {
        // 12 seconds with a 5-second threshold: two full batches while
        // running, one flush of the 2-second remainder on cancellation.
        let backend = Arc::new(CountingBackend::replying("Hello world"));
        let queue = ChunkQueue::new();
        let token = CancellationToken::new();
        let transcripts = Arc::new(Mutex::new(Vec::new()));

        seconds_of_audio(&queue, 12, 0);

        let sink = Arc::clone(&transcripts);
        let worker = LiveTranscriptionWorker::new(
            Arc::clone(&backend) as Arc<dyn TranscriptionBackend>,
            TranscribeOptions::default(),
            queue.clone(),
            token.clone(),
            config(),
            move |text: &str| sink.lock().unwrap().push(text.to_string()),
        );
        let handle = worker.spawn().unwrap();

        // Wait for the queue to drain, then stop.
        while !queue.is_empty() {
            thread::sleep(Duration::from_millis(5));
        }
        thread::sleep(Duration::from_millis(20));
        let transcript = handle.stop();

        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        assert_eq!(transcript, "Hello world\nHello world\nHello world");

        let seen = transcripts.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], "Hello world");
        assert_eq!(seen[2], "Hello world\nHello world\nHello world");
    }

    #[test]
    fn test_failing_backend_never_calls_back_and_never_panics() {
        let backend = Arc::new(CountingBackend::failing());
        let queue = ChunkQueue::new();
        let token = CancellationToken::new();
        let callbacks = Arc::new(AtomicUsize::new(0));

        seconds_of_audio(&queue, 5, 0);

        let counter = Arc::clone(&callbacks);
        let worker = LiveTranscriptionWorker::new(
            Arc::clone(&backend) as Arc<dyn TranscriptionBackend>,
            TranscribeOptions::default(),
            queue.clone(),
            token.clone(),
            config(),
            move |_text: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        let handle = worker.spawn().unwrap();

        while !queue.is_empty() {
            thread::sleep(Duration::from_millis(5));
        }
        thread::sleep(Duration::from_millis(20));
        let transcript = handle.stop();

        assert!(backend.calls.load(Ordering::SeqCst) >= 1);
        assert_eq!(callbacks.load(Ordering::SeqCst), 0);
        assert!(transcript.is_empty());
    }

    #[test]
    fn test_cancel_with_empty_buffer_exits_without_backend_call() {
        let backend = Arc::new(CountingBackend::replying("unused"));
        let queue = ChunkQueue::new();
        let token = CancellationToken::new();
        token.cancel();

        let worker = LiveTranscriptionWorker::new(
            Arc::clone(&backend) as Arc<dyn TranscriptionBackend>,
            TranscribeOptions::default(),
            queue,
            token,
            config(),
            |_text: &str| {},
        );
        let transcript = worker.run();

        assert!(transcript.is_empty());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_live_options_are_forced_quiet() {
        let worker = LiveTranscriptionWorker::new(
            Arc::new(CountingBackend::replying("x")) as Arc<dyn TranscriptionBackend>,
            TranscribeOptions {
                quiet: false,
                ..Default::default()
            },
            ChunkQueue::new(),
            CancellationToken::new(),
            config(),
            |_text: &str| {},
        );
        assert!(worker.opts.quiet);
    }
}
