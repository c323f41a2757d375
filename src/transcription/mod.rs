use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::config::TranscriptionConfig;

mod backend;
mod live;
mod transcript;
mod whisper_cli;

pub use backend::{BackendError, TranscribeOptions, TranscriptionBackend};
pub use live::{LiveConfig, LiveTranscriptionWorker, LiveWorkerHandle};
pub use transcript::{transcribe_recording, write_transcript};
pub use whisper_cli::WhisperCppBackend;

/// One timestamped span of transcribed speech.
///
/// `speaker` stays `None` until diarization intervals are merged in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub speaker: Option<String>,
}

/// Full text plus its segments, one per transcription call.
#[derive(Debug, Clone, Default)]
pub struct TranscriptionResult {
    pub text: String,
    pub segments: Vec<Segment>,
}

/// A backend plus the options it is called with.
///
/// Constructed once by the caller and passed into each component that needs
/// it; there is no process-wide backend cache.
pub struct Transcriber {
    backend: Box<dyn TranscriptionBackend>,
    opts: TranscribeOptions,
}

impl std::fmt::Debug for Transcriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcriber")
            .field("opts", &self.opts)
            .finish_non_exhaustive()
    }
}

impl Transcriber {
    /// Construct a backend by provider name.
    pub fn with_provider(provider_name: &str, config: &TranscriptionConfig) -> Result<Self> {
        let backend: Box<dyn TranscriptionBackend> = match provider_name {
            "whisper-cpp" => Box::new(WhisperCppBackend::new(
                config.command_path.clone(),
                config.model_path.clone(),
            )?),
            _ => bail!(
                "Unknown transcription provider '{}'. Supported providers: whisper-cpp",
                provider_name
            ),
        };

        info!("Using {} for transcription", backend.name());

        Ok(Self {
            backend,
            opts: TranscribeOptions {
                language: config.language.clone(),
                model: config.model.clone(),
                quiet: false,
            },
        })
    }

    pub fn transcribe(&self, audio_path: &Path) -> Result<TranscriptionResult, BackendError> {
        self.backend.transcribe(audio_path, &self.opts)
    }

    pub fn backend(&self) -> &dyn TranscriptionBackend {
        self.backend.as_ref()
    }

    pub fn options(&self) -> &TranscribeOptions {
        &self.opts
    }
}
