//! Transcription backend abstraction.

use std::path::Path;

use thiserror::Error;

use super::TranscriptionResult;

/// Failures from a transcription backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend cannot run at all (binary or model missing,
    /// misconfigured provider).
    #[error("transcription backend unavailable: {0}")]
    Unavailable(String),

    /// One transcription attempt failed.
    #[error("transcription failed: {0}")]
    Failed(String),
}

/// Options for one transcription call.
#[derive(Debug, Clone)]
pub struct TranscribeOptions {
    pub language: String,
    pub model: String,
    /// Suppress progress chatter. The live path always sets this.
    pub quiet: bool,
}

impl Default for TranscribeOptions {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            model: "base.en".to_string(),
            quiet: false,
        }
    }
}

/// External transcription engine seam.
///
/// Implementations must be safely callable repeatedly with different
/// short-lived files; the live path hands each batch over as a temp WAV
/// that is deleted right after the call returns.
pub trait TranscriptionBackend: Send + Sync {
    fn transcribe(
        &self,
        audio_path: &Path,
        opts: &TranscribeOptions,
    ) -> Result<TranscriptionResult, BackendError>;

    fn name(&self) -> &'static str;
}
