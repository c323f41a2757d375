use thiserror::Error;

/// Failures raised by device selection and recording.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found matching '{0}'")]
    DeviceNotFound(String),

    #[error("device '{0}' has no input channels")]
    NoInputChannels(String),

    #[error("no audio was captured")]
    NoAudioCaptured,

    #[error("recording already in progress")]
    AlreadyRecording,

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to write WAV: {0}")]
    Wav(#[from] hound::Error),
}
