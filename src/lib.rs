//! Meeting capture with incremental transcription.
//!
//! The pipeline: a capture source delivers audio chunks on a driver thread;
//! the recorder accumulates them into a WAV while a live transcription
//! worker batches a tee of the same stream through an external backend; a
//! process watcher turns meeting-app presence into start/end events; and a
//! pure merge assigns diarized speakers to transcript segments. Everything
//! stops cooperatively through one shared cancellation token per session.
//!
//! Model inference, summarization, and user interfaces live outside this
//! crate behind the [`transcription::TranscriptionBackend`] and
//! [`diarization::DiarizationProvider`] seams.

pub mod audio;
pub mod config;
pub mod diarization;
pub mod global;
pub mod pipeline;
pub mod sync;
pub mod transcription;
pub mod watcher;
