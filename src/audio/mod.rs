pub mod chunk;
pub mod device;
pub mod error;
pub mod queue;
pub mod recorder;
pub mod source;
pub mod wav;

pub use chunk::{AudioChunk, AudioSession};
pub use device::{list_input_devices, match_device, DeviceInfo};
pub use error::CaptureError;
pub use queue::ChunkQueue;
pub use recorder::{RecordOptions, Recorder, RecordingHandle};
pub use source::{CaptureSource, ChunkSink, MicSource, SourceFactory};
