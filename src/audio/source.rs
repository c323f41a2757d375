//! Capture source abstraction and the cpal microphone implementation.

use cpal::traits::{DeviceTrait, StreamTrait};
use tracing::{debug, error, info};

use super::chunk::AudioChunk;
use super::device::{find_cpal_device, DeviceInfo};
use super::error::CaptureError;

/// Receiver for chunks delivered on the capture thread.
pub type ChunkSink = Box<dyn FnMut(AudioChunk) + Send + 'static>;

/// Constructs a capture source on the thread that will own it.
///
/// cpal streams are tied to the thread they are created on, so spawned
/// recordings take a factory and build the source inside the recording
/// thread rather than moving an open source across threads.
pub type SourceFactory = Box<dyn FnOnce() -> Result<Box<dyn CaptureSource>, CaptureError> + Send>;

/// Trait for streaming capture sources (microphone, loopback, test fakes).
///
/// `start` delivers consecutive chunks to the sink on a dedicated
/// low-latency thread until `stop` is called. The sink runs on that thread:
/// it must copy or enqueue and return, nothing heavier.
pub trait CaptureSource {
    fn start(&mut self, on_chunk: ChunkSink) -> Result<(), CaptureError>;

    fn stop(&mut self);

    fn sample_rate(&self) -> u32;

    fn channels(&self) -> u16;
}

/// Microphone capture via cpal.
pub struct MicSource {
    device: cpal::Device,
    info: DeviceInfo,
    config: cpal::StreamConfig,
    stream: Option<cpal::Stream>,
    active: bool,
}

impl MicSource {
    /// Open an input device.
    ///
    /// `selector` is a case-insensitive substring of the device name; `None`
    /// opens the host default input. The effective channel count is the
    /// smaller of `channels` and what the device supports.
    pub fn open(
        selector: Option<&str>,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self, CaptureError> {
        let (device, info) = find_cpal_device(selector)?;

        let channels = channels.min(info.max_input_channels);
        if channels == 0 {
            return Err(CaptureError::NoInputChannels(info.name.clone()));
        }

        info!(
            "Recording from device: {} ({} ch @ {} Hz)",
            info.name, channels, sample_rate
        );

        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        Ok(Self {
            device,
            info,
            config,
            stream: None,
            active: false,
        })
    }

    /// Deferred form of [`open`](Self::open), for handing to a spawned
    /// recording.
    pub fn factory(selector: Option<String>, sample_rate: u32, channels: u16) -> SourceFactory {
        Box::new(move || {
            let source = MicSource::open(selector.as_deref(), sample_rate, channels)?;
            Ok(Box::new(source) as Box<dyn CaptureSource>)
        })
    }

    pub fn device_name(&self) -> &str {
        &self.info.name
    }
}

impl CaptureSource for MicSource {
    fn start(&mut self, mut on_chunk: ChunkSink) -> Result<(), CaptureError> {
        if self.active {
            return Err(CaptureError::AlreadyRecording);
        }

        let channels = self.config.channels;
        let mut seq = 0u64;
        let err_fn = |err| error!("Input stream error: {}", err);

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // One copy out of the host-owned buffer; the driver may
                    // reuse it as soon as this callback returns.
                    on_chunk(AudioChunk::new(data.to_vec(), channels, seq));
                    seq += 1;
                },
                err_fn,
                None,
            )
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        self.stream = Some(stream);
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            debug!("Stopping capture stream for {}", self.info.name);
            drop(stream);
        }
        self.active = false;
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn channels(&self) -> u16 {
        self.config.channels
    }
}

impl Drop for MicSource {
    fn drop(&mut self) {
        if self.active {
            debug!("Dropping active MicSource, cleaning up");
            self.stop();
        }
    }
}
