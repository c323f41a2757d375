//! whisper.cpp CLI backend.
//!
//! Shells out to a whisper.cpp binary; model loading and inference stay
//! outside this process. The binary's stdout is parsed back into
//! timestamped segments.

use std::path::Path;
use std::process::Command;

use tracing::debug;

use super::backend::{BackendError, TranscribeOptions, TranscriptionBackend};
use super::{Segment, TranscriptionResult};

#[derive(Debug)]
pub struct WhisperCppBackend {
    command_path: String,
    model_path: String,
}

impl WhisperCppBackend {
    pub fn new(
        command_path: Option<String>,
        model_path: Option<String>,
    ) -> Result<Self, BackendError> {
        let command_path = command_path.ok_or_else(|| {
            BackendError::Unavailable("command_path is required for whisper.cpp".to_string())
        })?;
        let model_path = model_path.ok_or_else(|| {
            BackendError::Unavailable("model_path is required for whisper.cpp".to_string())
        })?;

        Ok(Self {
            command_path,
            model_path,
        })
    }
}

impl TranscriptionBackend for WhisperCppBackend {
    fn transcribe(
        &self,
        audio_path: &Path,
        opts: &TranscribeOptions,
    ) -> Result<TranscriptionResult, BackendError> {
        let mut command = Command::new(&self.command_path);
        command
            .arg("-m")
            .arg(&self.model_path)
            .arg("-l")
            .arg(&opts.language)
            .arg("-f")
            .arg(audio_path);
        if opts.quiet {
            command.arg("--no-prints");
        }

        debug!("Running whisper.cpp on {:?}", audio_path);

        let output = command.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BackendError::Unavailable(format!(
                    "whisper.cpp binary not found at {}",
                    self.command_path
                ))
            } else {
                BackendError::Failed(e.to_string())
            }
        })?;

        if !output.status.success() {
            return Err(BackendError::Failed(format!(
                "whisper.cpp exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(parse_output(&String::from_utf8_lossy(&output.stdout)))
    }

    fn name(&self) -> &'static str {
        "whisper-cpp"
    }
}

/// Parse whisper.cpp stdout. Lines look like
/// `[00:00:00.000 --> 00:00:03.280]  text`; anything else is ignored.
fn parse_output(stdout: &str) -> TranscriptionResult {
    let mut segments = Vec::new();
    let mut text = String::new();

    for line in stdout.lines() {
        let Some((start, end, seg_text)) = parse_timestamp_line(line) else {
            continue;
        };
        if seg_text.is_empty() {
            continue;
        }
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(&seg_text);
        segments.push(Segment {
            start,
            end,
            text: seg_text,
            speaker: None,
        });
    }

    TranscriptionResult { text, segments }
}

fn parse_timestamp_line(line: &str) -> Option<(f64, f64, String)> {
    let rest = line.strip_prefix('[')?;
    let (span, text) = rest.split_once(']')?;
    let (start, end) = span.split_once("-->")?;
    Some((
        parse_timestamp(start.trim())?,
        parse_timestamp(end.trim())?,
        text.trim().to_string(),
    ))
}

/// `HH:MM:SS.mmm`; whisper.cpp sometimes emits `HH:MM:SS:mmm`.
fn parse_timestamp(ts: &str) -> Option<f64> {
    let mut parts = ts.splitn(3, ':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.replace(':', ".").parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}
