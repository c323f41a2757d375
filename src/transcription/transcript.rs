//! Transcript artifacts: the primary (post-recording) transcription path
//! and the text file it produces.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::diarization::{self, DiarizationProvider};

use super::backend::{TranscribeOptions, TranscriptionBackend};
use super::TranscriptionResult;

/// Transcribe a finished recording and write its transcript artifact.
///
/// One backend call; a backend failure propagates to the caller, no retry.
/// When a diarization provider is given, its intervals are merged into the
/// segments before the artifact is written.
pub fn transcribe_recording(
    backend: &dyn TranscriptionBackend,
    opts: &TranscribeOptions,
    audio_path: &Path,
    transcripts_dir: &Path,
    diarizer: Option<&dyn DiarizationProvider>,
) -> Result<PathBuf> {
    let mut result = backend.transcribe(audio_path, opts)?;

    if let Some(diarizer) = diarizer {
        let intervals = diarizer.diarize(audio_path)?;
        result.segments = diarization::merge(&result.segments, &intervals);
    }

    write_transcript(&result, audio_path, transcripts_dir)
}

/// Write the transcript for `audio_path` into `transcripts_dir`, named after
/// the recording's stem.
pub fn write_transcript(
    result: &TranscriptionResult,
    audio_path: &Path,
    transcripts_dir: &Path,
) -> Result<PathBuf> {
    std::fs::create_dir_all(transcripts_dir)
        .context("Failed to create transcripts directory")?;

    let stem = audio_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("transcript");
    let path = transcripts_dir.join(format!("{stem}.txt"));

    std::fs::write(&path, render_transcript(result)).context("Failed to write transcript")?;

    info!("Transcript saved to {:?}", path);
    Ok(path)
}

/// Render the artifact: full text followed by timestamped segment lines,
/// speaker-prefixed where labeled.
fn render_transcript(result: &TranscriptionResult) -> String {
    let mut lines = Vec::new();

    lines.push("=== TRANSCRIPT ===".to_string());
    lines.push(String::new());
    lines.push(result.text.clone());
    lines.push(String::new());

    lines.push("=== TIMESTAMPED SEGMENTS ===".to_string());
    lines.push(String::new());
    for seg in &result.segments {
        let start = format_time(seg.start);
        let end = format_time(seg.end);
        match &seg.speaker {
            Some(speaker) => {
                lines.push(format!("[{speaker}] [{start} -> {end}] {}", seg.text));
            }
            None => lines.push(format!("[{start} -> {end}] {}", seg.text)),
        }
    }

    lines.join("\n")
}

fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        total % 3600 / 60,
        total % 60
    )
}
