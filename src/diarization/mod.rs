//! Speaker diarization: the external provider seam and the merge of
//! speaker intervals into transcript segments.

use std::path::Path;
use std::process::Command;

use thiserror::Error;
use tracing::{debug, info};

use crate::transcription::Segment;

/// Label assigned when no speaker interval overlaps a segment.
pub const UNKNOWN_SPEAKER: &str = "UNKNOWN";

/// A labeled span of speech produced by the diarization model.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerInterval {
    pub speaker: String,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Error)]
pub enum DiarizeError {
    #[error("{0} is not set; speaker diarization requires an access token")]
    MissingCredential(String),

    #[error("diarization failed: {0}")]
    Failed(String),
}

/// External diarization model seam.
pub trait DiarizationProvider: Send + Sync {
    fn diarize(&self, audio_path: &Path) -> Result<Vec<SpeakerInterval>, DiarizeError>;
}

/// Assign each segment the speaker whose interval overlaps it the most.
///
/// An interval replaces the current best only on strictly greater overlap,
/// so the first interval in input order wins exact ties. Segments that no
/// interval touches get [`UNKNOWN_SPEAKER`]. Inputs are not mutated; the
/// returned segments preserve input order.
pub fn merge(segments: &[Segment], intervals: &[SpeakerInterval]) -> Vec<Segment> {
    segments
        .iter()
        .map(|seg| {
            let mut best_speaker = UNKNOWN_SPEAKER;
            let mut best_overlap = 0.0f64;

            for interval in intervals {
                let overlap =
                    (seg.end.min(interval.end) - seg.start.max(interval.start)).max(0.0);
                if overlap > best_overlap {
                    best_overlap = overlap;
                    best_speaker = &interval.speaker;
                }
            }

            Segment {
                start: seg.start,
                end: seg.end,
                text: seg.text.clone(),
                speaker: Some(best_speaker.to_string()),
            }
        })
        .collect()
}

/// Diarization via an external pyannote runner command.
///
/// The runner receives the audio path as its single argument and prints one
/// `speaker<TAB>start<TAB>end` line per speaker turn. The access token is
/// resolved at construction so a missing credential fails before any audio
/// work is done.
#[derive(Debug)]
pub struct PyannoteCliProvider {
    command_path: String,
    token: String,
}

impl PyannoteCliProvider {
    pub fn new(command_path: String, token_env: &str) -> Result<Self, DiarizeError> {
        let token = std::env::var(token_env)
            .map_err(|_| DiarizeError::MissingCredential(token_env.to_string()))?;

        Ok(Self {
            command_path,
            token,
        })
    }
}

impl DiarizationProvider for PyannoteCliProvider {
    fn diarize(&self, audio_path: &Path) -> Result<Vec<SpeakerInterval>, DiarizeError> {
        debug!("Running speaker diarization on {:?}", audio_path);

        let output = Command::new(&self.command_path)
            .arg(audio_path)
            .env("HF_TOKEN", &self.token)
            .output()
            .map_err(|e| DiarizeError::Failed(e.to_string()))?;

        if !output.status.success() {
            return Err(DiarizeError::Failed(format!(
                "diarization runner exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let intervals = parse_intervals(&String::from_utf8_lossy(&output.stdout));

        let speakers: std::collections::HashSet<&str> =
            intervals.iter().map(|i| i.speaker.as_str()).collect();
        info!("Identified {} speakers", speakers.len());

        Ok(intervals)
    }
}

fn parse_intervals(stdout: &str) -> Vec<SpeakerInterval> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut parts = line.split('\t');
            let speaker = parts.next()?.trim();
            let start: f64 = parts.next()?.trim().parse().ok()?;
            let end: f64 = parts.next()?.trim().parse().ok()?;
            if speaker.is_empty() {
                return None;
            }
            Some(SpeakerInterval {
                speaker: speaker.to_string(),
                start,
                end,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(start: f64, end: f64, text: &str) -> Segment {
        Segment {
            start,
            end,
            text: text.to_string(),
            speaker: None,
        }
    }

    fn interval(speaker: &str, start: f64, end: f64) -> SpeakerInterval {
        SpeakerInterval {
            speaker: speaker.to_string(),
            start,
            end,
        }
    }

    #[test]
    fn test_empty_segments_merge_to_empty() {
        let intervals = vec![interval("A", 0.0, 10.0)];
        assert!(merge(&[], &intervals).is_empty());
    }

    #[test]
    fn test_no_intervals_labels_everything_unknown() {
        let segments = vec![segment(0.0, 1.0, "a"), segment(1.0, 2.0, "b")];
        let merged = merge(&segments, &[]);

        assert_eq!(merged.len(), 2);
        for seg in &merged {
            assert_eq!(seg.speaker.as_deref(), Some(UNKNOWN_SPEAKER));
        }
    }

    #[test]
    fn test_zero_overlap_is_unknown_any_overlap_is_labeled() {
        let segments = vec![segment(0.0, 2.0, "early"), segment(10.0, 12.0, "late")];
        let intervals = vec![interval("SPEAKER_00", 9.0, 11.0)];
        let merged = merge(&segments, &intervals);

        assert_eq!(merged[0].speaker.as_deref(), Some(UNKNOWN_SPEAKER));
        assert_eq!(merged[1].speaker.as_deref(), Some("SPEAKER_00"));
    }

    #[test]
    fn test_greatest_overlap_wins() {
        // Segment 0..10: A overlaps 3s, B overlaps 6s.
        let segments = vec![segment(0.0, 10.0, "x")];
        let intervals = vec![interval("A", 0.0, 3.0), interval("B", 4.0, 10.0)];

        let merged = merge(&segments, &intervals);
        assert_eq!(merged[0].speaker.as_deref(), Some("B"));
    }

    #[test]
    fn test_exact_tie_keeps_first_interval_in_input_order() {
        let segments = vec![segment(0.0, 10.0, "x")];
        let intervals = vec![interval("A", 0.0, 5.0), interval("B", 5.0, 10.0)];

        let merged = merge(&segments, &intervals);
        assert_eq!(merged[0].speaker.as_deref(), Some("A"));

        // Reversed input order flips the winner.
        let reversed = vec![interval("B", 5.0, 10.0), interval("A", 0.0, 5.0)];
        let merged = merge(&segments, &reversed);
        assert_eq!(merged[0].speaker.as_deref(), Some("B"));
    }

    #[test]
    fn test_interval_order_does_not_matter_for_strict_maxima() {
        let segments = vec![segment(0.0, 10.0, "x")];
        let a_then_b = vec![interval("A", 0.0, 3.0), interval("B", 3.0, 10.0)];
        let b_then_a = vec![interval("B", 3.0, 10.0), interval("A", 0.0, 3.0)];

        assert_eq!(
            merge(&segments, &a_then_b)[0].speaker,
            merge(&segments, &b_then_a)[0].speaker
        );
    }

    #[test]
    fn test_merge_preserves_order_text_and_times() {
        let segments = vec![segment(0.0, 1.0, "first"), segment(1.0, 2.0, "second")];
        let intervals = vec![interval("A", 0.0, 2.0)];
        let merged = merge(&segments, &intervals);

        assert_eq!(merged[0].text, "first");
        assert_eq!(merged[1].text, "second");
        assert_eq!(merged[1].start, 1.0);
        assert_eq!(merged[1].end, 2.0);
    }

    #[test]
    fn test_parse_intervals() {
        let stdout = "SPEAKER_00\t0.5\t4.2\nSPEAKER_01\t4.2\t9.0\nnot a line\n";
        let intervals = parse_intervals(stdout);

        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].speaker, "SPEAKER_00");
        assert!((intervals[1].end - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_credential_fails_at_construction() {
        let err = PyannoteCliProvider::new(
            "diarize".to_string(),
            "STENOGRAM_TEST_TOKEN_THAT_IS_NOT_SET",
        )
        .unwrap_err();
        assert!(matches!(err, DiarizeError::MissingCredential(_)));
    }
}
