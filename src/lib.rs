pub mod botguard;
pub mod cache;
pub mod config;
pub mod dedupe;
pub mod fetcher;
pub mod innertube;
pub mod output;
pub mod review;
pub mod sandbox;
pub mod session;
pub mod summarize;

use serde::{Deserialize, Serialize};

/// A single timed span of caption text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub text: String,
    pub start_ms: u64,
    pub duration_ms: u64,
}

/// Complete transcript for a video.
///
/// `full_text` is always the trimmed in-order concatenation of the segment
/// texts; construct through [`Transcript::from_segments`] to keep that true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub segments: Vec<Segment>,
    pub full_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Total video duration from metadata, not the sum of segment durations
    pub duration_ms: u64,
}

impl Transcript {
    pub fn from_segments(segments: Vec<Segment>, language: Option<String>, duration_ms: u64) -> Self {
        let full_text = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<String>()
            .trim()
            .to_string();

        Transcript {
            segments,
            full_text,
            language,
            duration_ms,
        }
    }
}

/// The two failure kinds surfaced to callers of the fetcher.
/// - `NoTranscript`: the video genuinely has no captions; terminal, not retryable
/// - `FetchFailed`: any transient condition (network, non-2xx, auth failure); retryable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptError {
    NoTranscript,
    FetchFailed,
}

impl std::fmt::Display for TranscriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptError::NoTranscript => write!(f, "no_transcript"),
            TranscriptError::FetchFailed => write!(f, "fetch_failed"),
        }
    }
}

impl std::error::Error for TranscriptError {}

/// Result of a transcript fetch attempt; only `Ok` values are ever cached
pub type TranscriptOutcome = Result<Transcript, TranscriptError>;

/// Extract video ID from various YouTube URL formats
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();

    // Bare 11-character video ID
    if regex::Regex::new(r"^[a-zA-Z0-9_-]{11}$").unwrap().is_match(input) {
        return Some(input.to_string());
    }

    // youtube.com/watch?v=ID
    if let Some(caps) = regex::Regex::new(r"(?:youtube\.com/watch\?.*v=)([a-zA-Z0-9_-]{11})")
        .unwrap()
        .captures(input)
    {
        return Some(caps[1].to_string());
    }

    // youtu.be/ID
    if let Some(caps) = regex::Regex::new(r"youtu\.be/([a-zA-Z0-9_-]{11})")
        .unwrap()
        .captures(input)
    {
        return Some(caps[1].to_string());
    }

    // youtube.com/embed/ID
    if let Some(caps) = regex::Regex::new(r"youtube\.com/embed/([a-zA-Z0-9_-]{11})")
        .unwrap()
        .captures(input)
    {
        return Some(caps[1].to_string());
    }

    // youtube.com/shorts/ID
    if let Some(caps) = regex::Regex::new(r"youtube\.com/shorts/([a-zA-Z0-9_-]{11})")
        .unwrap()
        .captures(input)
    {
        return Some(caps[1].to_string());
    }

    None
}
