/// Data models shared across all Social Downloader crates.
use serde::{Deserialize, Serialize};

use crate::errors::ClientError;

/// User-supplied media URL. Only checked for non-emptiness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaReference(String);

impl MediaReference {
    /// Trim the input and reject it if nothing is left.
    pub fn parse(raw: &str) -> Result<Self, ClientError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ClientError::EmptyReference);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MediaReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Requested output type.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    #[default]
    Video,
    Audio,
}

impl TargetType {
    pub fn as_str(&self) -> &str {
        match self {
            TargetType::Video => "video",
            TargetType::Audio => "audio",
        }
    }
}

impl std::fmt::Display for TargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TargetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" | "mp4" => Ok(TargetType::Video),
            "audio" | "mp3" => Ok(TargetType::Audio),
            other => Err(format!("unknown target type: {}", other)),
        }
    }
}

/// Metadata preview for a media URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewInfo {
    pub title: String,
    pub thumbnail_url: String,
    pub duration_seconds: Option<f64>,
    /// Distinct heights in source order (the backend sorts them descending).
    pub video_qualities: Vec<u32>,
    pub audio_formats: Vec<String>,
}

impl PreviewInfo {
    /// Quality selected by default when this preview is shown.
    pub fn default_quality(&self) -> Option<u32> {
        self.video_qualities.first().copied()
    }

    pub fn formatted_duration(&self) -> String {
        format_duration(self.duration_seconds)
    }
}

/// Format a duration as `M:SS دقيقة`, or `-` when unknown or zero.
pub fn format_duration(seconds: Option<f64>) -> String {
    let secs = match seconds {
        Some(s) if s.is_finite() && s > 0.0 => s.floor() as u64,
        _ => return "-".to_string(),
    };
    format!("{}:{:02} دقيقة", secs / 60, secs % 60)
}

/// A download job that is currently in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub task_id: String,
    pub media: MediaReference,
    pub target_type: TargetType,
    pub requested_quality: String,
    /// Generation of the polling loop that owns this job.
    pub generation: u64,
}

/// Phase of the displayed progress.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    #[default]
    Idle,
    ServerPhase,
    ClientTailPhase,
    Settled,
}

impl std::fmt::Display for ProgressPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgressPhase::Idle => write!(f, "idle"),
            ProgressPhase::ServerPhase => write!(f, "server"),
            ProgressPhase::ClientTailPhase => write!(f, "tail"),
            ProgressPhase::Settled => write!(f, "settled"),
        }
    }
}

/// Coarse, user-facing activity of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Idle,
    FetchingInfo,
    Downloading,
    Completed,
    Error,
}
