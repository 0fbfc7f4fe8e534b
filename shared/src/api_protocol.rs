/// Wire types and endpoint builders for the download backend's HTTP API.
///
/// The backend exposes four endpoints: `/info`, `/start-download`,
/// `/progress/<task_id>` and `/download-file/<task_id>`.
use reqwest::Url;
use serde::Deserialize;

use crate::errors::ConfigError;
use crate::models::{MediaReference, PreviewInfo, TargetType};

/// Base address used when nothing else is configured.
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";

// ====== ENDPOINTS ======

/// Builds fully-encoded URLs for every backend endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    pub fn new(base: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidBackendUrl {
            url: base.to_string(),
            reason: reason.to_string(),
        };
        let url = Url::parse(base.trim()).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(invalid("scheme must be http or https"));
        }
        if url.cannot_be_a_base() {
            return Err(invalid("URL cannot carry a path"));
        }
        Ok(Self { base: url })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        url.set_query(None);
        // Cannot fail: `new` rejects cannot-be-a-base URLs.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// `GET /info?url=<media>`
    pub fn info(&self, media: &MediaReference) -> Url {
        let mut url = self.endpoint(&["info"]);
        url.query_pairs_mut().append_pair("url", media.as_str());
        url
    }

    /// `POST /start-download?url=<media>&type=<video|audio>&quality=<q>`
    pub fn start_download(&self, media: &MediaReference, target: TargetType, quality: &str) -> Url {
        let mut url = self.endpoint(&["start-download"]);
        url.query_pairs_mut()
            .append_pair("url", media.as_str())
            .append_pair("type", target.as_str())
            .append_pair("quality", quality);
        url
    }

    /// `GET /progress/<task_id>`
    pub fn progress(&self, task_id: &str) -> Url {
        self.endpoint(&["progress", task_id])
    }

    /// `GET /download-file/<task_id>`
    pub fn download_file(&self, task_id: &str) -> Url {
        self.endpoint(&["download-file", task_id])
    }
}

// ====== /info ======

/// Body of `GET /info`: either a failure carrying `detail`, or the preview.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InfoResponse {
    Failure { detail: serde_json::Value },
    Preview(InfoPayload),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InfoPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub video_qualities: Option<Vec<u32>>,
    #[serde(default)]
    pub audio_formats: Option<Vec<String>>,
}

impl InfoResponse {
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }
}

/// Render a `detail` value as a human-readable message.
pub fn detail_message(detail: &serde_json::Value) -> String {
    match detail.as_str() {
        Some(s) => s.to_string(),
        None => detail.to_string(),
    }
}

impl From<InfoPayload> for PreviewInfo {
    fn from(payload: InfoPayload) -> Self {
        let mut video_qualities: Vec<u32> = Vec::new();
        for q in payload.video_qualities.unwrap_or_default() {
            if !video_qualities.contains(&q) {
                video_qualities.push(q);
            }
        }
        PreviewInfo {
            title: payload.title.unwrap_or_default(),
            thumbnail_url: payload.thumbnail.unwrap_or_default(),
            duration_seconds: payload.duration,
            video_qualities,
            audio_formats: payload.audio_formats.unwrap_or_default(),
        }
    }
}

// ====== /start-download ======

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartResponse {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl StartResponse {
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    /// The task id, if the backend returned a non-empty one.
    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref().filter(|id| !id.is_empty())
    }
}

// ====== /progress/<task_id> ======

/// Job status as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum JobStatus {
    Downloading,
    Processing,
    Done,
    Error,
    /// `queued`, `starting`, or anything this client does not know about.
    Other(String),
}

impl From<String> for JobStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "downloading" => JobStatus::Downloading,
            "processing" => JobStatus::Processing,
            "done" => JobStatus::Done,
            "error" => JobStatus::Error,
            _ => JobStatus::Other(s),
        }
    }
}

impl Default for JobStatus {
    fn default() -> Self {
        JobStatus::Other(String::new())
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Downloading => write!(f, "downloading"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Done => write!(f, "done"),
            JobStatus::Error => write!(f, "error"),
            JobStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Body of `GET /progress/<task_id>`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgressReport {
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub progress: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ProgressReport {
    pub fn new(status: JobStatus, progress: f64) -> Self {
        Self {
            status,
            progress: Some(serde_json::json!(progress)),
            error: None,
        }
    }

    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    /// Reported percentage. Missing counts as 0; non-numeric yields `None`.
    pub fn progress_percent(&self) -> Option<f64> {
        let value = match &self.progress {
            None | Some(serde_json::Value::Null) => return Some(0.0),
            Some(serde_json::Value::Number(n)) => n.as_f64()?,
            Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok()?,
            Some(_) => return None,
        };
        value.is_finite().then_some(value)
    }
}
