/// Backend client: the seam between the orchestrator and the HTTP API.
///
/// `HttpBackend` talks to the real service with reqwest; tests plug in
/// scripted implementations of `Backend`.
use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Url};
use tracing::debug;

use crate::api_protocol::{
    detail_message, Endpoints, InfoResponse, ProgressReport, StartResponse,
};
use crate::errors::{BackendError, ConfigError};
use crate::models::{MediaReference, PreviewInfo, TargetType};

/// Operations the orchestrator needs from the download backend.
pub trait Backend: Send + Sync + 'static {
    /// `GET /info` for a media URL.
    fn fetch_info(
        &self,
        media: &MediaReference,
    ) -> impl Future<Output = Result<PreviewInfo, BackendError>> + Send;

    /// `POST /start-download`, returning the new task id.
    fn start_download(
        &self,
        media: &MediaReference,
        target: TargetType,
        quality: &str,
    ) -> impl Future<Output = Result<String, BackendError>> + Send;

    /// `GET /progress/<task_id>`. Any error counts as a transport failure.
    fn poll_progress(
        &self,
        task_id: &str,
    ) -> impl Future<Output = Result<ProgressReport, BackendError>> + Send;

    /// Where the finished file for `task_id` can be retrieved.
    fn file_url(&self, task_id: &str) -> Url;
}

/// reqwest-backed implementation of [`Backend`].
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    endpoints: Endpoints,
}

impl HttpBackend {
    pub fn new(endpoints: Endpoints, timeout: Duration) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self { client, endpoints })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl Backend for HttpBackend {
    async fn fetch_info(&self, media: &MediaReference) -> Result<PreviewInfo, BackendError> {
        let url = self.endpoints.info(media);
        debug!("GET {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        // A `detail` body is the backend's own failure report, whatever the status code.
        match InfoResponse::from_json(&body) {
            Ok(InfoResponse::Failure { detail }) => Err(BackendError::Rejected(detail_message(&detail))),
            Ok(InfoResponse::Preview(payload)) if status.is_success() => Ok(payload.into()),
            Ok(InfoResponse::Preview(_)) => Err(BackendError::Status(status.as_u16())),
            Err(_) if !status.is_success() => Err(BackendError::Status(status.as_u16())),
            Err(e) => Err(BackendError::InvalidResponse(e.to_string())),
        }
    }

    async fn start_download(
        &self,
        media: &MediaReference,
        target: TargetType,
        quality: &str,
    ) -> Result<String, BackendError> {
        let url = self.endpoints.start_download(media, target, quality);
        debug!("POST {}", url);

        let response = self.client.post(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        let parsed = match StartResponse::from_json(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => return Err(BackendError::Status(status.as_u16())),
            Err(e) => return Err(BackendError::InvalidResponse(e.to_string())),
        };

        if let Some(task_id) = parsed.task_id() {
            return Ok(task_id.to_string());
        }
        match parsed.detail {
            Some(detail) => Err(BackendError::Rejected(detail_message(&detail))),
            None => Err(BackendError::MissingTaskId),
        }
    }

    async fn poll_progress(&self, task_id: &str) -> Result<ProgressReport, BackendError> {
        let url = self.endpoints.progress(task_id);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        ProgressReport::from_json(&body).map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    fn file_url(&self, task_id: &str) -> Url {
        self.endpoints.download_file(task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_protocol::JobStatus;
    use axum::extract::{Path, Query};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::collections::HashMap;

    async fn serve(app: Router) -> HttpBackend {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let endpoints = Endpoints::new(&format!("http://{}", addr)).unwrap();
        HttpBackend::new(endpoints, Duration::from_secs(5)).unwrap()
    }

    fn media(s: &str) -> MediaReference {
        MediaReference::parse(s).unwrap()
    }

    fn fake_backend() -> Router {
        Router::new()
            .route(
                "/info",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    match q.get("url").map(String::as_str) {
                        Some("https://ok.example/v") => Json(serde_json::json!({
                            "title": "T",
                            "thumbnail": "x",
                            "duration": 125,
                            "video_qualities": [1080, 720],
                            "audio_formats": ["opus"],
                        }))
                        .into_response(),
                        _ => (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            Json(serde_json::json!({"detail": "Unsupported URL"})),
                        )
                            .into_response(),
                    }
                }),
            )
            .route(
                "/start-download",
                post(|Query(q): Query<HashMap<String, String>>| async move {
                    if q.get("type").map(String::as_str) == Some("audio") {
                        Json(serde_json::json!({ "task_id": uuid::Uuid::new_v4().to_string() }))
                    } else {
                        Json(serde_json::json!({}))
                    }
                }),
            )
            .route(
                "/progress/:task_id",
                get(|Path(task_id): Path<String>| async move {
                    if task_id == "known" {
                        Json(serde_json::json!({"status": "downloading", "progress": 42.0, "error": null}))
                            .into_response()
                    } else {
                        (StatusCode::NOT_FOUND, Json(serde_json::json!({"detail": "Task not found"})))
                            .into_response()
                    }
                }),
            )
    }

    #[tokio::test]
    async fn test_fetch_info_success() {
        let backend = serve(fake_backend()).await;
        let preview = backend.fetch_info(&media("https://ok.example/v")).await.unwrap();
        assert_eq!(preview.title, "T");
        assert_eq!(preview.thumbnail_url, "x");
        assert_eq!(preview.formatted_duration(), "2:05 دقيقة");
        assert_eq!(preview.default_quality(), Some(1080));
        assert_eq!(preview.audio_formats, vec!["opus".to_string()]);
    }

    #[tokio::test]
    async fn test_fetch_info_detail_is_rejected() {
        let backend = serve(fake_backend()).await;
        let err = backend.fetch_info(&media("https://bad.example/v")).await.unwrap_err();
        assert!(matches!(err, BackendError::Rejected(ref d) if d == "Unsupported URL"));
    }

    #[tokio::test]
    async fn test_start_download_task_id() {
        let backend = serve(fake_backend()).await;
        let task_id = backend
            .start_download(&media("https://ok.example/v"), TargetType::Audio, "192")
            .await
            .unwrap();
        assert!(!task_id.is_empty());

        let err = backend
            .start_download(&media("https://ok.example/v"), TargetType::Video, "1080")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::MissingTaskId));
    }

    #[tokio::test]
    async fn test_poll_progress() {
        let backend = serve(fake_backend()).await;
        let report = backend.poll_progress("known").await.unwrap();
        assert_eq!(report.status, JobStatus::Downloading);
        assert_eq!(report.progress_percent(), Some(42.0));

        let err = backend.poll_progress("missing").await.unwrap_err();
        assert!(matches!(err, BackendError::Status(404)));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let endpoints = Endpoints::new(&format!("http://{}", addr)).unwrap();
        let backend = HttpBackend::new(endpoints, Duration::from_secs(2)).unwrap();
        let err = backend.poll_progress("t1").await.unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
    }

    #[test]
    fn test_file_url() {
        let endpoints = Endpoints::new("http://127.0.0.1:8000").unwrap();
        let backend = HttpBackend::new(endpoints, Duration::from_secs(1)).unwrap();
        assert_eq!(
            backend.file_url("abc").as_str(),
            "http://127.0.0.1:8000/download-file/abc"
        );
    }
}
