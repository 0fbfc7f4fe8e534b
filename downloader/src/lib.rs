/// Social Downloader file retrieval.
///
/// Once the backend reports a job as done, the finished file is served from
/// `/download-file/<task_id>`. `FileFetcher` streams it chunk by chunk into
/// the download directory, writing to a `.part` file and renaming on success.
use std::path::{Path, PathBuf};

use reqwest::header::CONTENT_DISPOSITION;
use reqwest::{Client, Response, Url};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use socialdl_shared::backend::HttpBackend;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("File request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Backend answered with HTTP {0}")]
    Status(u16),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A file written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFile {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Streams finished files into a directory.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    client: Client,
    dir: PathBuf,
}

impl FileFetcher {
    pub fn new(client: Client, dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            dir: dir.into(),
        }
    }

    /// Reuse the backend's HTTP client (and its timeout settings).
    pub fn from_backend(backend: &HttpBackend, dir: impl Into<PathBuf>) -> Self {
        Self::new(backend.client().clone(), dir)
    }

    /// Download `url` for `task_id` into the target directory.
    pub async fn fetch(&self, task_id: &str, url: Url) -> Result<SavedFile, FetchError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        debug!("GET {}", url);
        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("File for task {} not available: HTTP {}", task_id, status);
            return Err(FetchError::Status(status.as_u16()));
        }

        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .and_then(|name| sanitize_filename(&name))
            .or_else(|| sanitize_filename(task_id))
            .unwrap_or_else(|| "download".to_string());

        let path = self.dir.join(&filename);
        let part = self.dir.join(format!("{}.part", filename));

        let bytes = match write_body(&mut response, &part).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Download of task {} broke off: {}", task_id, e);
                let _ = tokio::fs::remove_file(&part).await;
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&part, &path).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(e.into());
        }
        info!("Saved task {} to {} ({} bytes)", task_id, path.display(), bytes);

        Ok(SavedFile { path, bytes })
    }
}

/// Stream the response body into `part`, returning the byte count.
async fn write_body(response: &mut Response, part: &Path) -> Result<u64, FetchError> {
    let mut file = tokio::fs::File::create(part).await?;
    let mut bytes: u64 = 0;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        bytes += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(bytes)
}

/// Extract the filename from a `Content-Disposition` header.
/// Prefers the RFC 5987 `filename*` form over plain `filename`.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    for param in header.split(';').map(str::trim) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                // charset'language'percent-encoded
                let encoded = value.trim().splitn(3, '\'').nth(2);
                if let Some(Ok(decoded)) = encoded.map(urlencoding::decode) {
                    return Some(decoded.into_owned());
                }
            }
            "filename" => {
                plain = Some(value.trim().trim_matches('"').to_string());
            }
            _ => {}
        }
    }
    plain
}

/// Strip directories and hidden-file dots so the name stays inside the target dir.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let last = name.rsplit(|c: char| c == '/' || c == '\\').next()?.trim();
    let cleaned = last.trim_start_matches('.');
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::Router;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(tag: &str) -> PathBuf {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        std::env::temp_dir().join(format!("socialdl-{}-{}", tag, nanos))
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_filename_from_disposition() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="abc.mp4""#).as_deref(),
            Some("abc.mp4")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename=\"x.mp3\"; filename*=utf-8''%D9%85%D9%82%D8%B7%D8%B9.mp3")
                .as_deref(),
            Some("مقطع.mp3")
        );
        assert_eq!(filename_from_disposition("inline"), None);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_filename(r"C:\tmp\clip.mp4").as_deref(), Some("clip.mp4"));
        assert_eq!(sanitize_filename(".hidden").as_deref(), Some("hidden"));
        assert_eq!(sanitize_filename("dir/"), None);
    }

    #[tokio::test]
    async fn test_fetch_writes_file() {
        let app = Router::new().route(
            "/download-file/:task_id",
            get(|| async {
                (
                    [(header::CONTENT_DISPOSITION, r#"attachment; filename="clip.mp4""#)],
                    vec![7u8; 4096],
                )
                    .into_response()
            }),
        );
        let base = serve(app).await;
        let dir = temp_dir("fetch");
        let fetcher = FileFetcher::new(Client::new(), &dir);

        let url = Url::parse(&format!("{}/download-file/t1", base)).unwrap();
        let saved = fetcher.fetch("t1", url).await.unwrap();
        assert_eq!(saved.path, dir.join("clip.mp4"));
        assert_eq!(saved.bytes, 4096);
        assert_eq!(tokio::fs::read(&saved.path).await.unwrap().len(), 4096);
        assert!(!dir.join("clip.mp4.part").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_fetch_falls_back_to_task_id_and_reports_status() {
        let app = Router::new()
            .route("/download-file/ready", get(|| async { "payload" }))
            .route(
                "/download-file/pending",
                get(|| async { (axum::http::StatusCode::NOT_FOUND, "File not ready").into_response() }),
            );
        let base = serve(app).await;
        let dir = temp_dir("fallback");
        let fetcher = FileFetcher::new(Client::new(), &dir);

        let saved = fetcher
            .fetch("ready", Url::parse(&format!("{}/download-file/ready", base)).unwrap())
            .await
            .unwrap();
        assert_eq!(saved.path, dir.join("ready"));
        assert_eq!(saved.bytes, 7);

        let err = fetcher
            .fetch("pending", Url::parse(&format!("{}/download-file/pending", base)).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status(404)));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_truncated_body_leaves_no_part_file() {
        // Promise far more bytes than are sent, then hang up.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = tokio::io::AsyncReadExt::read(&mut socket, &mut request).await;
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Length: 1000000\r\n\
Content-Disposition: attachment; filename=\"cut.mp4\"\r\n\r\n0123456789",
                )
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });

        let dir = temp_dir("truncated");
        let fetcher = FileFetcher::new(Client::new(), &dir);
        let url = Url::parse(&format!("http://{}/download-file/t1", addr)).unwrap();

        let err = fetcher.fetch("t1", url).await.unwrap_err();
        assert!(matches!(err, FetchError::Request(_)));
        assert!(!dir.join("cut.mp4.part").exists());
        assert!(!dir.join("cut.mp4").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
