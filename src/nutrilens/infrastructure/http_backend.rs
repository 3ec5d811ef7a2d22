use super::error::InfrastructureError;
use crate::domain::analysis::AnalysisReport;
use crate::domain::backend::{BackendFuture, LabelUpload, NutritionBackend};
use crate::domain::error::BackendError;
use crate::domain::history::{HistoryEntry, NewHistoryEntry};
use crate::domain::profile::UserProfile;
use super::http_support::{ensure_success, read_json, send};
use futures::FutureExt;
use log::{debug, info, warn};
use reqwest::multipart;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;

const UPLOAD_FILE_NAME: &str = "table-image.png";

/// Client for the label analysis backend.
pub struct HttpNutritionBackend {
    client: Client,
    base_url: Url,
}

impl HttpNutritionBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, InfrastructureError> {
        let client = Client::builder().timeout(timeout).build()?;
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self, InfrastructureError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| InfrastructureError::DecodingError(format!("invalid base URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(InfrastructureError::DecodingError(format!(
                "{} cannot be used as a base URL",
                base_url
            )));
        }
        Ok(Self { client, base_url })
    }

    // パスセグメントはここでエスケープされる
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn post_json<T: Serialize + ?Sized>(&self, segments: &[&str], body: &T) -> BackendFuture<()> {
        expect_success(self.client.post(self.endpoint(segments)).json(body))
    }

    pub async fn check_health(&self) -> bool {
        match send(self.client.get(self.endpoint(&["health"]))).await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!("Health check against {} failed: {}", self.base_url, e);
                false
            }
        }
    }
}

fn expect_success(request: RequestBuilder) -> BackendFuture<()> {
    async move {
        ensure_success(send(request).await?).await?;
        Ok(())
    }
    .boxed()
}

fn fetch_json(request: RequestBuilder) -> BackendFuture<Value> {
    async move { read_json(send(request).await?).await }.boxed()
}

impl NutritionBackend for HttpNutritionBackend {
    fn upload_label(&self, upload: LabelUpload) -> BackendFuture<AnalysisReport> {
        let url = self.endpoint(&["api", "upload"]);
        info!(
            "Uploading {}x{} label ({} bytes) to {}",
            upload.image.width(),
            upload.image.height(),
            upload.image.data().len(),
            url
        );
        let mime_type = upload.image.mime_type();
        let data = upload.image.into_data();
        let part = match multipart::Part::bytes(data.clone())
            .file_name(UPLOAD_FILE_NAME)
            .mime_str(mime_type)
        {
            Ok(part) => part,
            Err(e) => {
                warn!("Falling back to an untyped image part: {}", e);
                multipart::Part::bytes(data).file_name(UPLOAD_FILE_NAME)
            }
        };
        let form = multipart::Form::new()
            .text("weight", upload.weight_grams.to_string())
            .text("foodName", upload.food_name)
            .text("userId", upload.user_id)
            .part("image", part);

        let response = fetch_json(self.client.post(url).multipart(form));
        async move {
            let value = response.await?;
            debug!("Analysis response: {}", value);
            AnalysisReport::from_json(&value)
        }
        .boxed()
    }

    fn save_history(&self, entry: &NewHistoryEntry) -> BackendFuture<()> {
        self.post_json(&["save-history"], entry)
    }

    fn fetch_history(&self, user_id: &str) -> BackendFuture<Vec<HistoryEntry>> {
        let response = fetch_json(self.client.get(self.endpoint(&["get-history", user_id])));
        async move {
            let value = response.await?;
            let items = value
                .as_array()
                .ok_or_else(|| BackendError::MalformedResponse("history must be an array".to_string()))?;
            let entries: Vec<HistoryEntry> = items.iter().filter_map(HistoryEntry::from_value).collect();
            if entries.len() != items.len() {
                debug!("Dropped {} malformed history entries", items.len() - entries.len());
            }
            Ok(entries)
        }
        .boxed()
    }

    fn delete_history_entry(&self, user_id: &str, entry_id: &str) -> BackendFuture<()> {
        self.post_json(&["delete-entry"], &json!({ "userId": user_id, "entryId": entry_id }))
    }

    fn profile_exists(&self, user_id: &str) -> BackendFuture<bool> {
        let response = fetch_json(self.client.get(self.endpoint(&["api", "check-user-data", user_id])));
        async move {
            response
                .await?
                .get("exists")
                .and_then(Value::as_bool)
                .ok_or_else(|| BackendError::MalformedResponse("missing boolean `exists`".to_string()))
        }
        .boxed()
    }

    fn save_profile(&self, profile: &UserProfile) -> BackendFuture<()> {
        self.post_json(&["api", "user-data"], profile)
    }

    fn fetch_profile(&self, user_id: &str) -> BackendFuture<Option<UserProfile>> {
        let request = self.client.get(self.endpoint(&["user-profile", user_id]));
        async move {
            let response = send(request).await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            let value = read_json(response).await?;
            serde_json::from_value(value)
                .map(Some)
                .map_err(|e| BackendError::MalformedResponse(format!("invalid profile: {}", e)))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::image::RasterizedImage;
    use image::ImageFormat;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    fn test_client(timeout: Duration) -> Client {
        Client::builder().timeout(timeout).no_proxy().build().unwrap()
    }

    fn backend(base_url: &str) -> HttpNutritionBackend {
        HttpNutritionBackend::with_client(test_client(Duration::from_secs(5)), base_url).unwrap()
    }

    fn http_response(status_line: &str, content_type: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            content_type,
            body.len(),
            body
        )
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    // リクエストを最後まで読み切ってから返信する
    fn read_request(stream: &mut TcpStream) -> String {
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            let n = match stream.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = find(&buf, b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
                let content_length = headers
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok());
                let done = match content_length {
                    Some(len) => buf.len() >= pos + 4 + len,
                    None if headers.contains("transfer-encoding: chunked") => buf.ends_with(b"0\r\n\r\n"),
                    None => true,
                };
                if done {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// One-shot HTTP server; returns its base URL and the captured request.
    fn stub_server(response: String) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();
            request
        });
        (format!("http://{}", addr), handle)
    }

    /// Reads one request, never answers, and reports whether the client
    /// closed the connection within two seconds.
    fn silent_server() -> (String, thread::JoinHandle<bool>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            read_request(&mut stream);
            stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
            let mut buf = [0u8; 64];
            matches!(stream.read(&mut buf), Ok(0))
        });
        (format!("http://{}", addr), handle)
    }

    fn upload() -> LabelUpload {
        LabelUpload {
            image: RasterizedImage::new(vec![0x89, b'P', b'N', b'G'], 400, 300, ImageFormat::Png),
            food_name: "granola".to_string(),
            weight_grams: 150.0,
            user_id: "user_42".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upload_parses_analysis_report() {
        let (url, server) = stub_server(http_response(
            "200 OK",
            "application/json",
            r#"[7, {"ENERGY": 10, "FINAL_RATING": 6.5}]"#,
        ));
        let report = backend(&url).upload_label(upload()).await.unwrap();
        assert_eq!(report.rating, 7.0);
        assert_eq!(report.calories(), 200.0);

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /api/upload "));
        assert!(request.contains("name=\"foodName\""));
        assert!(request.contains("granola"));
        assert!(request.contains("name=\"weight\""));
        assert!(request.contains("150"));
        assert!(request.contains("name=\"userId\""));
        assert!(request.contains("filename=\"table-image.png\""));
    }

    #[tokio::test]
    async fn test_upload_500_with_json_error_body() {
        let (url, _server) = stub_server(http_response(
            "500 Internal Server Error",
            "application/json",
            r#"{"error":"disk full"}"#,
        ));
        let err = backend(&url).upload_label(upload()).await.unwrap_err();
        assert_eq!(
            err,
            BackendError::Server {
                status: 500,
                message: "disk full".to_string()
            }
        );
        assert_eq!(err.to_string(), "disk full");
    }

    #[tokio::test]
    async fn test_upload_plain_text_error_body() {
        let (url, _server) = stub_server(http_response("502 Bad Gateway", "text/plain", "upstream exploded"));
        let err = backend(&url).upload_label(upload()).await.unwrap_err();
        assert_eq!(
            err,
            BackendError::ServerText {
                status: 502,
                body: "upstream exploded".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_upload_success_with_wrong_shape_is_malformed() {
        let (url, _server) = stub_server(http_response(
            "200 OK",
            "application/json",
            r#"{"message":"File uploaded and renamed successfully"}"#,
        ));
        let err = backend(&url).upload_label(upload()).await.unwrap_err();
        assert!(matches!(err, BackendError::MalformedResponse(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_upload_success_with_invalid_json_is_malformed() {
        let (url, _server) = stub_server(http_response("200 OK", "application/json", "<html>oops</html>"));
        let err = backend(&url).upload_label(upload()).await.unwrap_err();
        assert!(matches!(err, BackendError::MalformedResponse(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_upload_timeout_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let _server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            read_request(&mut stream);
            // 返信しない
            thread::sleep(Duration::from_secs(3));
        });

        let backend = HttpNutritionBackend::with_client(test_client(Duration::from_millis(300)), &url).unwrap();
        let err = backend.upload_label(upload()).await.unwrap_err();
        assert!(matches!(err, BackendError::Network(_)), "{:?}", err);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dropping_upload_closes_connection() {
        let (url, server) = silent_server();
        let backend = backend(&url);
        let waited = tokio::time::timeout(Duration::from_millis(100), backend.upload_label(upload())).await;
        assert!(waited.is_err());
        assert!(server.join().unwrap(), "connection stayed open after the upload was dropped");
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let url = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://{}", listener.local_addr().unwrap())
        };
        let err = backend(&url).upload_label(upload()).await.unwrap_err();
        assert!(matches!(err, BackendError::Network(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_fetch_history_drops_malformed_entries() {
        let (url, server) = stub_server(http_response(
            "200 OK",
            "application/json",
            r#"[{"date":"2024-03-01","name":"oats","final_rating":7,"calories":150},{"name":"broken"}]"#,
        ));
        let entries = backend(&url).fetch_history("user 42").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "oats");
        assert!(server.join().unwrap().starts_with("GET /get-history/user%2042 "));
    }

    #[tokio::test]
    async fn test_fetch_profile_not_found_is_none() {
        let (url, _server) = stub_server(http_response(
            "404 Not Found",
            "application/json",
            r#"{"error":"User profile not found"}"#,
        ));
        assert_eq!(backend(&url).fetch_profile("user_42").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_profile_exists() {
        let (url, _server) = stub_server(http_response("200 OK", "application/json", r#"{"exists":true}"#));
        assert!(backend(&url).profile_exists("user_42").await.unwrap());
    }

    #[tokio::test]
    async fn test_save_history_posts_json() {
        let (url, server) = stub_server(http_response(
            "201 Created",
            "application/json",
            r#"{"message":"History entry saved successfully"}"#,
        ));
        let entry = NewHistoryEntry {
            user_id: "user_42".to_string(),
            name: "oats".to_string(),
            final_rating: 7.0,
            calories: 150.0,
        };
        backend(&url).save_history(&entry).await.unwrap();
        let request = server.join().unwrap();
        assert!(request.starts_with("POST /save-history "));
        assert!(request.contains(r#""userId":"user_42""#));
    }

    #[test]
    fn test_rejects_unusable_base_url() {
        assert!(HttpNutritionBackend::new("not a url", Duration::from_secs(1)).is_err());
        assert!(HttpNutritionBackend::new("mailto:someone@example.com", Duration::from_secs(1)).is_err());
    }
}
