use crate::domain::error::BackendError;
use reqwest::{RequestBuilder, Response};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde_json::Value;

const FALLBACK_ERROR_MESSAGE: &str = "Network response was not ok";

pub(crate) async fn send(request: RequestBuilder) -> Result<Response, BackendError> {
    request.send().await.map_err(|e| {
        if e.is_timeout() {
            BackendError::Network(format!("request timed out: {}", e))
        } else {
            BackendError::Network(e.to_string())
        }
    })
}

/// Splits a failed response into `Server` (structured JSON body) and
/// `ServerText` (anything else).
pub(crate) fn parse_error_body(status: u16, is_json: bool, body: &str) -> BackendError {
    let body = body.trim();
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) if is_json || map.contains_key("error") => {
            // {"error": "..."} と {"error": {"message": "..."}} の両方がある
            let message = map
                .get("error")
                .and_then(|e| e.as_str().or_else(|| e.get("message").and_then(Value::as_str)))
                .or_else(|| map.get("message").and_then(Value::as_str))
                .unwrap_or(FALLBACK_ERROR_MESSAGE)
                .to_string();
            BackendError::Server { status, message }
        }
        _ if is_json => BackendError::Server {
            status,
            message: if body.is_empty() { FALLBACK_ERROR_MESSAGE.to_string() } else { body.to_string() },
        },
        _ => {
            let body = if body.is_empty() {
                StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or(FALLBACK_ERROR_MESSAGE)
                    .to_string()
            } else {
                body.to_string()
            };
            BackendError::ServerText { status, body }
        }
    }
}

async fn error_from_response(response: Response) -> BackendError {
    let status = response.status().as_u16();
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("json"))
        .unwrap_or(false);
    match response.text().await {
        Ok(body) => parse_error_body(status, is_json, &body),
        Err(e) => BackendError::Network(format!("failed to read error body: {}", e)),
    }
}

pub(crate) async fn ensure_success(response: Response) -> Result<Response, BackendError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(error_from_response(response).await)
    }
}

pub(crate) async fn read_json(response: Response) -> Result<Value, BackendError> {
    let response = ensure_success(response).await?;
    let text = response
        .text()
        .await
        .map_err(|e| BackendError::Network(format!("failed to read response body: {}", e)))?;
    serde_json::from_str(&text).map_err(|e| BackendError::MalformedResponse(format!("invalid JSON: {}", e)))
}
