use thiserror::Error;
use crate::domain::error::{BackendError, CameraError, CaptureError, DomainError};
use crate::infrastructure::error::InfrastructureError;

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Scan failed: {0}")]
    ScanFailed(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    CaptureError(#[from] CaptureError),

    #[error("{0}")]
    DomainError(#[from] DomainError),

    #[error("{0}")]
    BackendError(#[from] BackendError),

    #[error("Infrastructure error occurred: {0}")]
    InfrastructureError(#[from] InfrastructureError),
}

impl From<CameraError> for ApplicationError {
    fn from(err: CameraError) -> Self {
        ApplicationError::CaptureError(CaptureError::Camera(err))
    }
}

// IntoResponse implementation for ApplicationError
use axum::response::{IntoResponse, Response};
use axum::http::StatusCode;
use axum::Json;
use log::{error, warn};
use serde_json::json;

fn backend_status(err: &BackendError) -> StatusCode {
    match err {
        BackendError::Network(_) => StatusCode::BAD_GATEWAY,
        BackendError::Server { status, .. } | BackendError::ServerText { status, .. } => {
            // 上流の 4xx はそのまま返し、5xx は 502 にまとめる
            match StatusCode::from_u16(*status) {
                Ok(code) if code.is_client_error() => code,
                _ => StatusCode::BAD_GATEWAY,
            }
        }
        BackendError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
        BackendError::Aborted => StatusCode::CONFLICT,
    }
}

impl IntoResponse for ApplicationError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApplicationError::ScanFailed(msg) => {
                error!("Scan failed: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            ApplicationError::ConfigurationError(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApplicationError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApplicationError::CaptureError(capture_err) => {
                let status = match capture_err {
                    CaptureError::Camera(CameraError::PermissionDenied) => StatusCode::FORBIDDEN,
                    CaptureError::Camera(CameraError::DeviceNotFound) => StatusCode::NOT_FOUND,
                    CaptureError::Camera(_) => StatusCode::CONFLICT,
                    CaptureError::Domain(DomainError::UnsupportedMediaType(_)) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    CaptureError::Domain(_) => StatusCode::BAD_REQUEST,
                    CaptureError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, capture_err.to_string())
            }
            ApplicationError::DomainError(domain_err) => {
                let status = match domain_err {
                    DomainError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, domain_err.to_string())
            }
            ApplicationError::BackendError(backend_err) => {
                warn!("Backend call failed: {:?}", backend_err);
                (backend_status(&backend_err), backend_err.to_string())
            }
            ApplicationError::InfrastructureError(infra_err) => {
                error!("InfrastructureError: {:?}", infra_err);
                match infra_err {
                    InfrastructureError::DecodingError(_) => (StatusCode::BAD_REQUEST, infra_err.to_string()),
                    InfrastructureError::Base64DecodeError(_) => (StatusCode::BAD_REQUEST, infra_err.to_string()),
                    InfrastructureError::ImageLibError(_) => (StatusCode::UNPROCESSABLE_ENTITY, infra_err.to_string()),
                    InfrastructureError::DomainErrorWrapper(_) => (StatusCode::BAD_REQUEST, infra_err.to_string()),
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, infra_err.to_string()),
                }
            }
        };
        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
