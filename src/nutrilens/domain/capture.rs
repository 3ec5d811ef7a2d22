use crate::domain::error::{CaptureError, DomainError};

/// A still image straight from a capture source, before cropping.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureResult {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl CaptureResult {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Result<Self, DomainError> {
        let mime_type = mime_type.into();
        if !is_image_mime(&mime_type) {
            return Err(DomainError::UnsupportedMediaType(mime_type));
        }
        if bytes.is_empty() {
            return Err(DomainError::InvalidInput("captured image is empty".to_string()));
        }
        Ok(Self { bytes, mime_type })
    }
}

pub fn is_image_mime(mime_type: &str) -> bool {
    let essence = mime_type.split(';').next().unwrap_or("").trim();
    match essence.split_once('/') {
        Some((top, sub)) => top.eq_ignore_ascii_case("image") && !sub.is_empty(),
        None => false,
    }
}

// ファイル選択とカメラの両方がこのトレイトを実装する
pub trait CaptureSource {
    fn capture(&mut self) -> Result<CaptureResult, CaptureError>;
}
