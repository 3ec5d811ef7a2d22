use thiserror::Error;
use crate::domain::error::DomainError;

#[derive(Error, Debug)]
pub enum InfrastructureError {
    #[error("Image processing failed: {0}")]
    ImageProcessingError(String),

    #[error("Data decoding failed: {0}")]
    DecodingError(String),

    #[error("Underlying image library error: {0}")]
    ImageLibError(#[from] image::ImageError), // image::ImageError をラップ

    #[error("Underlying I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("Base64 decode error: {0}")]
    Base64DecodeError(#[from] base64::DecodeError),

    // 切り抜き範囲の検証エラーなどはそのまま包む
    #[error("{0}")]
    DomainErrorWrapper(#[from] DomainError),
}
