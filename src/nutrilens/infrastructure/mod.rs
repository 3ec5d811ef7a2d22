pub mod axum_handler;
pub mod data_url;
pub mod error;
pub mod file_capture;
pub mod gemini_advisor;
pub mod http_backend;
mod http_support;
pub mod image_rasterizer;
