use crate::domain::capture::{is_image_mime, CaptureResult, CaptureSource};
use crate::domain::error::{CaptureError, DomainError};
use image::ImageFormat;
use std::path::Path;
use tokio::fs;

const GENERIC_MIME: &str = "application/octet-stream";

/// A file the user picked (from disk or a browser upload).
#[derive(Debug, Clone)]
pub struct PickedFile {
    name: String,
    bytes: Vec<u8>,
    mime_type: String,
}

fn mime_for(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Tiff => "image/tiff",
        ImageFormat::Ico => "image/x-icon",
        _ => GENERIC_MIME,
    }
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes)
        .ok()
        .map(mime_for)
        .filter(|m| *m != GENERIC_MIME)
}

impl PickedFile {
    /// Accepts the declared MIME type when it is an image type; an absent or
    /// generic one is replaced by sniffing the bytes.
    pub fn from_upload(
        name: impl Into<String>,
        bytes: Vec<u8>,
        declared_mime: Option<&str>,
    ) -> Result<Self, CaptureError> {
        let name = name.into();
        let mime_type = match declared_mime.map(str::trim).filter(|m| !m.is_empty()) {
            Some(m) if is_image_mime(m) => m.to_string(),
            Some(m) if !m.eq_ignore_ascii_case(GENERIC_MIME) => {
                return Err(DomainError::UnsupportedMediaType(m.to_string()).into())
            }
            _ => sniff_mime(&bytes)
                .ok_or_else(|| DomainError::UnsupportedMediaType(format!("{} is not an image", name)))?
                .to_string(),
        };
        if bytes.is_empty() {
            return Err(DomainError::InvalidInput(format!("{} is empty", name)).into());
        }
        Ok(Self { name, bytes, mime_type })
    }

    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .await
            .map_err(|e| CaptureError::Io(format!("{}: {}", path.display(), e)))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_upload(name, bytes, None)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

impl CaptureSource for PickedFile {
    fn capture(&mut self) -> Result<CaptureResult, CaptureError> {
        Ok(CaptureResult::new(self.bytes.clone(), self.mime_type.clone())?)
    }
}
