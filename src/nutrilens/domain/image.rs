use crate::domain::crop::ImageBounds;
use image::{ImageFormat, RgbaImage};

/// Decoded pixels of a captured image.
#[derive(Clone, Debug)]
pub struct SourceImage {
    pub pixels: RgbaImage,
}

impl SourceImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn bounds(&self) -> ImageBounds {
        ImageBounds::new(self.pixels.width(), self.pixels.height())
    }
}

/// Encoded crop, ready for upload. Never mutated after the rasterizer builds it.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterizedImage {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: ImageFormat,
}

impl RasterizedImage {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: ImageFormat) -> Self {
        Self {
            data,
            width,
            height,
            format,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        match self.format {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::WebP => "image/webp",
            _ => "image/png",
        }
    }
}
