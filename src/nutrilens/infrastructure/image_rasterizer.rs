use crate::domain::capture::CaptureResult;
use crate::domain::crop::CropRegion;
use crate::domain::image::{RasterizedImage, SourceImage};
use crate::domain::rasterizer_trait::ImageRasterizer;
use super::error::InfrastructureError;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{imageops, ColorType, ImageEncoder, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use log::debug;
use std::io::Cursor;

const OUTLINE_COLOR: Rgba<u8> = Rgba([16, 185, 129, 255]);

pub struct DefaultRasterizer;

impl DefaultRasterizer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DefaultRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

// エンコーダーのパラメータは固定。同じ入力なら同じバイト列になる
fn encode_png(pixels: &RgbaImage) -> Result<Vec<u8>, InfrastructureError> {
    let mut buffer = Vec::new();
    PngEncoder::new_with_quality(&mut buffer, CompressionType::Default, FilterType::Adaptive)
        .write_image(pixels.as_raw(), pixels.width(), pixels.height(), ColorType::Rgba8)
        .map_err(InfrastructureError::ImageLibError)?;
    Ok(buffer)
}

impl ImageRasterizer for DefaultRasterizer {
    fn decode(&self, capture: &CaptureResult) -> Result<SourceImage, InfrastructureError> {
        let reader = image::io::Reader::new(Cursor::new(&capture.bytes))
            .with_guessed_format()
            .map_err(InfrastructureError::IoError)?;
        debug!("Decoding {} capture as {:?}", capture.mime_type, reader.format());
        let pixels = reader.decode().map_err(InfrastructureError::ImageLibError)?.to_rgba8();
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(InfrastructureError::ImageProcessingError("decoded image is empty".to_string()));
        }
        Ok(SourceImage::new(pixels))
    }

    fn rasterize(&self, source: &SourceImage, region: &CropRegion) -> Result<RasterizedImage, InfrastructureError> {
        let rect = region.validate(source.bounds())?;

        let cropped = imageops::crop_imm(&source.pixels, rect.x, rect.y, rect.width, rect.height).to_image();
        let data = encode_png(&cropped)?;
        debug!(
            "Rasterized {}x{} at ({}, {}) into {} bytes",
            rect.width,
            rect.height,
            rect.x,
            rect.y,
            data.len()
        );
        Ok(RasterizedImage::new(data, rect.width, rect.height, ImageFormat::Png))
    }

    fn render_overlay(&self, source: &SourceImage, region: &CropRegion) -> Result<Vec<u8>, InfrastructureError> {
        let rect = region.validate(source.bounds())?;
        let mut canvas = source.pixels.clone();

        // 選択範囲の外側を暗くする
        let (right, bottom) = (rect.x + rect.width, rect.y + rect.height);
        for (x, y, pixel) in canvas.enumerate_pixels_mut() {
            let inside = x >= rect.x && x < right && y >= rect.y && y < bottom;
            if !inside {
                for channel in pixel.0.iter_mut().take(3) {
                    *channel /= 2;
                }
            }
        }

        let outline = Rect::at(rect.x as i32, rect.y as i32).of_size(rect.width, rect.height);
        draw_hollow_rect_mut(&mut canvas, outline, OUTLINE_COLOR);
        if rect.width > 2 && rect.height > 2 {
            let inner = Rect::at(rect.x as i32 + 1, rect.y as i32 + 1).of_size(rect.width - 2, rect.height - 2);
            draw_hollow_rect_mut(&mut canvas, inner, OUTLINE_COLOR);
        }

        encode_png(&canvas)
    }
}
