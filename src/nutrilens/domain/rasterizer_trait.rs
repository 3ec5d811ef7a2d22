use crate::domain::capture::CaptureResult;
use crate::domain::crop::CropRegion;
use crate::domain::image::{RasterizedImage, SourceImage};
use crate::infrastructure::error::InfrastructureError;

// 切り抜き処理の抽象。実装はインフラ層 (image クレート) に置く
pub trait ImageRasterizer {
    fn decode(&self, capture: &CaptureResult) -> Result<SourceImage, InfrastructureError>;

    /// Copies the pixels addressed by `region` into a fresh buffer and encodes it.
    fn rasterize(&self, source: &SourceImage, region: &CropRegion) -> Result<RasterizedImage, InfrastructureError>;

    /// PNG of the whole source with the crop rectangle outlined.
    fn render_overlay(&self, source: &SourceImage, region: &CropRegion) -> Result<Vec<u8>, InfrastructureError>;
}
