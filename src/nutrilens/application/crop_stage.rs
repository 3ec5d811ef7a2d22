use crate::domain::capture::CaptureResult;
use crate::domain::crop::{CropRegion, ImageBounds, ResizeHandle};
use crate::domain::image::SourceImage;
use crate::domain::rasterizer_trait::ImageRasterizer;
use crate::infrastructure::error::InfrastructureError;
use log::debug;

/// Interactive crop selection over one captured image.
pub struct CropStage {
    source: SourceImage,
    region: CropRegion,
}

/// A frozen selection, ready for the rasterizer.
#[derive(Debug, Clone)]
pub struct ConfirmedCrop {
    pub source: SourceImage,
    pub region: CropRegion,
}

impl CropStage {
    /// Consumes the capture; the region starts as the whole image.
    pub fn load(capture: CaptureResult, rasterizer: &dyn ImageRasterizer) -> Result<Self, InfrastructureError> {
        let source = rasterizer.decode(&capture)?;
        Ok(Self::from_source(source))
    }

    pub fn from_source(source: SourceImage) -> Self {
        let region = CropRegion::full_image(source.bounds());
        debug!("Crop stage ready: {:?}", region);
        Self { source, region }
    }

    pub fn bounds(&self) -> ImageBounds {
        self.source.bounds()
    }

    pub fn region(&self) -> CropRegion {
        self.region
    }

    pub fn source(&self) -> &SourceImage {
        &self.source
    }

    pub fn drag(&mut self, dx: f64, dy: f64) -> CropRegion {
        self.region = self.region.dragged(dx, dy, self.bounds());
        self.region
    }

    pub fn resize(&mut self, handle: ResizeHandle, dx: f64, dy: f64) -> CropRegion {
        self.region = self.region.resized(handle, dx, dy, self.bounds());
        self.region
    }

    /// Replaces the selection with a finished rectangle, keeping the current
    /// aspect lock unless the candidate brings its own.
    pub fn set_region(&mut self, candidate: CropRegion) -> CropRegion {
        let aspect = candidate.aspect.or(self.region.aspect);
        self.region = candidate.with_aspect(aspect).clamped(self.bounds());
        self.region
    }

    pub fn set_aspect(&mut self, aspect: Option<f64>) {
        self.region.aspect = aspect;
    }

    pub fn clear_aspect(&mut self) {
        self.set_aspect(None);
    }

    pub fn confirm(self) -> ConfirmedCrop {
        debug!("Crop confirmed: {:?}", self.region);
        ConfirmedCrop {
            source: self.source,
            region: self.region,
        }
    }

    pub fn cancel(self) {
        debug!("Crop cancelled, discarding {}x{} source", self.bounds().width, self.bounds().height);
    }
}
