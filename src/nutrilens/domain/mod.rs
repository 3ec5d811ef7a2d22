pub mod advice;
pub mod analysis;
pub mod backend;
pub mod camera;
pub mod capture;
pub mod crop;
pub mod error;
pub mod history;
pub mod image;
pub mod profile;
pub mod rasterizer_trait;
