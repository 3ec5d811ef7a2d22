pub mod abort;
pub mod advice_service;
mod blocking;
pub mod camera_session;
pub mod crop_stage;
pub mod error;
pub mod food_log;
pub mod scan_service;
