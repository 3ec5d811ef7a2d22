//! Live-camera capture.
//!
//! A [`CameraSession`] is the capture UI's view of the camera: it owns the
//! open stream while the UI is visible and stops every track when the UI
//! closes. All exit paths (successful capture, cancel, failed acquisition,
//! drop) end with no active tracks.

use crate::domain::camera::{MediaConstraints, MediaDevices, MediaStream};
use crate::domain::capture::{CaptureResult, CaptureSource};
use crate::domain::error::{CameraError, CaptureError};
use log::{info, warn};
use std::sync::Arc;

pub struct CameraSession {
    devices: Arc<dyn MediaDevices>,
    constraints: MediaConstraints,
    stream: Option<Box<dyn MediaStream>>,
}

impl CameraSession {
    pub fn new(devices: Arc<dyn MediaDevices>, constraints: MediaConstraints) -> Self {
        Self {
            devices,
            constraints,
            stream: None,
        }
    }

    /// Acquires the camera. On failure the session holds no stream.
    pub fn open(&mut self) -> Result<(), CameraError> {
        self.close();
        match self.devices.open_video(&self.constraints) {
            Ok(stream) => {
                info!("Camera opened ({} tracks)", stream.active_track_count());
                self.stream = Some(stream);
                Ok(())
            }
            Err(platform_err) => {
                warn!("Error accessing the camera: {}", platform_err);
                Err(platform_err.into())
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub fn active_track_count(&self) -> usize {
        self.stream.as_ref().map_or(0, |s| s.active_track_count())
    }

    /// Grabs the current frame and closes the camera. A failed grab leaves
    /// the stream open so the user can try again.
    pub fn take_photo(&mut self) -> Result<CaptureResult, CameraError> {
        let stream = match self.stream.as_mut() {
            Some(stream) if stream.active_track_count() > 0 => stream,
            _ => return Err(CameraError::NotOpen),
        };
        match stream.grab_frame() {
            Ok(frame) => {
                info!("Photo captured ({} bytes, {})", frame.bytes.len(), frame.mime_type);
                self.close();
                Ok(frame)
            }
            Err(e) => {
                warn!("Error capturing photo: {}", e);
                Err(CameraError::CaptureFailed(e.message))
            }
        }
    }

    pub fn cancel(&mut self) {
        if self.is_open() {
            info!("Camera capture cancelled");
        }
        self.close();
    }

    pub fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop_all_tracks();
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl CaptureSource for CameraSession {
    fn capture(&mut self) -> Result<CaptureResult, CaptureError> {
        if !self.is_open() {
            self.open()?;
        }
        Ok(self.take_photo()?)
    }
}
