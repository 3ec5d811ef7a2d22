use crate::domain::capture::CaptureResult;
use crate::domain::error::CameraError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FacingMode {
    User,
    #[default]
    Environment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaConstraints {
    pub facing_mode: FacingMode,
    pub audio: bool,
}

impl MediaConstraints {
    // ラベル撮影は背面カメラ、音声なし
    pub fn rear_camera() -> Self {
        Self {
            facing_mode: FacingMode::Environment,
            audio: false,
        }
    }
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self::rear_camera()
    }
}

/// Error categories reported by the platform media layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformErrorKind {
    NotAllowed,
    Security,
    NotFound,
    Overconstrained,
    NotReadable,
    Abort,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind:?}: {message}")]
pub struct PlatformError {
    pub kind: PlatformErrorKind,
    pub message: String,
}

impl PlatformError {
    pub fn new(kind: PlatformErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<PlatformError> for CameraError {
    fn from(err: PlatformError) -> Self {
        match err.kind {
            PlatformErrorKind::NotAllowed | PlatformErrorKind::Security => CameraError::PermissionDenied,
            PlatformErrorKind::NotFound | PlatformErrorKind::Overconstrained => CameraError::DeviceNotFound,
            PlatformErrorKind::NotReadable | PlatformErrorKind::Abort => CameraError::DeviceBusy,
        }
    }
}

/// An open video stream. Dropping the owner without calling
/// `stop_all_tracks` leaks the device, so `CameraSession` always stops it.
#[cfg_attr(test, mockall::automock)]
pub trait MediaStream: Send {
    fn active_track_count(&self) -> usize;
    fn grab_frame(&mut self) -> Result<CaptureResult, PlatformError>;
    fn stop_all_tracks(&mut self);
}

#[cfg_attr(test, mockall::automock)]
pub trait MediaDevices: Send + Sync {
    fn open_video(&self, constraints: &MediaConstraints) -> Result<Box<dyn MediaStream>, PlatformError>;
}
