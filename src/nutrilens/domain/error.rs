use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid crop region: {0}")]
    InvalidRegion(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),
}

// カメラ取得の失敗。ユーザーに見せるメッセージはそれぞれ別にする
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Camera access was denied. Please allow camera permissions in your settings.")]
    PermissionDenied,

    #[error("No camera found. Please ensure your device has a camera.")]
    DeviceNotFound,

    #[error("The camera is already in use by another application.")]
    DeviceBusy,

    #[error("Failed to capture photo ({0}). Please try again.")]
    CaptureFailed(String),

    #[error("The camera is not open")]
    NotOpen,
}

/// Failures talking to the analysis backend or the advice API.
///
/// `Network` means no response arrived at all. `Server` carries the `error`
/// field of a structured (JSON) error body, `ServerText` a plain-text body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("{body}")]
    ServerText { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Upload aborted")]
    Aborted,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Failed to read picked file: {0}")]
    Io(String),
}
