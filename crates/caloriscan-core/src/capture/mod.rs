//! Capture/scan state machine
//!
//! Client-side ownership of camera and scanner hardware. A session is in
//! exactly one [`CaptureMode`]; hardware handles live inside the mode that
//! owns them, wrapped in guards that release on every exit path.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ CaptureController  (tokio Mutex + CancellationToken)         │
//! │   serialises transitions, cancels a pending scan on stop     │
//! └──────────────────────────────────────────────────────────────┘
//!          │
//!          ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │ CaptureSession                                               │
//! │   Idle ──start_scan──▶ Scanning ──decoded/stop──▶ Idle       │
//! │   Idle ──open_camera─▶ CameraPreview ──switch──▶ CameraPreview│
//! │   CameraPreview ──capture──▶ Processing ──result──▶ Idle     │
//! └──────────────────────────────────────────────────────────────┘
//!          │                    │                     │
//!          ▼                    ▼                     ▼
//!   ScannerFactory         MediaDevices        DetectionGateway
//!   (ScannerGuard)         (StreamGuard)       (HTTP or in-process)
//! ```

pub mod controller;
pub mod devices;
pub mod encode;
pub mod fake;
pub mod guard;
pub mod session;

pub use controller::CaptureController;
pub use devices::{
    Frame, MediaDevices, MediaStream, QrScanner, ScanEvent, ScannerConfig, ScannerFactory,
    VideoDevice,
};
pub use encode::{encode_png, frame_from_image};
pub use guard::{ScannerGuard, StreamGuard};
pub use session::{CaptureMode, CaptureSession, ModeKind, ProcessedCapture, ScanStep};

use thiserror::Error;

use crate::services::detection::DetectionError;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("No video devices found")]
    NoDevices,

    #[error("Scanner failed: {0}")]
    ScannerFailed(String),

    #[error("Invalid QR payload: {0}")]
    InvalidPayload(String),

    #[error("Frame encoding failed: {0}")]
    Encode(String),

    #[error("Cannot {action} while {mode}")]
    InvalidTransition { mode: ModeKind, action: &'static str },

    #[error("Detection failed: {0}")]
    Detection(#[from] DetectionError),

    #[error("Cancelled")]
    Cancelled,
}

impl From<image::ImageError> for CaptureError {
    fn from(err: image::ImageError) -> Self {
        CaptureError::Encode(err.to_string())
    }
}
