//! Hardware seams: cameras, media streams and QR scanners

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::CaptureError;

/// A selectable camera
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDevice {
    pub id: String,
    /// Human label; may be empty when the platform withholds it
    pub label: String,
}

impl VideoDevice {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }

    /// Label for display; unlabelled devices become `Camera N` (1-based)
    pub fn display_label(&self, index: usize) -> String {
        if self.label.trim().is_empty() {
            format!("Camera {}", index + 1)
        } else {
            self.label.clone()
        }
    }
}

/// One captured frame, RGBA8 row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Result of one scanner decode attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A code was read; the text is not yet validated
    Decoded(String),
    /// Nothing readable in view; transient, keep scanning
    NotFound,
    /// The scanner itself failed
    Failure(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerConfig {
    pub fps: u32,
    /// Side of the square scan box, in pixels
    pub qrbox: u32,
    pub aspect_ratio: f32,
    pub facing_mode: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            fps: 10,
            qrbox: 250,
            aspect_ratio: 16.0 / 9.0,
            facing_mode: "environment".to_string(),
        }
    }
}

/// An open camera stream. `stop` must be idempotent.
#[async_trait]
pub trait MediaStream: Send + Sync {
    async fn capture_frame(&self) -> Result<Frame, CaptureError>;

    fn stop(&self);

    fn device_id(&self) -> Option<String> {
        None
    }
}

#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Open a stream on `device_id`, or the platform default when `None`
    async fn open_stream(&self, device_id: Option<&str>)
        -> Result<Box<dyn MediaStream>, CaptureError>;

    async fn list_video_devices(&self) -> Result<Vec<VideoDevice>, CaptureError>;

    /// Whether two streams may be open at once without double-claiming
    /// the hardware. Governs device-switch ordering.
    fn allows_overlapping_streams(&self) -> bool {
        false
    }
}

/// A QR scanner bound to a display region
#[async_trait]
pub trait QrScanner: Send + Sync {
    async fn start(&mut self, config: &ScannerConfig) -> Result<(), CaptureError>;

    /// Wait for the next decode attempt
    async fn next_event(&mut self) -> ScanEvent;

    /// Graceful stop; safe to call when never started or already stopped
    async fn stop(&mut self) -> Result<(), CaptureError>;

    /// Synchronous release used from `Drop`; must also be idempotent
    fn abort(&mut self);
}

pub trait ScannerFactory: Send + Sync {
    fn create(&self, region: &str) -> Result<Box<dyn QrScanner>, CaptureError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_label_fallback() {
        assert_eq!(VideoDevice::new("a", "").display_label(0), "Camera 1");
        assert_eq!(VideoDevice::new("b", "  ").display_label(2), "Camera 3");
        assert_eq!(VideoDevice::new("c", "FaceTime HD").display_label(0), "FaceTime HD");
    }

    #[test]
    fn test_scanner_defaults() {
        let config = ScannerConfig::default();
        assert_eq!(config.fps, 10);
        assert_eq!(config.qrbox, 250);
        assert!((config.aspect_ratio - 1.777_777_8).abs() < 1e-4);
        assert_eq!(config.facing_mode, "environment");
    }
}
