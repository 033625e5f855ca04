//! The capture session state machine
//!
//! Hardware handles are owned by the mode variant that needs them, so a
//! camera can never be live while scanning and a stream never outlives
//! `CameraPreview`. Every error path drops back to `Idle` with a
//! dismissable message in the error overlay.

use std::fmt;
use std::sync::Arc;

use crate::models::DetectionResult;
use crate::services::detection::{DetectionError, DetectionErrorKind, DetectionGateway};
use crate::services::presentation::{decode_qr_payload, present, present_text, PresentationState};

use super::devices::{MediaDevices, ScanEvent, ScannerConfig, ScannerFactory, VideoDevice};
use super::encode::encode_png;
use super::guard::{ScannerGuard, StreamGuard};
use super::CaptureError;

pub const STATUS_QR_DECODED: &str = "QR Code successfully decoded!";
pub const STATUS_NO_QR: &str = "No QR Code detected.";
pub const STATUS_PROCESSING: &str = "Processing image...";
pub const STATUS_PROCESSED: &str = "Image processed successfully!";

pub const MSG_INVALID_QR: &str = "Invalid QR Code data. Please try again.";
pub const MSG_CAMERA_UNAVAILABLE: &str = "Unable to access the camera. Please try again.";
pub const MSG_PROCESS_FAILED: &str = "Failed to process image.";

/// Display region the scanner renders into
pub const DEFAULT_SCAN_REGION: &str = "reader";

/// Current mode, owning whatever hardware it needs
pub enum CaptureMode {
    Idle,
    Scanning {
        scanner: ScannerGuard,
    },
    CameraPreview {
        stream: StreamGuard,
        device_id: Option<String>,
    },
    /// Frame captured and camera released; waiting on detection
    Processing {
        device_id: Option<String>,
    },
}

impl CaptureMode {
    pub fn kind(&self) -> ModeKind {
        match self {
            CaptureMode::Idle => ModeKind::Idle,
            CaptureMode::Scanning { .. } => ModeKind::Scanning,
            CaptureMode::CameraPreview { .. } => ModeKind::CameraPreview,
            CaptureMode::Processing { .. } => ModeKind::Processing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    Idle,
    Scanning,
    CameraPreview,
    Processing,
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeKind::Idle => write!(f, "idle"),
            ModeKind::Scanning => write!(f, "scanning"),
            ModeKind::CameraPreview => write!(f, "previewing the camera"),
            ModeKind::Processing => write!(f, "processing"),
        }
    }
}

/// Outcome of one scan poll
#[derive(Debug, Clone, PartialEq)]
pub enum ScanStep {
    /// Nothing decoded yet; still scanning
    Pending,
    /// A payload was decoded and parsed; session is back to idle
    Decoded(PresentationState),
    /// Decoded text was not JSON; error overlay is set
    Invalid,
    /// The scanner failed; error overlay is set
    Failed(String),
    /// Stopped from outside before anything was decoded
    Cancelled,
}

/// Result of a camera capture that went through detection
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedCapture {
    pub result: DetectionResult,
    pub presentation: PresentationState,
}

/// Client-visible message for a failed detection
pub fn detection_error_message(err: &DetectionError) -> String {
    match err.kind() {
        DetectionErrorKind::QuotaExceeded
        | DetectionErrorKind::Throttled
        | DetectionErrorKind::NoObjectsDetected => err.user_message(),
        _ => MSG_PROCESS_FAILED.to_string(),
    }
}

pub struct CaptureSession {
    media: Arc<dyn MediaDevices>,
    scanners: Arc<dyn ScannerFactory>,
    gateway: Arc<dyn DetectionGateway>,
    config: ScannerConfig,
    region: String,
    mode: CaptureMode,
    devices: Vec<VideoDevice>,
    selected_device_id: Option<String>,
    status: Option<String>,
    error: Option<String>,
}

impl CaptureSession {
    pub fn new(
        media: Arc<dyn MediaDevices>,
        scanners: Arc<dyn ScannerFactory>,
        gateway: Arc<dyn DetectionGateway>,
    ) -> Self {
        Self {
            media,
            scanners,
            gateway,
            config: ScannerConfig::default(),
            region: DEFAULT_SCAN_REGION.to_string(),
            mode: CaptureMode::Idle,
            devices: Vec::new(),
            selected_device_id: None,
            status: None,
            error: None,
        }
    }

    pub fn with_scanner_config(mut self, config: ScannerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    // ==================== Accessors ====================

    pub fn mode(&self) -> ModeKind {
        self.mode.kind()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn devices(&self) -> &[VideoDevice] {
        &self.devices
    }

    pub fn selected_device_id(&self) -> Option<&str> {
        self.selected_device_id.as_deref()
    }

    /// Whether a camera stream is currently held
    pub fn holds_stream(&self) -> bool {
        matches!(&self.mode, CaptureMode::CameraPreview { stream, .. } if stream.is_held())
    }

    /// Whether a scanner is currently held
    pub fn holds_scanner(&self) -> bool {
        matches!(&self.mode, CaptureMode::Scanning { scanner } if scanner.is_held())
    }

    // ==================== Internals ====================

    fn take_mode(&mut self) -> CaptureMode {
        std::mem::replace(&mut self.mode, CaptureMode::Idle)
    }

    fn require_idle(&self, action: &'static str) -> Result<(), CaptureError> {
        match self.mode.kind() {
            ModeKind::Idle => Ok(()),
            mode => Err(CaptureError::InvalidTransition { mode, action }),
        }
    }

    /// Surface `message` in the overlay, drop to idle, hand the error back
    fn fail(&mut self, message: impl Into<String>, err: CaptureError) -> CaptureError {
        let message = message.into();
        log::warn!("[capture] {} ({})", message, err);
        self.error = Some(message);
        self.mode = CaptureMode::Idle;
        err
    }

    // ==================== Scanning ====================

    /// `Idle -> Scanning`
    pub async fn start_scan(&mut self) -> Result<(), CaptureError> {
        self.require_idle("start scanning")?;
        self.error = None;

        let scanner = match self.scanners.create(&self.region) {
            Ok(scanner) => scanner,
            Err(e) => return Err(self.fail(MSG_CAMERA_UNAVAILABLE, e)),
        };
        let mut guard = ScannerGuard::new(scanner);

        let started = match guard.scanner_mut() {
            Some(scanner) => scanner.start(&self.config).await,
            None => Err(CaptureError::ScannerFailed("scanner released".to_string())),
        };
        if let Err(e) = started {
            guard.release().await;
            return Err(self.fail(MSG_CAMERA_UNAVAILABLE, e));
        }

        log::info!("[capture] Scanner started in region {}", self.region);
        self.mode = CaptureMode::Scanning { scanner: guard };
        Ok(())
    }

    /// Wait for one decode attempt while `Scanning`
    pub async fn poll_scan(&mut self) -> Result<ScanStep, CaptureError> {
        let event = match &mut self.mode {
            CaptureMode::Scanning { scanner } => match scanner.scanner_mut() {
                Some(scanner) => scanner.next_event().await,
                None => ScanEvent::Failure("scanner released".to_string()),
            },
            other => {
                return Err(CaptureError::InvalidTransition {
                    mode: other.kind(),
                    action: "poll the scanner",
                })
            }
        };

        match event {
            ScanEvent::NotFound => {
                self.status = Some(STATUS_NO_QR.to_string());
                Ok(ScanStep::Pending)
            }
            ScanEvent::Decoded(text) => {
                self.stop_scan().await;
                match decode_qr_payload(&text) {
                    Ok(payload) => {
                        log::info!("[capture] QR decoded ({} chars)", text.len());
                        self.status = Some(STATUS_QR_DECODED.to_string());
                        Ok(ScanStep::Decoded(present(payload)))
                    }
                    Err(e) => {
                        self.fail(MSG_INVALID_QR, CaptureError::InvalidPayload(e.to_string()));
                        Ok(ScanStep::Invalid)
                    }
                }
            }
            ScanEvent::Failure(msg) => {
                self.stop_scan().await;
                self.fail(MSG_CAMERA_UNAVAILABLE, CaptureError::ScannerFailed(msg.clone()));
                Ok(ScanStep::Failed(msg))
            }
        }
    }

    /// `Scanning -> Idle`. No-op in any other mode, so it is safe to repeat.
    pub async fn stop_scan(&mut self) {
        if !matches!(self.mode, CaptureMode::Scanning { .. }) {
            return;
        }
        if let CaptureMode::Scanning { mut scanner } = self.take_mode() {
            scanner.release().await;
            log::info!("[capture] Scanner stopped");
        }
    }

    // ==================== Camera ====================

    /// `Idle -> CameraPreview`; selects the first listed device
    pub async fn open_camera(&mut self) -> Result<(), CaptureError> {
        if matches!(self.mode, CaptureMode::CameraPreview { .. }) {
            return Ok(());
        }
        self.require_idle("open the camera")?;
        self.error = None;

        let stream = match self.media.open_stream(None).await {
            Ok(stream) => StreamGuard::new(stream),
            Err(e) => return Err(self.fail(MSG_CAMERA_UNAVAILABLE, e)),
        };

        // `stream` is released on drop if listing fails.
        let devices = match self.media.list_video_devices().await {
            Ok(devices) => devices,
            Err(e) => return Err(self.fail(MSG_CAMERA_UNAVAILABLE, e)),
        };

        let selected = devices
            .first()
            .map(|d| d.id.clone())
            .or_else(|| stream.stream().and_then(|s| s.device_id()));

        log::info!(
            "[capture] Camera open, {} devices, selected {:?}",
            devices.len(),
            selected
        );

        self.devices = devices;
        self.selected_device_id = selected.clone();
        self.mode = CaptureMode::CameraPreview {
            stream,
            device_id: selected,
        };
        Ok(())
    }

    /// `CameraPreview -> CameraPreview` on another device
    pub async fn switch_device(&mut self, device_id: &str) -> Result<(), CaptureError> {
        let current = match &self.mode {
            CaptureMode::CameraPreview { device_id, .. } => device_id.clone(),
            other => {
                return Err(CaptureError::InvalidTransition {
                    mode: other.kind(),
                    action: "switch cameras",
                })
            }
        };
        if current.as_deref() == Some(device_id) {
            return Ok(());
        }

        if self.media.allows_overlapping_streams() {
            // New stream first; on failure the old one stays live.
            let opened = self.media.open_stream(Some(device_id)).await;
            let new_stream = match opened {
                Ok(stream) => StreamGuard::new(stream),
                Err(e) => {
                    log::warn!("[capture] Switch to {} failed: {}", device_id, e);
                    self.error = Some(MSG_CAMERA_UNAVAILABLE.to_string());
                    return Err(e);
                }
            };
            if let CaptureMode::CameraPreview { mut stream, .. } = self.take_mode() {
                stream.release();
            }
            self.mode = CaptureMode::CameraPreview {
                stream: new_stream,
                device_id: Some(device_id.to_string()),
            };
        } else {
            if let CaptureMode::CameraPreview { mut stream, .. } = self.take_mode() {
                stream.release();
            }
            let opened = self.media.open_stream(Some(device_id)).await;
            match opened {
                Ok(stream) => {
                    self.mode = CaptureMode::CameraPreview {
                        stream: StreamGuard::new(stream),
                        device_id: Some(device_id.to_string()),
                    };
                }
                Err(e) => return Err(self.fail(MSG_CAMERA_UNAVAILABLE, e)),
            }
        }

        log::info!("[capture] Switched camera to {}", device_id);
        self.selected_device_id = Some(device_id.to_string());
        Ok(())
    }

    /// `CameraPreview -> Idle`. No-op in any other mode.
    pub fn stop_camera(&mut self) {
        if !matches!(self.mode, CaptureMode::CameraPreview { .. }) {
            return;
        }
        if let CaptureMode::CameraPreview { mut stream, .. } = self.take_mode() {
            stream.release();
            log::info!("[capture] Camera stopped");
        }
    }

    /// `CameraPreview -> Processing -> Idle`.
    ///
    /// The stream is released as soon as the frame is read; detection runs
    /// with no camera held.
    pub async fn capture(&mut self) -> Result<ProcessedCapture, CaptureError> {
        self.error = None;
        if !matches!(self.mode, CaptureMode::CameraPreview { .. }) {
            return Err(CaptureError::InvalidTransition {
                mode: self.mode.kind(),
                action: "capture a frame",
            });
        }
        let CaptureMode::CameraPreview {
            mut stream,
            device_id,
        } = self.take_mode()
        else {
            return Err(CaptureError::InvalidTransition {
                mode: ModeKind::Idle,
                action: "capture a frame",
            });
        };

        let frame = match stream.stream() {
            Some(s) => s.capture_frame().await,
            None => Err(CaptureError::CameraUnavailable("stream released".to_string())),
        };
        stream.release();

        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => return Err(self.fail(MSG_PROCESS_FAILED, e)),
        };
        let png = match encode_png(&frame) {
            Ok(png) => png,
            Err(e) => return Err(self.fail(MSG_PROCESS_FAILED, e)),
        };

        self.mode = CaptureMode::Processing { device_id };
        self.status = Some(STATUS_PROCESSING.to_string());
        log::info!(
            "[capture] Frame {}x{} encoded to {} bytes",
            frame.width,
            frame.height,
            png.len()
        );

        let outcome = self.gateway.detect(&png).await;
        self.mode = CaptureMode::Idle;

        match outcome {
            Ok(result) => {
                self.status = Some(STATUS_PROCESSED.to_string());
                let presentation = present_text(&result.raw_nutrition_text);
                Ok(ProcessedCapture {
                    result,
                    presentation,
                })
            }
            Err(e) => {
                let message = detection_error_message(&e);
                Err(self.fail(message, CaptureError::Detection(e)))
            }
        }
    }

    // ==================== Teardown ====================

    /// Any mode `-> Idle`, releasing whatever is held
    pub async fn teardown(&mut self) {
        match self.take_mode() {
            CaptureMode::Scanning { mut scanner } => scanner.release().await,
            CaptureMode::CameraPreview { mut stream, .. } => stream.release(),
            CaptureMode::Idle | CaptureMode::Processing { .. } => {}
        }
        log::debug!("[capture] Session torn down");
    }
}
