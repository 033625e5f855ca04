//! CLI commands module
//!
//! Contains all CLI command implementations.

pub mod capture;
pub mod detect;
pub mod encode;
pub mod scan;
pub mod show;
pub mod status;

use std::sync::Arc;

use caloriscan_core::capture::{CaptureController, CaptureSession, MediaDevices, ScannerFactory};
use caloriscan_core::HttpDetectionClient;

use crate::output::OutputFormat;

/// Shared context for all commands
pub struct Context {
    pub client: HttpDetectionClient,
    pub format: OutputFormat,
    pub quiet: bool,
}

impl Context {
    /// Progress lines are only for interactive table output
    pub fn chatty(&self) -> bool {
        self.format.allows_chatter(self.quiet)
    }

    /// A capture controller whose detections go to the configured server
    pub fn controller(
        &self,
        media: Arc<dyn MediaDevices>,
        scanners: Arc<dyn ScannerFactory>,
    ) -> CaptureController {
        CaptureController::new(CaptureSession::new(
            media,
            scanners,
            Arc::new(self.client.clone()),
        ))
    }
}

/// Expand `~` in a user-supplied path
pub fn expand_path(path: &str) -> std::path::PathBuf {
    std::path::PathBuf::from(shellexpand::tilde(path).into_owned())
}
