//! Scoped ownership of hardware handles
//!
//! A guard releases its handle exactly once: on explicit `release`, or on
//! `Drop` if nothing released it first. Releasing twice is a no-op.

use super::devices::{MediaStream, QrScanner};

pub struct StreamGuard {
    stream: Option<Box<dyn MediaStream>>,
}

impl StreamGuard {
    pub fn new(stream: Box<dyn MediaStream>) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    pub fn stream(&self) -> Option<&dyn MediaStream> {
        self.stream.as_deref()
    }

    pub fn is_held(&self) -> bool {
        self.stream.is_some()
    }

    pub fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            log::debug!("[capture] Releasing camera stream {:?}", stream.device_id());
            stream.stop();
        }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        if self.stream.is_some() {
            log::debug!("[capture] Stream guard dropped while held, releasing");
            self.release();
        }
    }
}

pub struct ScannerGuard {
    scanner: Option<Box<dyn QrScanner>>,
}

impl ScannerGuard {
    pub fn new(scanner: Box<dyn QrScanner>) -> Self {
        Self {
            scanner: Some(scanner),
        }
    }

    pub fn scanner_mut(&mut self) -> Option<&mut (dyn QrScanner + 'static)> {
        self.scanner.as_deref_mut()
    }

    pub fn is_held(&self) -> bool {
        self.scanner.is_some()
    }

    /// Graceful stop, falling back to abort if the scanner refuses
    pub async fn release(&mut self) {
        if let Some(mut scanner) = self.scanner.take() {
            if let Err(e) = scanner.stop().await {
                log::warn!("[capture] Scanner stop failed, aborting: {}", e);
                scanner.abort();
            }
        }
    }
}

impl Drop for ScannerGuard {
    fn drop(&mut self) {
        if let Some(mut scanner) = self.scanner.take() {
            log::debug!("[capture] Scanner guard dropped while held, aborting");
            scanner.abort();
        }
    }
}
