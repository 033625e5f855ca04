//! Serialised access to a capture session
//!
//! Every transition takes the session lock, so no two hardware-acquiring
//! operations overlap. A scan (start or poll) can be interrupted from
//! outside through the scan cancellation token; `stop_scan` cancels first
//! and then waits for the lock, so it never races a pending start.

use std::sync::Mutex as StdMutex;

use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use super::session::{CaptureSession, ModeKind, ProcessedCapture, ScanStep};
use super::CaptureError;

pub struct CaptureController {
    session: Mutex<CaptureSession>,
    scan_cancel: StdMutex<CancellationToken>,
}

impl CaptureController {
    pub fn new(session: CaptureSession) -> Self {
        Self {
            session: Mutex::new(session),
            scan_cancel: StdMutex::new(CancellationToken::new()),
        }
    }

    /// Direct access for reads (mode, status, error overlay)
    pub async fn session(&self) -> MutexGuard<'_, CaptureSession> {
        self.session.lock().await
    }

    pub async fn mode(&self) -> ModeKind {
        self.session.lock().await.mode()
    }

    fn fresh_scan_token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Ok(mut current) = self.scan_cancel.lock() {
            *current = token.clone();
        }
        token
    }

    fn scan_token(&self) -> CancellationToken {
        self.scan_cancel
            .lock()
            .map(|t| t.clone())
            .unwrap_or_else(|_| {
                let token = CancellationToken::new();
                token.cancel();
                token
            })
    }

    fn cancel_scan(&self) {
        if let Ok(token) = self.scan_cancel.lock() {
            token.cancel();
        }
    }

    pub async fn start_scan(&self) -> Result<(), CaptureError> {
        let token = self.fresh_scan_token();
        let mut session = self.session.lock().await;

        let started = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = session.start_scan() => Some(result),
        };

        match started {
            Some(result) => result,
            None => {
                log::info!("[capture] Scan start cancelled");
                session.stop_scan().await;
                Err(CaptureError::Cancelled)
            }
        }
    }

    /// One decode attempt; releases the lock before returning
    pub async fn next_scan(&self) -> Result<ScanStep, CaptureError> {
        let token = self.scan_token();
        let mut session = self.session.lock().await;

        let step = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            step = session.poll_scan() => Some(step),
        };

        match step {
            Some(step) => step,
            None => {
                session.stop_scan().await;
                Ok(ScanStep::Cancelled)
            }
        }
    }

    /// Poll until something other than "not found" happens
    pub async fn scan_until_done(&self) -> Result<ScanStep, CaptureError> {
        loop {
            match self.next_scan().await? {
                ScanStep::Pending => continue,
                step => return Ok(step),
            }
        }
    }

    /// Idempotent; safe before a pending start has resolved
    pub async fn stop_scan(&self) {
        self.cancel_scan();
        self.session.lock().await.stop_scan().await;
    }

    pub async fn open_camera(&self) -> Result<(), CaptureError> {
        self.session.lock().await.open_camera().await
    }

    pub async fn switch_device(&self, device_id: &str) -> Result<(), CaptureError> {
        self.session.lock().await.switch_device(device_id).await
    }

    pub async fn capture(&self) -> Result<ProcessedCapture, CaptureError> {
        self.session.lock().await.capture().await
    }

    pub async fn stop_camera(&self) {
        self.session.lock().await.stop_camera();
    }

    /// Release everything regardless of mode
    pub async fn shutdown(&self) {
        self.cancel_scan();
        self.session.lock().await.teardown().await;
    }
}
