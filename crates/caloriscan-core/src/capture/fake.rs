//! In-memory camera and scanner hardware for tests
//!
//! Every fake handle reports to a shared [`HardwareProbe`], so tests can
//! assert how many handles are live (and the most that ever were).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::devices::{
    Frame, MediaDevices, MediaStream, QrScanner, ScanEvent, ScannerConfig, ScannerFactory,
    VideoDevice,
};
use super::CaptureError;

#[derive(Debug, Default)]
pub struct HardwareProbe {
    streams: AtomicUsize,
    peak_streams: AtomicUsize,
    scanners: AtomicUsize,
    opened: AtomicUsize,
}

impl HardwareProbe {
    pub fn active_streams(&self) -> usize {
        self.streams.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously open streams seen
    pub fn peak_streams(&self) -> usize {
        self.peak_streams.load(Ordering::SeqCst)
    }

    pub fn active_scanners(&self) -> usize {
        self.scanners.load(Ordering::SeqCst)
    }

    pub fn streams_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Camera streams plus running scanners
    pub fn active_handles(&self) -> usize {
        self.active_streams() + self.active_scanners()
    }

    fn stream_opened(&self) {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let now = self.streams.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_streams.fetch_max(now, Ordering::SeqCst);
    }
}

// ============================================================================
// Camera
// ============================================================================

pub struct FakeMediaDevices {
    probe: Arc<HardwareProbe>,
    devices: Vec<VideoDevice>,
    overlapping: bool,
    deny: bool,
}

impl FakeMediaDevices {
    /// Two cameras, `front` and `back`
    pub fn new(probe: Arc<HardwareProbe>) -> Self {
        Self {
            probe,
            devices: vec![
                VideoDevice::new("front", "Front Camera"),
                VideoDevice::new("back", ""),
            ],
            overlapping: false,
            deny: false,
        }
    }

    pub fn with_devices(mut self, devices: Vec<VideoDevice>) -> Self {
        self.devices = devices;
        self
    }

    pub fn overlapping(mut self, allowed: bool) -> Self {
        self.overlapping = allowed;
        self
    }

    /// Every open fails as if permission were denied
    pub fn denied(mut self) -> Self {
        self.deny = true;
        self
    }
}

#[async_trait]
impl MediaDevices for FakeMediaDevices {
    async fn open_stream(
        &self,
        device_id: Option<&str>,
    ) -> Result<Box<dyn MediaStream>, CaptureError> {
        if self.deny {
            return Err(CaptureError::CameraUnavailable("permission denied".to_string()));
        }
        let id = match device_id {
            Some(id) => self
                .devices
                .iter()
                .find(|d| d.id == id)
                .map(|d| d.id.clone())
                .ok_or_else(|| CaptureError::CameraUnavailable(format!("no device {}", id)))?,
            None => self
                .devices
                .first()
                .map(|d| d.id.clone())
                .ok_or(CaptureError::NoDevices)?,
        };

        self.probe.stream_opened();
        Ok(Box::new(FakeStream {
            probe: self.probe.clone(),
            device_id: id,
            active: AtomicBool::new(true),
        }))
    }

    async fn list_video_devices(&self) -> Result<Vec<VideoDevice>, CaptureError> {
        Ok(self.devices.clone())
    }

    fn allows_overlapping_streams(&self) -> bool {
        self.overlapping
    }
}

struct FakeStream {
    probe: Arc<HardwareProbe>,
    device_id: String,
    active: AtomicBool,
}

#[async_trait]
impl MediaStream for FakeStream {
    async fn capture_frame(&self) -> Result<Frame, CaptureError> {
        if !self.active.load(Ordering::SeqCst) {
            return Err(CaptureError::CameraUnavailable("stream stopped".to_string()));
        }
        Ok(Frame {
            width: 2,
            height: 2,
            rgba: vec![255; 16],
        })
    }

    fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.probe.streams.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn device_id(&self) -> Option<String> {
        Some(self.device_id.clone())
    }
}

// ============================================================================
// Scanner
// ============================================================================

/// Each scanner it creates replays `events`, then waits forever
pub struct FakeScannerFactory {
    probe: Arc<HardwareProbe>,
    events: Vec<ScanEvent>,
    fail_start: bool,
    start_delay: Option<Duration>,
}

impl FakeScannerFactory {
    pub fn new(probe: Arc<HardwareProbe>, events: Vec<ScanEvent>) -> Self {
        Self {
            probe,
            events,
            fail_start: false,
            start_delay: None,
        }
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Claim the hardware, then take `delay` to finish starting
    pub fn slow_start(mut self, delay: Duration) -> Self {
        self.start_delay = Some(delay);
        self
    }
}

impl ScannerFactory for FakeScannerFactory {
    fn create(&self, _region: &str) -> Result<Box<dyn QrScanner>, CaptureError> {
        Ok(Box::new(FakeScanner {
            probe: self.probe.clone(),
            events: self.events.iter().cloned().collect(),
            running: false,
            fail_start: self.fail_start,
            start_delay: self.start_delay,
        }))
    }
}

struct FakeScanner {
    probe: Arc<HardwareProbe>,
    events: VecDeque<ScanEvent>,
    running: bool,
    fail_start: bool,
    start_delay: Option<Duration>,
}

impl FakeScanner {
    fn halt(&mut self) {
        if self.running {
            self.running = false;
            self.probe.scanners.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl QrScanner for FakeScanner {
    async fn start(&mut self, _config: &ScannerConfig) -> Result<(), CaptureError> {
        if self.fail_start {
            return Err(CaptureError::ScannerFailed("camera busy".to_string()));
        }
        if !self.running {
            self.running = true;
            self.probe.scanners.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(delay) = self.start_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn next_event(&mut self) -> ScanEvent {
        match self.events.pop_front() {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        self.halt();
        Ok(())
    }

    fn abort(&mut self) {
        self.halt();
    }
}
