//! Hardware that is not there: for commands that only need one of
//! camera or scanner

use async_trait::async_trait;

use caloriscan_core::capture::{
    CaptureError, MediaDevices, MediaStream, QrScanner, ScannerFactory, VideoDevice,
};

pub struct Unplugged;

#[async_trait]
impl MediaDevices for Unplugged {
    async fn open_stream(
        &self,
        _device_id: Option<&str>,
    ) -> Result<Box<dyn MediaStream>, CaptureError> {
        Err(CaptureError::NoDevices)
    }

    async fn list_video_devices(&self) -> Result<Vec<VideoDevice>, CaptureError> {
        Ok(Vec::new())
    }
}

impl ScannerFactory for Unplugged {
    fn create(&self, _region: &str) -> Result<Box<dyn QrScanner>, CaptureError> {
        Err(CaptureError::ScannerFailed("no scanner attached".to_string()))
    }
}
