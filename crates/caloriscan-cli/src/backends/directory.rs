//! A "camera" whose devices are the image files in a directory

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use caloriscan_core::capture::{
    frame_from_image, CaptureError, Frame, MediaDevices, MediaStream, VideoDevice,
};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

pub struct DirectoryCamera {
    dir: PathBuf,
}

impl DirectoryCamera {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Image files, sorted by name
    fn frames(&self) -> Result<Vec<PathBuf>, CaptureError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            CaptureError::CameraUnavailable(format!("{}: {}", self.dir.display(), e))
        })?;

        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image(path))
            .collect();
        frames.sort();
        Ok(frames)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn device_id(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[async_trait]
impl MediaDevices for DirectoryCamera {
    async fn open_stream(
        &self,
        device_id: Option<&str>,
    ) -> Result<Box<dyn MediaStream>, CaptureError> {
        let frames = self.frames()?;
        let path = match device_id {
            Some(id) => frames
                .into_iter()
                .find(|p| self::device_id(p) == id)
                .ok_or_else(|| CaptureError::CameraUnavailable(format!("no device {}", id)))?,
            None => frames.into_iter().next().ok_or(CaptureError::NoDevices)?,
        };

        log::debug!("[camera] Opened {}", path.display());
        Ok(Box::new(FileStream {
            path,
            active: AtomicBool::new(true),
        }))
    }

    async fn list_video_devices(&self) -> Result<Vec<VideoDevice>, CaptureError> {
        Ok(self
            .frames()?
            .iter()
            .map(|path| {
                let label = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                VideoDevice::new(device_id(path), label)
            })
            .collect())
    }

    /// Files can be read by any number of streams
    fn allows_overlapping_streams(&self) -> bool {
        true
    }
}

struct FileStream {
    path: PathBuf,
    active: AtomicBool,
}

#[async_trait]
impl MediaStream for FileStream {
    async fn capture_frame(&self) -> Result<Frame, CaptureError> {
        if !self.active.load(Ordering::SeqCst) {
            return Err(CaptureError::CameraUnavailable("stream stopped".to_string()));
        }
        let path = self.path.clone();
        let img = tokio::task::spawn_blocking(move || image::open(path))
            .await
            .map_err(|e| CaptureError::CameraUnavailable(e.to_string()))??;
        Ok(frame_from_image(img))
    }

    fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            log::debug!("[camera] Released {}", self.path.display());
        }
    }

    fn device_id(&self) -> Option<String> {
        Some(device_id(&self.path))
    }
}
