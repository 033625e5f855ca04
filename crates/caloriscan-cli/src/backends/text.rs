//! A QR "scanner" that reads already-decoded payloads, one per line
//!
//! Blank lines stand for frames with no readable code. When the input runs
//! out the scanner reports a failure, since nothing else will arrive.

use std::collections::VecDeque;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use caloriscan_core::capture::{CaptureError, QrScanner, ScanEvent, ScannerConfig, ScannerFactory};

pub const END_OF_INPUT: &str = "No QR Code detected.";

/// Read a whole text source; `-` is stdin
pub fn read_source(source: &str) -> Result<String> {
    if source == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        return Ok(text);
    }
    let path = shellexpand::tilde(source).into_owned();
    std::fs::read_to_string(Path::new(&path)).with_context(|| format!("Failed to read {}", path))
}

/// Factory: every scanner it creates replays the same lines
pub struct TextScanner {
    lines: Arc<Vec<String>>,
}

impl TextScanner {
    pub fn new(text: &str) -> Self {
        Self {
            lines: Arc::new(text.lines().map(str::to_string).collect()),
        }
    }
}

impl ScannerFactory for TextScanner {
    fn create(&self, region: &str) -> Result<Box<dyn QrScanner>, CaptureError> {
        log::debug!("[scanner] {} line(s) queued for region {}", self.lines.len(), region);
        Ok(Box::new(LineScanner {
            lines: self.lines.iter().cloned().collect(),
            running: false,
        }))
    }
}

struct LineScanner {
    lines: VecDeque<String>,
    running: bool,
}

#[async_trait]
impl QrScanner for LineScanner {
    async fn start(&mut self, config: &ScannerConfig) -> Result<(), CaptureError> {
        log::debug!("[scanner] Started at {} fps, {}px box", config.fps, config.qrbox);
        self.running = true;
        Ok(())
    }

    async fn next_event(&mut self) -> ScanEvent {
        if !self.running {
            return ScanEvent::Failure("scanner not running".to_string());
        }
        match self.lines.pop_front() {
            Some(line) if line.trim().is_empty() => ScanEvent::NotFound,
            Some(line) => ScanEvent::Decoded(line),
            None => ScanEvent::Failure(END_OF_INPUT.to_string()),
        }
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        self.running = false;
        Ok(())
    }

    fn abort(&mut self) {
        self.running = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lines_become_events() {
        let factory = TextScanner::new("\n  \n{\"object\":\"Tea\"}\n");
        let mut scanner = factory.create("reader").unwrap();
        scanner.start(&ScannerConfig::default()).await.unwrap();

        assert_eq!(scanner.next_event().await, ScanEvent::NotFound);
        assert_eq!(scanner.next_event().await, ScanEvent::NotFound);
        assert_eq!(
            scanner.next_event().await,
            ScanEvent::Decoded("{\"object\":\"Tea\"}".to_string())
        );
        assert_eq!(
            scanner.next_event().await,
            ScanEvent::Failure(END_OF_INPUT.to_string())
        );
    }

    #[tokio::test]
    async fn test_each_scanner_replays_from_start() {
        let factory = TextScanner::new("a");
        for _ in 0..2 {
            let mut scanner = factory.create("reader").unwrap();
            scanner.start(&ScannerConfig::default()).await.unwrap();
            assert_eq!(scanner.next_event().await, ScanEvent::Decoded("a".to_string()));
        }
    }

    #[tokio::test]
    async fn test_stopped_scanner_reports_failure() {
        let factory = TextScanner::new("a");
        let mut scanner = factory.create("reader").unwrap();
        scanner.start(&ScannerConfig::default()).await.unwrap();
        scanner.stop().await.unwrap();
        scanner.stop().await.unwrap();
        assert!(matches!(scanner.next_event().await, ScanEvent::Failure(_)));
    }
}
