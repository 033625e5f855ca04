//! Capture hardware for a terminal
//!
//! The capture state machine only sees the traits in
//! `caloriscan_core::capture`; these backends stand in for the browser's
//! camera and QR scanner.

mod directory;
mod text;
mod unplugged;

pub use directory::DirectoryCamera;
pub use text::{read_source, TextScanner};
pub use unplugged::Unplugged;
