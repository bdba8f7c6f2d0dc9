//! Camera access.
//!
//! This module provides:
//! - The `Frame` type consumed by recognition
//! - `Camera` / `FrameSource` traits the scanner depends on
//! - A directory replay camera for bench work without hardware
//! - A shared camera service that serializes preview and scan access

pub mod directory;
pub mod shared;

pub use directory::DirectoryCamera;
pub use shared::SharedCamera;

use image::RgbImage;

use crate::scan::ScanError;

/// One RGB video frame, origin top-left.
pub type Frame = RgbImage;

/// An open camera handle. Dropping it releases the device.
pub trait FrameSource: Send {
    /// Reads the next frame. `FrameDropped` and `FrameTimeout` are
    /// recoverable; the caller may simply try again.
    fn read_frame(&mut self) -> Result<Frame, ScanError>;

    /// Explicit release hook for devices that need more than `Drop`.
    fn close(&mut self) {}
}

/// A camera that can be opened for a scan.
pub trait Camera: Send + Sync {
    fn open(&self) -> Result<Box<dyn FrameSource>, ScanError>;
}
