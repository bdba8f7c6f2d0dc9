//! Replays still images from a directory as a camera feed.
//!
//! Files are served in name order and the sequence loops, so a handful of
//! photos of the display is enough to drive a full scan on the bench.

use std::fs;
use std::path::{Path, PathBuf};

use super::{Camera, Frame, FrameSource};
use crate::scan::ScanError;

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

pub struct DirectoryCamera {
    dir: PathBuf,
}

impl DirectoryCamera {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn list_frames(&self) -> Result<Vec<PathBuf>, ScanError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            ScanError::CameraUnavailable(format!("{}: {}", self.dir.display(), e))
        })?;

        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| is_frame_file(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(ScanError::CameraUnavailable(format!(
                "no frames in {}",
                self.dir.display()
            )));
        }
        Ok(files)
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

impl Camera for DirectoryCamera {
    fn open(&self) -> Result<Box<dyn FrameSource>, ScanError> {
        let files = self.list_frames()?;
        crate::log(&format!(
            "Replay camera opened: {} frames from {}",
            files.len(),
            self.dir.display()
        ));
        Ok(Box::new(DirectoryFrames { files, next: 0 }))
    }
}

struct DirectoryFrames {
    files: Vec<PathBuf>,
    next: usize,
}

impl FrameSource for DirectoryFrames {
    fn read_frame(&mut self) -> Result<Frame, ScanError> {
        let path = &self.files[self.next];
        self.next = (self.next + 1) % self.files.len();

        match image::open(path) {
            Ok(img) => Ok(img.to_rgb8()),
            Err(e) => {
                crate::log(&format!("Replay camera: failed to decode {}: {}", path.display(), e));
                Err(ScanError::FrameDropped)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use tempfile::tempdir;

    #[test]
    fn test_missing_directory_is_unavailable() {
        let dir = tempdir().unwrap();
        let camera = DirectoryCamera::new(dir.path().join("nope"));
        assert!(matches!(camera.open(), Err(ScanError::CameraUnavailable(_))));
    }

    #[test]
    fn test_empty_directory_is_unavailable() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();
        let camera = DirectoryCamera::new(dir.path());
        assert!(matches!(camera.open(), Err(ScanError::CameraUnavailable(_))));
    }

    #[test]
    fn test_frames_replay_in_order_and_loop() {
        let dir = tempdir().unwrap();
        for (name, shade) in [("b.png", 200u8), ("a.png", 100u8)] {
            let img: Frame = ImageBuffer::from_pixel(4, 3, Rgb([shade, shade, shade]));
            img.save(dir.path().join(name)).unwrap();
        }

        let camera = DirectoryCamera::new(dir.path());
        let mut source = camera.open().unwrap();
        let shades: Vec<u8> = (0..3)
            .map(|_| source.read_frame().unwrap().get_pixel(0, 0)[0])
            .collect();
        assert_eq!(shades, vec![100, 200, 100]);
    }

    #[test]
    fn test_corrupt_file_is_dropped_frame() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("broken.png"), b"not really a png").unwrap();

        let camera = DirectoryCamera::new(dir.path());
        let mut source = camera.open().unwrap();
        assert_eq!(source.read_frame().unwrap_err(), ScanError::FrameDropped);
    }
}
