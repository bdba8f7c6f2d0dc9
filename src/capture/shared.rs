//! Single-owner camera service.
//!
//! One thread owns the device handle. It answers frame requests from scan
//! clients first and, while idle, keeps a "latest frame" slot fresh for live
//! preview. All device access goes through this thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::{Camera, Frame, FrameSource};
use crate::scan::ScanError;

type FrameReply = Sender<Result<Frame, ScanError>>;

pub struct SharedCamera {
    requests: Option<Sender<FrameReply>>,
    latest: Arc<Mutex<Option<Frame>>>,
    alive: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    frame_timeout: Duration,
    handle: Option<JoinHandle<()>>,
}

impl SharedCamera {
    /// Opens `device` and spawns the owner thread.
    ///
    /// Fails with `CameraUnavailable` when the device cannot be opened.
    pub fn start(
        device: &dyn Camera,
        preview_interval: Duration,
        frame_timeout: Duration,
    ) -> Result<Self, ScanError> {
        let source = device.open()?;

        let (requests, receiver) = channel::<FrameReply>();
        let latest = Arc::new(Mutex::new(None));
        let alive = Arc::new(AtomicBool::new(true));
        let shutdown = Arc::new(AtomicBool::new(false));

        let latest_clone = Arc::clone(&latest);
        let alive_clone = Arc::clone(&alive);
        let shutdown_clone = Arc::clone(&shutdown);
        let handle = thread::spawn(move || {
            // Cleared on unwind as well as on normal exit
            let _alive = AliveFlag(alive_clone);
            run_owner_loop(source, receiver, latest_clone, shutdown_clone, preview_interval);
        });

        crate::log("Camera service started");
        Ok(Self {
            requests: Some(requests),
            latest,
            alive,
            shutdown,
            frame_timeout,
            handle: Some(handle),
        })
    }

    /// Most recent frame seen by the service, for live preview.
    pub fn latest_frame(&self) -> Option<Frame> {
        self.latest.lock().ok().and_then(|f| f.clone())
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// Marks the service dead when the owner thread ends for any reason.
struct AliveFlag(Arc<AtomicBool>);

impl Drop for AliveFlag {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Drop for SharedCamera {
    fn drop(&mut self) {
        // Outstanding clients keep the channel open, so signal explicitly
        self.shutdown.store(true, Ordering::SeqCst);
        drop(self.requests.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                crate::log("Camera service thread panicked");
            }
        }
    }
}

impl Camera for SharedCamera {
    fn open(&self) -> Result<Box<dyn FrameSource>, ScanError> {
        match &self.requests {
            Some(requests) if self.is_alive() => Ok(Box::new(SharedFrames {
                requests: requests.clone(),
                timeout: self.frame_timeout,
            })),
            _ => Err(ScanError::CameraUnavailable(
                "camera service is not running".to_string(),
            )),
        }
    }
}

/// Client handle: each read is a request to the owner thread.
struct SharedFrames {
    requests: Sender<FrameReply>,
    timeout: Duration,
}

impl FrameSource for SharedFrames {
    fn read_frame(&mut self) -> Result<Frame, ScanError> {
        let (reply, response) = channel();
        self.requests.send(reply).map_err(|_| {
            ScanError::CameraUnavailable("camera service stopped".to_string())
        })?;

        match response.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(ScanError::FrameTimeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(ScanError::FrameDropped),
        }
    }
}

fn run_owner_loop(
    mut source: Box<dyn FrameSource>,
    receiver: Receiver<FrameReply>,
    latest: Arc<Mutex<Option<Frame>>>,
    shutdown: Arc<AtomicBool>,
    preview_interval: Duration,
) {
    let store = |frame: &Frame| {
        if let Ok(mut slot) = latest.lock() {
            *slot = Some(frame.clone());
        }
    };

    while !shutdown.load(Ordering::SeqCst) {
        match receiver.recv_timeout(preview_interval) {
            Ok(reply) => {
                let result = source.read_frame();
                if let Ok(frame) = &result {
                    store(frame);
                }
                // The client may have timed out and gone away
                let _ = reply.send(result);
            }
            Err(RecvTimeoutError::Timeout) => {
                if let Ok(frame) = source.read_frame() {
                    store(&frame);
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    source.close();
    crate::log("Camera service stopped, device released");
}
