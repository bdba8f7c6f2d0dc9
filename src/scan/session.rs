//! Scan session lifecycle.
//!
//! A session owns the grid, the latest reading and the running flag. At most
//! one scan runs per session; a second `start` is rejected, never queued.
//! Scans run either on a background thread (`start`) or on the caller's
//! thread (`run`). Both paths share the same gate and cleanup.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::error::ScanError;
use super::grid::ScanGrid;
use super::scanner::{GridScanner, LatestReading, ScanOutcome, ScanPlan, ScannerState};
use crate::actuator::ServoRig;
use crate::capture::{Camera, FrameSource};
use crate::recognition::Calibration;

/// Session lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
}

/// Per-scan parameters chosen by the caller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScanRequest {
    pub width: usize,
    pub height: usize,
    pub cell_delay: Duration,
}

/// Session-wide acquisition settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScanOptions {
    pub settle_delay: Duration,
    pub frame_retries: u32,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::ZERO,
            frame_retries: 0,
        }
    }
}

/// Owner of one scanner, its grid and its camera.
///
/// The running gate is per session, so process-wide exclusivity holds only
/// while the process creates a single session. The binary creates exactly
/// one; tests build several independent ones.
pub struct ScanSession {
    camera: Arc<dyn Camera>,
    rig: Arc<Mutex<ServoRig>>,
    calibration: Arc<Calibration>,
    options: ScanOptions,
    running: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    grid: RwLock<Arc<ScanGrid>>,
    latest: Arc<Mutex<Option<LatestReading>>>,
    worker: Mutex<Option<JoinHandle<ScanOutcome>>>,
}

impl ScanSession {
    pub fn new(
        camera: Arc<dyn Camera>,
        rig: ServoRig,
        calibration: Calibration,
        options: ScanOptions,
    ) -> Self {
        Self {
            camera,
            rig: Arc::new(Mutex::new(rig)),
            calibration: Arc::new(calibration),
            options,
            running: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(AtomicBool::new(false)),
            grid: RwLock::new(Arc::new(ScanGrid::new(0, 0))),
            latest: Arc::new(Mutex::new(None)),
            worker: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        if self.is_running() {
            SessionState::Running
        } else {
            SessionState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Asks the running scan to stop before its next cell.
    pub fn stop(&self) {
        if self.is_running() {
            crate::log("Scan stop requested");
            self.stop.store(true, Ordering::SeqCst);
        }
    }

    /// The grid of the current or most recent scan.
    pub fn grid(&self) -> Arc<ScanGrid> {
        Arc::clone(&self.grid.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn latest_reading(&self) -> Option<LatestReading> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Starts a scan on a background thread and returns immediately.
    ///
    /// # Errors
    /// - `InvalidGrid` for a zero-sized grid
    /// - `AlreadyRunning` if a scan is active (nothing is changed)
    /// - `CameraUnavailable` if the camera cannot be opened (session stays idle)
    pub fn start(&self, request: ScanRequest) -> Result<(), ScanError> {
        let (scanner, source) = self.begin(request)?;

        // Reap the previous worker, which has already finished
        let previous = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = previous {
            let _ = handle.join();
        }

        let rig = Arc::clone(&self.rig);
        let running = Arc::clone(&self.running);
        let handle = thread::spawn(move || execute(scanner, source, &rig, &running));
        *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    /// Runs a scan to completion on the calling thread.
    pub fn run(&self, request: ScanRequest) -> Result<ScanOutcome, ScanError> {
        let (scanner, source) = self.begin(request)?;
        Ok(execute(scanner, source, &self.rig, &self.running))
    }

    /// Blocks until the background scan finishes, returning its outcome.
    pub fn wait(&self) -> Option<ScanOutcome> {
        let handle = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take()?;
        match handle.join() {
            Ok(outcome) => Some(outcome),
            Err(_) => {
                crate::log("Scan thread panicked");
                None
            }
        }
    }

    /// Claims the running flag, opens the camera and prepares the grid.
    fn begin(&self, request: ScanRequest) -> Result<(GridScanner, Box<dyn FrameSource>), ScanError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ScanError::AlreadyRunning);
        }

        if request.width == 0 || request.height == 0 {
            self.running.store(false, Ordering::SeqCst);
            return Err(ScanError::InvalidGrid {
                width: request.width,
                height: request.height,
            });
        }
        self.stop.store(false, Ordering::SeqCst);

        let source = match self.camera.open() {
            Ok(source) => source,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                crate::log(&format!("Scan not started: {}", e));
                return Err(match e {
                    ScanError::CameraUnavailable(_) => e,
                    other => ScanError::CameraUnavailable(other.to_string()),
                });
            }
        };

        let grid = {
            let mut slot = self.grid.write().unwrap_or_else(PoisonError::into_inner);
            if slot.width() != request.width || slot.height() != request.height {
                *slot = Arc::new(ScanGrid::new(request.width, request.height));
            }
            Arc::clone(&slot)
        };

        let plan = ScanPlan {
            width: request.width,
            height: request.height,
            cell_delay: request.cell_delay,
            settle_delay: self.options.settle_delay,
            frame_retries: self.options.frame_retries,
        };
        let scanner = GridScanner::new(
            plan,
            Arc::clone(&self.calibration),
            grid,
            Arc::clone(&self.latest),
            Arc::clone(&self.stop),
        );
        Ok((scanner, source))
    }
}

/// Clears the running flag when dropped, including during unwinding.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs the scan loop, then releases the camera, homes the rig and clears
/// the running flag on every exit path. A panic inside the loop aborts the
/// scan instead of escaping.
fn execute(
    mut scanner: GridScanner,
    mut source: Box<dyn FrameSource>,
    rig: &Mutex<ServoRig>,
    running: &AtomicBool,
) -> ScanOutcome {
    let _running = RunningGuard(running);
    let mut rig = rig.lock().unwrap_or_else(PoisonError::into_inner);

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        scanner.run(source.as_mut(), &mut rig);
    }));
    if result.is_err() {
        crate::log("Scan loop panicked, aborting scan");
        scanner.state = ScannerState::Aborted;
    }
    let outcome = scanner.outcome();

    source.close();
    drop(source);
    if let Err(e) = rig.home() {
        crate::log(&format!("Failed to home servos: {}", e));
    }
    drop(rig);

    crate::log(&format!("Scan finished: {}", scanner.progress_string()));
    outcome
}
