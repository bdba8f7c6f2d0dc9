//! Grid scan state machine.
//!
//! The scanner walks the grid in snake order. Each `step` handles one cell:
//! position the rig, let it settle, grab a frame, read the display, store
//! the reading and pause for the cell delay. Stop requests are honoured
//! between cells only; a frame is never abandoned halfway through decoding.

use chrono::{DateTime, Local};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use super::grid::{CellStatus, GridCell, ScanGrid};
use super::order::snake_order;
use crate::actuator::ServoRig;
use crate::capture::{Frame, FrameSource};
use crate::recognition::{read_frame, Calibration};

/// Scanner states.
#[derive(Debug, Clone, PartialEq)]
pub enum ScannerState {
    /// Not started yet
    Idle,
    /// Visiting cells
    Running,
    /// Last cell of the last row done
    Complete,
    /// Stop was requested
    Aborted,
}

impl std::fmt::Display for ScannerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScannerState::Idle => write!(f, "Idle"),
            ScannerState::Running => write!(f, "Running"),
            ScannerState::Complete => write!(f, "Complete"),
            ScannerState::Aborted => write!(f, "Aborted"),
        }
    }
}

/// Timing and grid size for one scan.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanPlan {
    pub width: usize,
    pub height: usize,
    /// Pause after each stored reading
    pub cell_delay: Duration,
    /// Pause between positioning and frame acquisition
    pub settle_delay: Duration,
    /// Extra acquisition attempts for a cell after a dropped frame
    pub frame_retries: u32,
}

/// Most recent reading, for live display.
#[derive(Clone, Debug, PartialEq)]
pub struct LatestReading {
    pub value: f64,
    pub fallback: bool,
    pub x: usize,
    pub y: usize,
    pub digits: String,
    pub taken_at: DateTime<Local>,
}

/// Summary of a finished scan.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanOutcome {
    pub state: ScannerState,
    pub cells_read: usize,
    pub cells_fallback: usize,
    pub cells_skipped: usize,
    pub elapsed: Duration,
}

pub struct GridScanner {
    pub state: ScannerState,
    plan: ScanPlan,
    calibration: Arc<Calibration>,
    grid: Arc<ScanGrid>,
    latest: Arc<Mutex<Option<LatestReading>>>,
    stop: Arc<AtomicBool>,
    cells: Vec<(usize, usize)>,
    next_cell: usize,
    cells_read: usize,
    cells_fallback: usize,
    cells_skipped: usize,
    start_time: Instant,
}

impl GridScanner {
    pub fn new(
        plan: ScanPlan,
        calibration: Arc<Calibration>,
        grid: Arc<ScanGrid>,
        latest: Arc<Mutex<Option<LatestReading>>>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        let cells = snake_order(plan.width, plan.height).collect();
        Self {
            state: ScannerState::Idle,
            plan,
            calibration,
            grid,
            latest,
            stop,
            cells,
            next_cell: 0,
            cells_read: 0,
            cells_fallback: 0,
            cells_skipped: 0,
            start_time: Instant::now(),
        }
    }

    /// Advances the scan by one cell.
    ///
    /// Returns `true` while there is more to do.
    pub fn step(&mut self, source: &mut dyn FrameSource, rig: &mut ServoRig) -> bool {
        match self.state {
            ScannerState::Complete | ScannerState::Aborted => return false,
            ScannerState::Idle => {
                crate::log(&format!(
                    "Starting scan: {}x{} grid, {:.2}s per cell",
                    self.plan.width,
                    self.plan.height,
                    self.plan.cell_delay.as_secs_f32()
                ));
                self.start_time = Instant::now();
                self.state = ScannerState::Running;
            }
            ScannerState::Running => {}
        }

        if self.stop.load(Ordering::SeqCst) {
            crate::log(&format!(
                "Stop requested, aborting scan at cell {}/{}",
                self.next_cell,
                self.cells.len()
            ));
            self.state = ScannerState::Aborted;
            return false;
        }

        let Some(&(x, y)) = self.cells.get(self.next_cell) else {
            crate::log(&format!(
                "Scan complete: {} read, {} fallback, {} skipped in {:.1}s",
                self.cells_read,
                self.cells_fallback,
                self.cells_skipped,
                self.start_time.elapsed().as_secs_f32()
            ));
            self.state = ScannerState::Complete;
            return false;
        };
        self.next_cell += 1;

        self.visit(x, y, source, rig);
        true
    }

    /// Steps until the scan completes or is stopped.
    pub fn run(&mut self, source: &mut dyn FrameSource, rig: &mut ServoRig) -> ScanOutcome {
        while self.step(source, rig) {}
        self.outcome()
    }

    fn visit(&mut self, x: usize, y: usize, source: &mut dyn FrameSource, rig: &mut ServoRig) {
        if let Err(e) = rig.position(x, y, self.plan.width, self.plan.height) {
            // Positioning is best-effort; the reading is still taken
            crate::log(&format!("Cell ({}, {}): positioning failed: {}", x, y, e));
        }
        if !self.plan.settle_delay.is_zero() {
            thread::sleep(self.plan.settle_delay);
        }

        let Some(frame) = self.acquire(x, y, source) else {
            self.cells_skipped += 1;
            return;
        };

        let reading = read_frame(&frame, &self.calibration);
        let status = if reading.is_fallback() {
            self.cells_fallback += 1;
            crate::log(&format!(
                "Cell ({}, {}): unreadable digits {}, storing fallback",
                x,
                y,
                reading.digits_text()
            ));
            CellStatus::Fallback
        } else {
            self.cells_read += 1;
            CellStatus::Read
        };

        let value = reading.reading();
        self.grid.set(x, y, GridCell { value, status });
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        *latest = Some(LatestReading {
            value,
            fallback: reading.is_fallback(),
            x,
            y,
            digits: reading.digits_text(),
            taken_at: Local::now(),
        });
        drop(latest);

        if !self.plan.cell_delay.is_zero() {
            thread::sleep(self.plan.cell_delay);
        }
    }

    /// One frame for this cell, retrying dropped frames up to the plan's limit.
    fn acquire(&self, x: usize, y: usize, source: &mut dyn FrameSource) -> Option<Frame> {
        for attempt in 0..=self.plan.frame_retries {
            match source.read_frame() {
                Ok(frame) => return Some(frame),
                Err(e) => {
                    crate::log(&format!(
                        "Cell ({}, {}): frame attempt {} failed: {}",
                        x,
                        y,
                        attempt + 1,
                        e
                    ));
                    if !e.is_transient() {
                        break;
                    }
                }
            }
        }
        crate::log(&format!("Cell ({}, {}): no frame, cell skipped", x, y));
        None
    }

    pub fn outcome(&self) -> ScanOutcome {
        ScanOutcome {
            state: self.state.clone(),
            cells_read: self.cells_read,
            cells_fallback: self.cells_fallback,
            cells_skipped: self.cells_skipped,
            elapsed: self.start_time.elapsed(),
        }
    }

    /// Progress text for display, e.g. `12/100 - Running`.
    pub fn progress_string(&self) -> String {
        match &self.state {
            ScannerState::Complete => format!("Complete ({} cells)", self.cells.len()),
            ScannerState::Aborted => "Aborted".to_string(),
            _ => format!("{}/{} - {}", self.next_cell, self.cells.len(), self.state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::servo::testing::RecordingActuator;
    use crate::actuator::{Axis, ServoLimits};
    use crate::recognition::testing::{calibration, display_frame};
    use crate::scan::ScanError;
    use std::collections::VecDeque;

    /// Serves a scripted sequence of frame results, then repeats the last.
    struct ScriptedFrames {
        script: VecDeque<Result<Frame, ScanError>>,
        reads: usize,
    }

    impl FrameSource for ScriptedFrames {
        fn read_frame(&mut self) -> Result<Frame, ScanError> {
            self.reads += 1;
            if self.script.len() > 1 {
                self.script.pop_front().unwrap()
            } else {
                self.script.front().cloned().unwrap()
            }
        }
    }

    fn plan(width: usize, height: usize) -> ScanPlan {
        ScanPlan {
            width,
            height,
            cell_delay: Duration::ZERO,
            settle_delay: Duration::ZERO,
            frame_retries: 0,
        }
    }

    fn scanner(plan: ScanPlan) -> (GridScanner, Arc<ScanGrid>, Arc<AtomicBool>) {
        let grid = Arc::new(ScanGrid::new(plan.width, plan.height));
        let stop = Arc::new(AtomicBool::new(false));
        let scanner = GridScanner::new(
            plan,
            Arc::new(calibration()),
            Arc::clone(&grid),
            Arc::new(Mutex::new(None)),
            Arc::clone(&stop),
        );
        (scanner, grid, stop)
    }

    fn recording_rig() -> (ServoRig, Arc<Mutex<Vec<(Axis, f64)>>>) {
        let recorder = RecordingActuator::default();
        let moves = recorder.moves.clone();
        (ServoRig::new(Box::new(recorder), ServoLimits::default()), moves)
    }

    #[test]
    fn test_state_display() {
        assert_eq!(format!("{}", ScannerState::Idle), "Idle");
        assert_eq!(format!("{}", ScannerState::Aborted), "Aborted");
    }

    #[test]
    fn test_full_scan_fills_grid_in_snake_order() {
        let cal = calibration();
        let frame = display_frame(&cal, &[Some(2), Some(0), Some(4)]);
        let mut source = ScriptedFrames { script: VecDeque::from([Ok(frame)]), reads: 0 };
        let (mut rig, moves) = recording_rig();
        let (mut scanner, grid, _) = scanner(plan(3, 2));

        let outcome = scanner.run(&mut source, &mut rig);

        assert_eq!(outcome.state, ScannerState::Complete);
        assert_eq!(outcome.cells_read, 6);
        assert_eq!(grid.snapshot().rows(), vec![vec![20.4; 3], vec![20.4; 3]]);

        // Pan angles for (0,0),(1,0),(2,0),(2,1),(1,1),(0,1)
        let pans: Vec<f64> = moves
            .lock()
            .unwrap()
            .iter()
            .filter(|(axis, _)| *axis == Axis::Horizontal)
            .map(|(_, deg)| *deg)
            .collect();
        assert_eq!(pans, vec![0.0, 90.0, 180.0, 180.0, 90.0, 0.0]);
    }

    #[test]
    fn test_dropped_frame_skips_cell() {
        let cal = calibration();
        let frame = display_frame(&cal, &[Some(1), Some(9), Some(5)]);
        let script = VecDeque::from([Ok(frame.clone()), Err(ScanError::FrameDropped), Ok(frame)]);
        let mut source = ScriptedFrames { script, reads: 0 };
        let (mut rig, _) = recording_rig();
        let (mut scanner, grid, _) = scanner(plan(3, 1));

        let outcome = scanner.run(&mut source, &mut rig);

        assert_eq!(outcome.state, ScannerState::Complete);
        assert_eq!(outcome.cells_skipped, 1);
        let snap = grid.snapshot();
        assert_eq!(snap.cells[0].value, 19.5);
        assert_eq!(snap.cells[1].status, CellStatus::Pending);
        assert_eq!(snap.cells[2].value, 19.5);
    }

    #[test]
    fn test_retry_recovers_dropped_frame() {
        let cal = calibration();
        let frame = display_frame(&cal, &[Some(3), Some(3), Some(0)]);
        let script = VecDeque::from([Err(ScanError::FrameTimeout(Duration::from_millis(5))), Ok(frame)]);
        let mut source = ScriptedFrames { script, reads: 0 };
        let (mut rig, _) = recording_rig();
        let mut p = plan(1, 1);
        p.frame_retries = 1;
        let (mut scanner, grid, _) = scanner(p);

        let outcome = scanner.run(&mut source, &mut rig);

        assert_eq!(outcome.cells_skipped, 0);
        assert_eq!(source.reads, 2);
        assert_eq!(grid.get(0, 0).unwrap().value, 33.0);
    }

    #[test]
    fn test_unavailable_camera_is_not_retried() {
        let script = VecDeque::from([Err(ScanError::CameraUnavailable("gone".to_string()))]);
        let mut source = ScriptedFrames { script, reads: 0 };
        let (mut rig, _) = recording_rig();
        let mut p = plan(1, 1);
        p.frame_retries = 3;
        let (mut scanner, grid, _) = scanner(p);

        let outcome = scanner.run(&mut source, &mut rig);

        assert_eq!(outcome.cells_skipped, 1);
        assert_eq!(source.reads, 1);
        assert_eq!(grid.get(0, 0).unwrap().status, CellStatus::Pending);
    }

    #[test]
    fn test_unreadable_frame_stores_fallback() {
        let cal = calibration();
        let frame = display_frame(&cal, &[Some(2), None, Some(4)]);
        let mut source = ScriptedFrames { script: VecDeque::from([Ok(frame)]), reads: 0 };
        let (mut rig, _) = recording_rig();
        let (mut scanner, grid, _) = scanner(plan(1, 1));

        let outcome = scanner.run(&mut source, &mut rig);

        assert_eq!(outcome.cells_fallback, 1);
        let cell = grid.get(0, 0).unwrap();
        assert_eq!(cell.value, 0.0);
        assert_eq!(cell.status, CellStatus::Fallback);
    }

    #[test]
    fn test_stop_takes_effect_at_cell_boundary() {
        let cal = calibration();
        let frame = display_frame(&cal, &[Some(2), Some(0), Some(4)]);
        let mut source = ScriptedFrames { script: VecDeque::from([Ok(frame)]), reads: 0 };
        let (mut rig, _) = recording_rig();
        let (mut scanner, grid, stop) = scanner(plan(2, 2));

        assert!(scanner.step(&mut source, &mut rig));
        assert!(scanner.step(&mut source, &mut rig));
        stop.store(true, Ordering::SeqCst);
        assert!(!scanner.step(&mut source, &mut rig));

        assert_eq!(scanner.state, ScannerState::Aborted);
        assert_eq!(scanner.progress_string(), "Aborted");
        let snap = grid.snapshot();
        assert_eq!(snap.count(CellStatus::Read), 2);
        assert_eq!(snap.count(CellStatus::Pending), 2);
        assert_eq!(source.reads, 2);
    }

    #[test]
    fn test_progress_string() {
        let cal = calibration();
        let frame = display_frame(&cal, &[Some(2), Some(0), Some(4)]);
        let mut source = ScriptedFrames { script: VecDeque::from([Ok(frame)]), reads: 0 };
        let (mut rig, _) = recording_rig();
        let (mut scanner, _, _) = scanner(plan(2, 1));

        scanner.step(&mut source, &mut rig);
        assert_eq!(scanner.progress_string(), "1/2 - Running");
        scanner.run(&mut source, &mut rig);
        assert_eq!(scanner.progress_string(), "Complete (2 cells)");
    }
}
