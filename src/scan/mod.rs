//! Grid scanning.
//!
//! This module provides:
//! - The shared reading grid and its snapshots
//! - Snake-order traversal
//! - The per-cell scan state machine
//! - The session that gates scans and exposes live results

pub mod error;
pub mod grid;
pub mod order;
pub mod scanner;
pub mod session;

pub use error::ScanError;
pub use grid::{CellStatus, GridCell, GridSnapshot, ScanGrid};
pub use order::snake_order;
pub use scanner::{GridScanner, LatestReading, ScanOutcome, ScanPlan, ScannerState};
pub use session::{ScanOptions, ScanRequest, ScanSession, SessionState};
