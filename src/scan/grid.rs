//! Shared reading grid.
//!
//! The scanner writes one cell at a time while any number of viewers read.
//! Each cell write happens under the lock, so a viewer never sees a value
//! without its matching status.

use serde::Serialize;
use std::sync::{PoisonError, RwLock};

/// How a cell's value came about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CellStatus {
    /// Never written; value is the initial 0.0.
    Pending,
    /// Decoded from the display.
    Read,
    /// At least one digit was unrecognized; value is the fallback 0.0.
    Fallback,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct GridCell {
    pub value: f64,
    pub status: CellStatus,
}

impl GridCell {
    pub const PENDING: GridCell = GridCell {
        value: 0.0,
        status: CellStatus::Pending,
    };
}

pub struct ScanGrid {
    width: usize,
    height: usize,
    cells: RwLock<Vec<GridCell>>,
}

impl ScanGrid {
    /// A `height x width` grid with every cell at 0.0.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: RwLock::new(vec![GridCell::PENDING; width * height]),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn index(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height).then_some(y * self.width + x)
    }

    /// Writes one cell. Out-of-range coordinates are ignored.
    pub fn set(&self, x: usize, y: usize, cell: GridCell) {
        let Some(i) = self.index(x, y) else {
            return;
        };
        let mut cells = self.cells.write().unwrap_or_else(PoisonError::into_inner);
        cells[i] = cell;
    }

    #[cfg(test)]
    pub fn get(&self, x: usize, y: usize) -> Option<GridCell> {
        let i = self.index(x, y)?;
        let cells = self.cells.read().unwrap_or_else(PoisonError::into_inner);
        Some(cells[i])
    }

    /// Copies the whole grid for rendering or serving.
    pub fn snapshot(&self) -> GridSnapshot {
        let cells = self.cells.read().unwrap_or_else(PoisonError::into_inner);
        GridSnapshot {
            width: self.width,
            height: self.height,
            cells: cells.clone(),
        }
    }
}

/// Point-in-time copy of a [`ScanGrid`], row-major from row 0.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GridSnapshot {
    pub width: usize,
    pub height: usize,
    pub cells: Vec<GridCell>,
}

impl GridSnapshot {
    /// Builds a snapshot from plain rows, marking every cell as read.
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let height = rows.len();
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut cells = vec![GridCell::PENDING; width * height];
        for (y, row) in rows.iter().enumerate() {
            for (x, &value) in row.iter().enumerate() {
                cells[y * width + x] = GridCell {
                    value,
                    status: CellStatus::Read,
                };
            }
        }
        Self {
            width,
            height,
            cells,
        }
    }

    pub fn value(&self, x: usize, y: usize) -> f64 {
        self.cells[y * self.width + x].value
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.cells.iter().map(|c| c.value)
    }

    pub fn rows(&self) -> Vec<Vec<f64>> {
        self.cells
            .chunks(self.width.max(1))
            .map(|row| row.iter().map(|c| c.value).collect())
            .collect()
    }

    pub fn count(&self, status: CellStatus) -> usize {
        self.cells.iter().filter(|c| c.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_grid_is_zeroed() {
        let grid = ScanGrid::new(3, 2);
        let snap = grid.snapshot();
        assert_eq!(snap.cells.len(), 6);
        assert!(snap.values().all(|v| v == 0.0));
        assert_eq!(snap.count(CellStatus::Pending), 6);
        assert_eq!(snap.rows(), vec![vec![0.0; 3], vec![0.0; 3]]);
    }

    #[test]
    fn test_set_and_get() {
        let grid = ScanGrid::new(3, 2);
        grid.set(2, 1, GridCell { value: 21.5, status: CellStatus::Read });
        assert_eq!(grid.get(2, 1).unwrap().value, 21.5);
        assert_eq!(grid.snapshot().value(2, 1), 21.5);
        assert_eq!(grid.snapshot().rows()[1], vec![0.0, 0.0, 21.5]);
    }

    #[test]
    fn test_out_of_range_is_ignored() {
        let grid = ScanGrid::new(2, 2);
        grid.set(2, 0, GridCell { value: 1.0, status: CellStatus::Read });
        grid.set(0, 5, GridCell { value: 1.0, status: CellStatus::Read });
        assert!(grid.get(2, 0).is_none());
        assert_eq!(grid.snapshot().count(CellStatus::Pending), 4);
    }

    #[test]
    fn test_fallback_is_distinguishable_from_zero() {
        let grid = ScanGrid::new(2, 1);
        grid.set(0, 0, GridCell { value: 0.0, status: CellStatus::Fallback });
        grid.set(1, 0, GridCell { value: 0.0, status: CellStatus::Read });
        let snap = grid.snapshot();
        assert_eq!(snap.value(0, 0), snap.value(1, 0));
        assert_eq!(snap.cells[0].status, CellStatus::Fallback);
        assert_eq!(snap.cells[1].status, CellStatus::Read);
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_cells() {
        let grid = Arc::new(ScanGrid::new(8, 8));
        let writer = {
            let grid = Arc::clone(&grid);
            thread::spawn(move || {
                for i in 0..64 {
                    // Value and status always change together
                    grid.set(i % 8, i / 8, GridCell { value: 1.0, status: CellStatus::Read });
                }
            })
        };
        for _ in 0..50 {
            for cell in grid.snapshot().cells {
                match cell.status {
                    CellStatus::Pending => assert_eq!(cell.value, 0.0),
                    _ => assert_eq!(cell.value, 1.0),
                }
            }
        }
        writer.join().unwrap();
        assert_eq!(grid.snapshot().count(CellStatus::Read), 64);
    }

    #[test]
    fn test_from_rows() {
        let snap = GridSnapshot::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!((snap.width, snap.height), (2, 2));
        assert_eq!(snap.value(1, 1), 4.0);
        assert_eq!(snap.count(CellStatus::Read), 4);
    }
}
