//! Heatmap rendering of scan grids using plotters.
//!
//! Row 0 is drawn at the bottom so the image matches the physical tilt
//! direction. A vertical colour bar on the right spans the value range.
//! Nothing textual is drawn, so rendering needs no system fonts.

use anyhow::{bail, Context, Result};
use plotters::prelude::*;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::scan::GridSnapshot;

/// Range used when no cell holds a non-zero value.
const DEFAULT_MIN: f64 = 20.0;
/// Upper bound used when no cell is above zero.
const DEFAULT_MAX: f64 = 50.0;

/// Blank border around the drawing, in pixels.
const MARGIN: u32 = 10;
/// Gap between the grid and the colour bar.
const BAR_GAP: u32 = 10;
const BAR_WIDTH: u32 = 20;

const COLD: RGBColor = RGBColor(0, 0, 255);
const MID: RGBColor = RGBColor(255, 255, 0);
const HOT: RGBColor = RGBColor(255, 0, 0);

/// Anything that can show a grid snapshot.
pub trait GridDisplay {
    fn render(&mut self, grid: &GridSnapshot) -> Result<()>;
}

/// Value range for the colormap.
///
/// The minimum ignores zero cells, which are unread or fallback readings.
pub fn color_range(grid: &GridSnapshot) -> (f64, f64) {
    let min = grid
        .values()
        .filter(|v| *v != 0.0)
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.min(v))))
        .unwrap_or(DEFAULT_MIN);
    let max = grid.values().fold(f64::NEG_INFINITY, f64::max);
    let max = if max > 0.0 { max } else { DEFAULT_MAX };

    if min == max {
        (min - 1.0, max + 1.0)
    } else {
        (min, max)
    }
}

fn lerp(a: u8, b: u8, t: f64) -> u8 {
    (a as f64 + (b as f64 - a as f64) * t).round() as u8
}

fn mix(from: RGBColor, to: RGBColor, t: f64) -> RGBColor {
    RGBColor(lerp(from.0, to.0, t), lerp(from.1, to.1, t), lerp(from.2, to.2, t))
}

/// Blue to yellow to red over `t` in `[0, 1]`; out-of-range values clamp.
pub fn colormap(t: f64) -> RGBColor {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    if t < 0.5 {
        mix(COLD, MID, t * 2.0)
    } else {
        mix(MID, HOT, t * 2.0 - 1.0)
    }
}

fn normalize(value: f64, (min, max): (f64, f64)) -> f64 {
    (value - min) / (max - min)
}

/// Writes heatmap PNGs to a fixed path.
pub struct HeatmapRenderer {
    output: PathBuf,
    cell_px: u32,
}

impl HeatmapRenderer {
    pub fn new(output: impl Into<PathBuf>, cell_px: u32) -> Self {
        Self {
            output: output.into(),
            cell_px: cell_px.max(1),
        }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    fn image_size(&self, grid: &GridSnapshot) -> (u32, u32) {
        let grid_w = grid.width as u32 * self.cell_px;
        let grid_h = grid.height as u32 * self.cell_px;
        (MARGIN * 2 + grid_w + BAR_GAP + BAR_WIDTH, MARGIN * 2 + grid_h)
    }
}

impl GridDisplay for HeatmapRenderer {
    fn render(&mut self, grid: &GridSnapshot) -> Result<()> {
        if grid.width == 0 || grid.height == 0 {
            bail!("cannot render an empty {}x{} grid", grid.width, grid.height);
        }

        let range = color_range(grid);
        let size = self.image_size(grid);
        let root = BitMapBackend::new(&self.output, size).into_drawing_area();
        root.fill(&WHITE).context("Failed to fill heatmap background")?;

        let cell = self.cell_px as i32;
        let margin = MARGIN as i32;
        for y in 0..grid.height {
            // Row 0 at the bottom
            let top = margin + (grid.height - 1 - y) as i32 * cell;
            for x in 0..grid.width {
                let left = margin + x as i32 * cell;
                let color = colormap(normalize(grid.value(x, y), range));
                root.draw(&Rectangle::new(
                    [(left, top), (left + cell - 1, top + cell - 1)],
                    color.filled(),
                ))?;
            }
        }

        // Colour bar, hottest at the top, one pixel row at a time
        let bar_left = margin + grid.width as i32 * cell + BAR_GAP as i32;
        let bar_height = grid.height as i32 * cell;
        for row in 0..bar_height {
            let t = if bar_height > 1 {
                1.0 - row as f64 / (bar_height - 1) as f64
            } else {
                1.0
            };
            let color = colormap(t);
            for col in 0..BAR_WIDTH as i32 {
                root.draw_pixel((bar_left + col, margin + row), &color)?;
            }
        }

        root.present()
            .with_context(|| format!("Failed to save heatmap to {}", self.output.display()))?;
        Ok(())
    }
}

/// On-disk grid accepted by the `render` command.
#[derive(Debug, Deserialize)]
struct GridFile {
    values: Vec<Vec<f64>>,
}

/// Reads a `{ "values": [[...], ...] }` grid file, row 0 first.
pub fn load_grid_file(path: &Path) -> Result<GridSnapshot> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read grid file {}", path.display()))?;
    let file: GridFile = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse grid file {}", path.display()))?;
    Ok(GridSnapshot::from_rows(&file.values))
}
