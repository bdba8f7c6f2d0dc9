//! Scanner configuration.
//!
//! Loads settings from config.json at startup: display calibration, grid
//! defaults, timing, servo limits and heatmap output.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use crate::actuator::ServoLimits;
use crate::recognition::{
    Calibration, DigitBox, DigitTable, SegmentOffset, TableEntry, TablePreset, DEFAULT_THRESHOLD,
};
use crate::scan::ScanOptions;

/// Global configuration instance, initialized once at startup.
static CONFIG: OnceLock<ScannerConfig> = OnceLock::new();

/// Digit table as written in config.json: a preset name or explicit entries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DigitTableConfig {
    Preset(TablePreset),
    Entries(Vec<TableEntry>),
}

impl Default for DigitTableConfig {
    fn default() -> Self {
        Self::Preset(TablePreset::Standard)
    }
}

impl DigitTableConfig {
    pub fn build(&self) -> Result<DigitTable> {
        match self {
            Self::Preset(preset) => DigitTable::from_preset(*preset),
            Self::Entries(entries) => DigitTable::new(entries),
        }
    }
}

/// Heatmap output settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    /// Output PNG, relative paths resolve against the output directory
    pub output: PathBuf,
    /// Side length of one grid cell in pixels
    pub cell_px: u32,
    /// How often the heatmap is redrawn while a scan runs (milliseconds)
    pub refresh_ms: u64,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("heatmap.png"),
            cell_px: 40,
            refresh_ms: 1000,
        }
    }
}

/// Complete scanner configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Average channel intensity above which a segment counts as lit
    pub threshold: u8,
    /// One box per digit, left to right
    pub digit_boxes: Vec<DigitBox>,
    /// Sample points A..G relative to each digit box
    pub segment_offsets: Vec<SegmentOffset>,
    pub digit_table: DigitTableConfig,
    /// Digits before the decimal point
    pub integer_digit_count: usize,
    pub grid_width: usize,
    pub grid_height: usize,
    /// Dwell after each cell (seconds)
    pub cell_delay_secs: f64,
    /// Pause between positioning and frame capture (milliseconds)
    pub settle_delay_ms: u64,
    /// Longest wait for a single frame (milliseconds)
    pub frame_timeout_ms: u64,
    /// Extra capture attempts per cell after a dropped frame
    pub frame_retries: u32,
    pub servo: ServoLimits,
    /// Directory of recorded frames replayed as the camera
    pub frames_dir: PathBuf,
    /// Preview polling period of the camera owner thread (milliseconds)
    pub preview_interval_ms: u64,
    pub heatmap: HeatmapConfig,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            digit_boxes: vec![
                DigitBox {
                    left: 0.17,
                    top: 0.44,
                    right: 0.41,
                    bottom: 0.96,
                },
                DigitBox {
                    left: 0.37,
                    top: 0.40,
                    right: 0.62,
                    bottom: 0.93,
                },
                DigitBox {
                    left: 0.61,
                    top: 0.38,
                    right: 0.82,
                    bottom: 0.93,
                },
            ],
            segment_offsets: vec![
                SegmentOffset { x: 0.5, y: 0.1 },
                SegmentOffset { x: 0.8, y: 0.3 },
                SegmentOffset { x: 0.8, y: 0.7 },
                SegmentOffset { x: 0.5, y: 0.9 },
                SegmentOffset { x: 0.2, y: 0.7 },
                SegmentOffset { x: 0.2, y: 0.3 },
                SegmentOffset { x: 0.5, y: 0.5 },
            ],
            digit_table: DigitTableConfig::default(),
            integer_digit_count: 2,
            grid_width: 10,
            grid_height: 10,
            cell_delay_secs: 0.05,
            settle_delay_ms: 0,
            frame_timeout_ms: 2000,
            frame_retries: 0,
            servo: ServoLimits::default(),
            frames_dir: PathBuf::from("frames"),
            preview_interval_ms: 50,
            heatmap: HeatmapConfig::default(),
        }
    }
}

impl ScannerConfig {
    /// Parses a config document; absent fields take their defaults.
    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).context("invalid config JSON")
    }

    /// Validates the display calibration and builds the digit lookup.
    pub fn calibration(&self) -> Result<Calibration> {
        let table = self.digit_table.build().context("invalid digit_table")?;
        Calibration::new(
            self.threshold,
            self.digit_boxes.clone(),
            &self.segment_offsets,
            table,
            self.integer_digit_count,
        )
        .context("invalid display calibration")
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            frame_retries: self.frame_retries,
        }
    }

    /// Per-cell dwell; negative or non-finite values mean no dwell.
    pub fn cell_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.cell_delay_secs).unwrap_or(Duration::ZERO)
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }

    pub fn preview_interval(&self) -> Duration {
        Duration::from_millis(self.preview_interval_ms)
    }
}

/// Default config location: config.json next to the executable.
pub fn default_config_path() -> PathBuf {
    crate::paths::get_exe_dir().join("config.json")
}

/// Loads configuration from `path` or returns defaults.
pub fn load_config(path: &Path) -> ScannerConfig {
    crate::log(&format!("Looking for config at: {}", path.display()));

    if !path.exists() {
        crate::log("config.json not found. Using default config.");
        return ScannerConfig::default();
    }

    match fs::read_to_string(path) {
        Ok(contents) => match ScannerConfig::from_json(&contents) {
            Ok(config) => {
                crate::log("Config loaded from config.json");
                return config;
            }
            Err(e) => {
                crate::log(&format!("Failed to parse config.json: {:#}. Using defaults.", e));
            }
        },
        Err(e) => {
            crate::log(&format!("Failed to read config.json: {}. Using defaults.", e));
        }
    }

    ScannerConfig::default()
}

/// Initializes the global configuration. Call once at startup.
pub fn init_config(path: &Path) {
    let _ = CONFIG.set(load_config(path));
}

/// Returns a reference to the global configuration.
/// Panics if called before init_config().
pub fn get_config() -> &'static ScannerConfig {
    CONFIG
        .get()
        .expect("Config not initialized. Call init_config() first.")
}
