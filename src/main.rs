//! Thermoscan
//!
//! Reads a seven-segment thermometer through a camera, steps a pan/tilt rig
//! over a grid in snake order and renders the readings as a heatmap.

mod actuator;
mod capture;
mod cli;
mod config;
mod heatmap;
mod paths;
mod recognition;
mod scan;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use actuator::{LoggingActuator, ServoRig};
use capture::{Camera, DirectoryCamera, FrameSource, SharedCamera};
use cli::{Args, Commands};
use config::ScannerConfig;
use heatmap::{GridDisplay, HeatmapRenderer};
use recognition::overlay::render_overlay;
use scan::{ScanRequest, ScanSession};

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    let log_path = paths::get_logs_dir().join("thermoscan.log");
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(line.as_bytes());
    }
}

fn main() -> Result<()> {
    // Set up panic hook to log panics
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        let log_msg = format!("[PANIC]{} {}\n", location, msg);
        eprintln!("{}", log_msg);
        let log_path = paths::get_logs_dir().join("thermoscan.log");
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&log_path) {
            let _ = file.write_all(log_msg.as_bytes());
        }
    }));

    // Ensure output directories exist
    paths::ensure_directories()?;

    let args = Args::parse();
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);
    config::init_config(&config_path);
    let config = config::get_config();

    match args.command {
        Commands::Scan {
            width,
            height,
            delay,
        } => run_scan(config, width, height, delay),
        Commands::Read { output } => run_read(config, &output),
        Commands::Render { input, output } => run_render(config, &input, output),
    }
}

fn frame_device(config: &ScannerConfig) -> DirectoryCamera {
    DirectoryCamera::new(paths::exe_relative(&config.frames_dir))
}

/// Runs one scan in the background and keeps the heatmap current.
fn run_scan(
    config: &ScannerConfig,
    width: Option<usize>,
    height: Option<usize>,
    delay: Option<f64>,
) -> Result<()> {
    let calibration = config.calibration()?;

    let camera = Arc::new(
        SharedCamera::start(
            &frame_device(config),
            config.preview_interval(),
            config.frame_timeout(),
        )
        .context("Failed to start camera")?,
    );
    let rig = ServoRig::new(Box::new(LoggingActuator), config.servo);
    let session = ScanSession::new(
        Arc::clone(&camera) as Arc<dyn Camera>,
        rig,
        calibration.clone(),
        config.scan_options(),
    );

    let cell_delay = match delay {
        Some(secs) => Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO),
        None => config.cell_delay(),
    };
    session.start(ScanRequest {
        width: width.unwrap_or(config.grid_width),
        height: height.unwrap_or(config.grid_height),
        cell_delay,
    })?;

    let mut renderer = HeatmapRenderer::new(
        paths::output_path(&config.heatmap.output),
        config.heatmap.cell_px,
    );
    let preview_path = paths::output_path(Path::new("preview.png"));
    let refresh = Duration::from_millis(config.heatmap.refresh_ms.max(1));
    let mut last_cell = None;

    while session.is_running() {
        thread::sleep(refresh);

        if !camera.is_alive() {
            log("Camera service stopped, aborting scan");
            session.stop();
        }

        if let Some(reading) = session.latest_reading() {
            if last_cell != Some((reading.x, reading.y)) {
                last_cell = Some((reading.x, reading.y));
                log(&format!(
                    "Latest: {:.1} at ({}, {}) taken {}{}",
                    reading.value,
                    reading.x,
                    reading.y,
                    reading.taken_at.format("%H:%M:%S%.3f"),
                    if reading.fallback { " [fallback]" } else { "" }
                ));
            }
        }
        if let Err(e) = renderer.render(&session.grid().snapshot()) {
            log(&format!("Heatmap refresh failed: {:#}", e));
        }
        if let Some(frame) = camera.latest_frame() {
            if let Err(e) = render_overlay(&frame, &calibration).save(&preview_path) {
                log(&format!("Preview save failed: {}", e));
            }
        }
    }

    let outcome = session.wait();
    let snapshot = session.grid().snapshot();
    renderer.render(&snapshot)?;
    log(&format!("Heatmap saved to {}", renderer.output().display()));

    for row in snapshot.rows().iter().rev() {
        let cells: Vec<String> = row.iter().map(|v| format!("{:5.1}", v)).collect();
        println!("{}", cells.join(" "));
    }
    if let Some(outcome) = outcome {
        log(&format!(
            "Scan {}: {} read, {} fallback, {} skipped in {:.1}s",
            outcome.state,
            outcome.cells_read,
            outcome.cells_fallback,
            outcome.cells_skipped,
            outcome.elapsed.as_secs_f32()
        ));
    }
    Ok(())
}

/// Reads one frame and saves an overlay of every sample point.
fn run_read(config: &ScannerConfig, output: &Path) -> Result<()> {
    let calibration = config.calibration()?;

    let mut source = frame_device(config)
        .open()
        .context("Failed to open camera")?;
    let frame = source.read_frame();
    source.close();
    let frame = frame.context("Failed to read frame")?;

    let reading = recognition::read_frame(&frame, &calibration);
    for (i, (pattern, digit)) in reading.patterns.iter().zip(&reading.digits).enumerate() {
        println!("Digit {}: {} -> {}", i + 1, pattern, digit);
    }
    if reading.is_fallback() {
        println!("Reading: {:.1} (unreadable: {})", reading.reading(), reading.digits_text());
    } else {
        println!("Reading: {}", reading.reading());
    }

    let path = paths::output_path(output);
    render_overlay(&frame, &calibration)
        .save(&path)
        .with_context(|| format!("Failed to save overlay to {}", path.display()))?;
    log(&format!("Overlay saved to {}", path.display()));
    Ok(())
}

/// Renders a stored grid without scanning.
fn run_render(config: &ScannerConfig, input: &Path, output: Option<PathBuf>) -> Result<()> {
    let grid = heatmap::load_grid_file(input)?;
    let output = output.unwrap_or_else(|| config.heatmap.output.clone());
    let mut renderer = HeatmapRenderer::new(paths::output_path(&output), config.heatmap.cell_px);
    renderer.render(&grid)?;
    log(&format!(
        "Rendered {}x{} grid to {}",
        grid.width,
        grid.height,
        renderer.output().display()
    ));
    Ok(())
}
