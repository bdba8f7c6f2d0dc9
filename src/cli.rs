//! Command line arguments backing the `thermoscan` binary.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "thermoscan",
    about = "Reads a seven-segment thermometer through a camera and maps it over a pan/tilt grid",
    version
)]
pub struct Args {
    /// Config file (defaults to config.json next to the executable)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan the grid in snake order and render a heatmap
    Scan {
        /// Grid columns (overrides grid_width)
        #[arg(long)]
        width: Option<usize>,

        /// Grid rows (overrides grid_height)
        #[arg(long)]
        height: Option<usize>,

        /// Dwell after each cell in seconds (overrides cell_delay_secs)
        #[arg(long)]
        delay: Option<f64>,
    },
    /// Read the display once and save a sample-point overlay
    Read {
        /// Overlay image path
        #[arg(long, short = 'o', default_value = "overlay.png")]
        output: PathBuf,
    },
    /// Render a heatmap from a JSON grid file
    Render {
        /// Grid file holding `{ "values": [[...], ...] }`
        input: PathBuf,

        /// Output PNG (overrides heatmap.output)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}
