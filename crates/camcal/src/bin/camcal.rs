use std::{error::Error, path::PathBuf};

use camcal::{backend::default_backend, pipeline, CalibrationConfig};
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;

/// Checkerboard camera calibration from a folder of photos.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Calibrate from the images in a directory and write the JSON report.
    Calibrate(CalibrateArgs),
    /// Write the default configuration as JSON.
    InitConfig {
        #[arg(default_value = "camcal.json")]
        path: PathBuf,
    },
}

#[derive(Debug, Args)]
struct CalibrateArgs {
    /// JSON configuration. Defaults are used if omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    image_dir: Option<PathBuf>,

    #[arg(long)]
    undistort_dir: Option<PathBuf>,

    /// Skip writing undistorted copies.
    #[arg(long)]
    no_undistort: bool,

    #[arg(long)]
    show_images: bool,

    /// Squares along the board's first axis.
    #[arg(long)]
    rows: Option<u32>,

    /// Squares along the board's second axis.
    #[arg(long)]
    cols: Option<u32>,

    #[arg(long)]
    square_length: Option<f64>,

    #[arg(long)]
    min_images: Option<usize>,

    /// Where the JSON report goes.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Debug-level logging. `RUST_LOG` still wins under `tracing`.
    #[arg(short, long)]
    verbose: bool,

    /// Log through `tracing` as JSON lines.
    #[cfg(feature = "tracing")]
    #[arg(long)]
    json_logs: bool,
}

impl CalibrateArgs {
    fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }

    fn apply(&self, cfg: &mut CalibrationConfig) {
        if let Some(dir) = &self.image_dir {
            cfg.image_dir = dir.clone();
        }
        if let Some(dir) = &self.undistort_dir {
            cfg.undistort_dir = dir.clone();
        }
        if self.no_undistort {
            cfg.undistort_images = false;
        }
        if self.show_images {
            cfg.show_images = true;
        }
        if let Some(rows) = self.rows {
            cfg.board.rows = rows;
        }
        if let Some(cols) = self.cols {
            cfg.board.cols = cols;
        }
        if let Some(len) = self.square_length {
            cfg.board.square_length = len;
        }
        if let Some(n) = self.min_images {
            cfg.min_images = n;
        }
        if let Some(path) = &self.report {
            cfg.report_path = path.clone();
        }
    }
}

#[cfg(feature = "tracing")]
fn init_logging(args: &CalibrateArgs) {
    camcal::core::init_tracing(args.log_level(), args.json_logs);
}

#[cfg(not(feature = "tracing"))]
fn init_logging(args: &CalibrateArgs) {
    let _ = camcal::core::init_with_level(args.log_level());
}

fn calibrate(args: CalibrateArgs) -> Result<(), Box<dyn Error>> {
    init_logging(&args);

    let mut cfg = match &args.config {
        Some(path) => CalibrationConfig::load_json(path)?,
        None => CalibrationConfig::default(),
    };
    args.apply(&mut cfg);

    let backend = default_backend();
    let run = pipeline::run(&cfg, backend.as_ref())?;

    println!(
        "calibrated from {} images ({} invalid)",
        run.report.image_data.len(),
        run.invalid_images.len()
    );
    println!("wrote report JSON to {}", run.report_path.display());
    Ok(())
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), Box<dyn Error>> {
    match Cli::parse().command {
        Command::Calibrate(args) => calibrate(args),
        Command::InitConfig { path } => {
            CalibrationConfig::default().write_json(&path)?;
            println!("wrote default configuration to {}", path.display());
            Ok(())
        }
    }
}
