// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quadsight — document outline detection from the command line.
//
// Entry point. Initialises logging, parses the subcommand, and prints results
// as JSON on stdout. Logs go to stderr.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use quadsight_core::error::Result;
use quadsight_core::{
    DetectionResult, DetectorConfig, Display, Orientation, PixelFormat, Point, RawFrame,
};
use quadsight_detect::{QuadDetector, frame};
use quadsight_live::{DetectionSession, StillImageSource, pump};

#[derive(Parser)]
#[command(name = "quadsight")]
#[command(about = "Find the document outline in camera frames")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the outline in an encoded still image (PNG, JPEG, ...).
    Detect {
        /// Path to the input image.
        #[arg(long)]
        image: PathBuf,

        /// Height of the display surface; defaults to the image height.
        #[arg(long)]
        display_height: Option<u32>,

        /// Detector configuration (JSON).
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run the full pipeline on a raw NV21 sensor dump.
    DetectRaw {
        /// Path to the NV21 bytes.
        #[arg(long)]
        nv21: PathBuf,

        /// Sensor frame width in pixels.
        #[arg(long)]
        width: u32,

        /// Sensor frame height in pixels.
        #[arg(long)]
        height: u32,

        /// Height of the display surface; defaults to the oriented frame height.
        #[arg(long)]
        display_height: Option<u32>,

        /// Detector configuration (JSON).
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Stream a directory of stills through a live detection session.
    Replay {
        /// Directory of images, replayed in file-name order.
        #[arg(long)]
        dir: PathBuf,

        /// Height of the display surface.
        #[arg(long)]
        display_height: u32,

        /// Detector configuration (JSON).
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Write the default configuration to a file.
    Config {
        /// Output path.
        #[arg(long)]
        out: PathBuf,
    },
}

/// One-shot detection output.
#[derive(Debug, Serialize)]
struct DetectReport {
    source: String,
    width: u32,
    height: u32,
    display_height: u32,
    result: DetectionResult,
    /// Closed outline ready to draw, when something was found.
    path: Option<[Point<Display>; 5]>,
}

impl DetectReport {
    fn new(
        source: &Path,
        (width, height): (u32, u32),
        display_height: u32,
        result: DetectionResult,
    ) -> Self {
        Self {
            source: source.display().to_string(),
            width,
            height,
            display_height,
            path: result.closed_path(),
            result,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect {
            image,
            display_height,
            config,
        } => run_detect(&image, display_height, config.as_deref()),
        Commands::DetectRaw {
            nv21,
            width,
            height,
            display_height,
            config,
        } => run_detect_raw(&nv21, (width, height), display_height, config.as_deref()),
        Commands::Replay {
            dir,
            display_height,
            config,
        } => run_replay(dir, display_height, config.as_deref()).await,
        Commands::Config { out } => {
            DetectorConfig::default().save(&out)?;
            info!(path = %out.display(), "default configuration written");
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<DetectorConfig> {
    match path {
        Some(path) => DetectorConfig::load(path),
        None => Ok(DetectorConfig::default()),
    }
}

/// Encoded stills are stored upright already.
fn upright(mut config: DetectorConfig) -> DetectorConfig {
    if config.orientation != Orientation::Upright {
        warn!(configured = ?config.orientation, "still images are upright, ignoring orientation");
        config.orientation = Orientation::Upright;
    }
    config
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_detect(image: &Path, display_height: Option<u32>, config: Option<&Path>) -> Result<()> {
    let detector = QuadDetector::new(load_config(config)?)?;
    let rgb = frame::open_rgb(image)?;
    let size = rgb.dimensions();
    let display_height = display_height.unwrap_or(size.1);

    let result = detector.detect_rgb(rgb, display_height)?;
    info!(found = result.is_found(), "detection complete");
    print_json(&DetectReport::new(image, size, display_height, result))
}

fn run_detect_raw(
    path: &Path,
    (width, height): (u32, u32),
    display_height: Option<u32>,
    config: Option<&Path>,
) -> Result<()> {
    let config = load_config(config)?;
    let oriented = config.orientation.oriented_size(width, height);
    let detector = QuadDetector::new(config)?;

    let data = std::fs::read(path)?;
    info!(path = %path.display(), bytes = data.len(), width, height, "raw frame loaded");
    let raw = RawFrame::new(data, width, height, PixelFormat::Nv21);
    let display_height = display_height.unwrap_or(oriented.1);

    let result = detector.detect(&raw, display_height)?;
    info!(found = result.is_found(), "detection complete");
    print_json(&DetectReport::new(path, oriented, display_height, result))
}

async fn run_replay(dir: PathBuf, display_height: u32, config: Option<&Path>) -> Result<()> {
    let detector = QuadDetector::new(upright(load_config(config)?))?;
    let mut source = StillImageSource::from_dir(dir)?;
    let (session, mut results) = DetectionSession::start(detector);
    let (_display_tx, display_rx) = watch::channel(display_height);

    let printer = tokio::spawn(async move {
        while let Some(detection) = results.recv().await {
            match serde_json::to_string(&detection) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(frame = %detection.frame_id, error = %e, "failed to encode result"),
            }
        }
    });

    let stats = pump(&mut source, session, display_rx).await?;
    if let Err(e) = printer.await {
        warn!(error = %e, "result printer stopped early");
    }
    info!(
        accepted = stats.accepted,
        emitted = stats.emitted,
        dropped = stats.dropped,
        discarded = stats.discarded,
        "replay finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn detect_raw_requires_dimensions() {
        let missing = Cli::try_parse_from(["quadsight", "detect-raw", "--nv21", "f.bin"]);
        assert!(missing.is_err());
        let cli = Cli::try_parse_from([
            "quadsight",
            "detect-raw",
            "--nv21",
            "f.bin",
            "--width",
            "640",
            "--height",
            "480",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::DetectRaw {
                width: 640,
                height: 480,
                display_height: None,
                ..
            }
        ));
    }

    #[test]
    fn report_carries_the_drawing_path() {
        let quad = quadsight_core::Quadrilateral::from_ordered([
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 10.0),
        ]);
        let report = DetectReport::new(
            Path::new("page.png"),
            (40, 30),
            30,
            DetectionResult::Quadrilateral(quad),
        );
        let path = report.path.unwrap();
        assert_eq!((path[2].x, path[2].y), (10.0, 10.0));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["source"], "page.png");
        assert_eq!(json["path"].as_array().unwrap().len(), 5);

        let empty = DetectReport::new(
            Path::new("blank.png"),
            (40, 30),
            30,
            DetectionResult::NotFound,
        );
        assert!(empty.path.is_none());
    }

    #[test]
    fn stills_are_forced_upright() {
        let config = upright(DetectorConfig::default());
        assert_eq!(config.orientation, Orientation::Upright);
    }
}
