// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Detector configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{QuadsightError, Result};

/// How the sensor image must be turned to match the display's orientation.
///
/// Applied to the pixel buffer during normalization, never to points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    /// Sensor and display already agree.
    Upright,
    /// Transpose then mirror horizontally: a back camera mounted landscape
    /// on a portrait phone.
    Rotate90Clockwise,
    Rotate180,
    Rotate90CounterClockwise,
    /// Mirror horizontally only (front camera preview).
    Mirrored,
}

impl Orientation {
    /// Dimensions of a `width` x `height` sensor frame once oriented.
    pub const fn oriented_size(self, width: u32, height: u32) -> (u32, u32) {
        match self {
            Self::Rotate90Clockwise | Self::Rotate90CounterClockwise => (height, width),
            Self::Upright | Self::Rotate180 | Self::Mirrored => (width, height),
        }
    }
}

/// Tunable parameters of the detection pipeline and its session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Frames are downscaled to fit inside a `working_size` square before
    /// edge and contour analysis.
    pub working_size: u32,
    /// Edge-magnitude threshold for the binary mask (0..=255).
    pub edge_threshold: u8,
    /// Contours enclosing less than this share of the mask area are noise.
    pub min_area_ratio: f64,
    /// Polygon simplification tolerance as a share of the contour perimeter.
    pub approx_epsilon_ratio: f64,
    /// Lowest acceptable corner cosine (obtuse limit).
    pub min_cosine: f64,
    /// Highest acceptable corner cosine (acute limit).
    pub max_cosine: f64,
    /// Sensor-to-display orientation fix applied to every frame.
    pub orientation: Orientation,
    /// Frames waiting behind the in-flight one before the oldest is discarded.
    pub max_queued_frames: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            working_size: 400,
            edge_threshold: 127,
            min_area_ratio: 0.01,
            approx_epsilon_ratio: 0.1,
            min_cosine: -0.3,
            max_cosine: 0.5,
            orientation: Orientation::Rotate90Clockwise,
            max_queued_frames: 8,
        }
    }
}

impl DetectorConfig {
    /// Reject parameter combinations the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.working_size == 0 {
            return Err(QuadsightError::Config(
                "working_size must be positive".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.min_area_ratio) {
            return Err(QuadsightError::Config(format!(
                "min_area_ratio must be in [0, 1), got {}",
                self.min_area_ratio
            )));
        }
        if !(self.approx_epsilon_ratio > 0.0 && self.approx_epsilon_ratio < 1.0) {
            return Err(QuadsightError::Config(format!(
                "approx_epsilon_ratio must be in (0, 1), got {}",
                self.approx_epsilon_ratio
            )));
        }
        if !(-1.0..=1.0).contains(&self.min_cosine)
            || !(-1.0..=1.0).contains(&self.max_cosine)
            || self.min_cosine > self.max_cosine
        {
            return Err(QuadsightError::Config(format!(
                "cosine band [{}, {}] is not a sub-range of [-1, 1]",
                self.min_cosine, self.max_cosine
            )));
        }
        if self.max_queued_frames == 0 {
            return Err(QuadsightError::Config(
                "max_queued_frames must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Load and validate a configuration from a JSON file.
    ///
    /// Missing fields fall back to their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        info!(path = %path.display(), "detector config loaded");
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "detector config saved");
        Ok(())
    }
}
