// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Frame module — decoded pixel buffers tagged by format, and normalization
// from raw sensor bytes into an upright RGB frame.

pub mod normalize;

use std::path::Path;

use image::{GrayImage, RgbImage};
use quadsight_core::PixelFormat;
use quadsight_core::error::{QuadsightError, Result};
use tracing::{debug, instrument};

pub use normalize::{normalize, orient};

/// A decoded frame. Each pipeline stage states which variant it accepts.
#[derive(Debug, Clone)]
pub enum Frame {
    /// Colour frame, output of normalization and downscaling.
    Rgb(RgbImage),
    /// Single-channel frame, output of edge extraction.
    Luma(GrayImage),
}

impl Frame {
    pub fn width(&self) -> u32 {
        match self {
            Self::Rgb(img) => img.width(),
            Self::Luma(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Self::Rgb(img) => img.height(),
            Self::Luma(img) => img.height(),
        }
    }

    pub fn format(&self) -> PixelFormat {
        match self {
            Self::Rgb(_) => PixelFormat::Rgb8,
            Self::Luma(_) => PixelFormat::Gray8,
        }
    }

    /// Unwrap an RGB frame, failing for any other variant.
    pub fn into_rgb(self) -> Result<RgbImage> {
        match self {
            Self::Rgb(img) => Ok(img),
            other => Err(QuadsightError::ImageError(format!(
                "stage expects an Rgb8 frame, got {:?}",
                other.format()
            ))),
        }
    }

    /// Unwrap a single-channel frame, failing for any other variant.
    pub fn into_luma(self) -> Result<GrayImage> {
        match self {
            Self::Luma(img) => Ok(img),
            other => Err(QuadsightError::ImageError(format!(
                "stage expects a Gray8 frame, got {:?}",
                other.format()
            ))),
        }
    }
}

// -- Still images -------------------------------------------------------------

/// Load an encoded still (JPEG, PNG, ...) as an upright RGB frame.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn open_rgb(path: impl AsRef<Path>) -> Result<RgbImage> {
    let img = image::open(path.as_ref()).map_err(|err| {
        QuadsightError::ImageError(format!(
            "failed to open {}: {}",
            path.as_ref().display(),
            err
        ))
    })?;
    debug!(width = img.width(), height = img.height(), "image loaded");
    Ok(img.to_rgb8())
}

/// Decode an in-memory encoded still as an RGB frame.
pub fn decode_rgb(data: &[u8]) -> Result<RgbImage> {
    let img = image::load_from_memory(data)
        .map_err(|err| QuadsightError::ImageError(format!("failed to decode image: {err}")))?;
    Ok(img.to_rgb8())
}
