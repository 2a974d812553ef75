// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types: coordinate spaces, points, raw camera frames, and the
// per-frame detection result.

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::error::{QuadsightError, Result};

/// Sequence number assigned to a frame when it enters a detection session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FrameId(pub u64);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Coordinate spaces
// ---------------------------------------------------------------------------

/// Runtime tag for a coordinate space, used by scale-chain links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpaceKind {
    /// Downsampled frame the edge and contour analysis runs on.
    Working,
    /// Normalized (oriented) frame at sensor resolution.
    Captured,
    /// Surface the overlay is drawn onto.
    Display,
}

impl fmt::Display for SpaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Working => "working",
            Self::Captured => "captured",
            Self::Display => "display",
        };
        f.write_str(name)
    }
}

/// Compile-time marker for a coordinate space.
pub trait CoordSpace: Copy + fmt::Debug + PartialEq + Send + Sync + 'static {
    const KIND: SpaceKind;
}

/// Working-resolution pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Working;

/// Captured-frame pixel coordinates (after orientation normalization).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Captured;

/// Display-surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Display;

impl CoordSpace for Working {
    const KIND: SpaceKind = SpaceKind::Working;
}

impl CoordSpace for Captured {
    const KIND: SpaceKind = SpaceKind::Captured;
}

impl CoordSpace for Display {
    const KIND: SpaceKind = SpaceKind::Display;
}

/// A 2D point tagged with the coordinate space it lives in.
///
/// Points in different spaces are different types; moving between them goes
/// through a scale chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point<S: CoordSpace> {
    pub x: f64,
    pub y: f64,
    #[serde(skip)]
    space: PhantomData<S>,
}

impl<S: CoordSpace> Point<S> {
    pub const fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            space: PhantomData,
        }
    }

    /// Re-tag the coordinates as belonging to another space.
    ///
    /// Only scale-chain code should call this, after applying the factor
    /// that bridges the two spaces.
    pub fn cast<T: CoordSpace>(self) -> Point<T> {
        Point::new(self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Raw frames
// ---------------------------------------------------------------------------

/// Pixel layout of a raw frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// YUV 4:2:0 semi-planar: full Y plane then interleaved V/U at half
    /// resolution (Android camera preview default).
    Nv21,
    /// Packed 8-bit RGB.
    Rgb8,
    /// Packed 8-bit RGBA.
    Rgba8,
    /// Single-channel 8-bit.
    Gray8,
}

impl PixelFormat {
    /// Number of bytes a `width` x `height` frame occupies in this format,
    /// or `None` if that does not fit in `usize`.
    pub fn buffer_size(&self, width: u32, height: u32) -> Option<usize> {
        let w = usize::try_from(width).ok()?;
        let h = usize::try_from(height).ok()?;
        match self {
            Self::Nv21 => w.checked_mul(h.checked_add(h / 2)?),
            Self::Rgb8 => w.checked_mul(h)?.checked_mul(3),
            Self::Rgba8 => w.checked_mul(h)?.checked_mul(4),
            Self::Gray8 => w.checked_mul(h),
        }
    }
}

/// A camera frame exactly as the frame source delivered it.
#[derive(Clone)]
pub struct RawFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawFrame")
            .field("data_len", &self.data.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .finish()
    }
}

impl RawFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            data,
            width,
            height,
            format,
        }
    }

    /// Check dimensions and buffer length against the pixel format.
    ///
    /// Trailing bytes beyond the expected size (row padding from some camera
    /// HALs) are tolerated; a short buffer is not.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(QuadsightError::EmptyFrame {
                width: self.width,
                height: self.height,
            });
        }
        if self.format == PixelFormat::Nv21 && (self.width % 2 != 0 || self.height % 2 != 0) {
            return Err(QuadsightError::MalformedFrame(format!(
                "NV21 frame needs even dimensions, got {}x{}",
                self.width, self.height
            )));
        }
        let Some(expected) = self.format.buffer_size(self.width, self.height) else {
            return Err(QuadsightError::MalformedFrame(format!(
                "{:?} {}x{} is too large to address",
                self.format, self.width, self.height
            )));
        };
        if self.data.len() < expected {
            return Err(QuadsightError::MalformedFrame(format!(
                "{:?} {}x{} needs {} bytes, got {}",
                self.format,
                self.width,
                self.height,
                expected,
                self.data.len()
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Detection result
// ---------------------------------------------------------------------------

/// Four display-space corners, ordered for drawing as `p0 → p1 → p3 → p2 → p0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quadrilateral {
    pub corners: [Point<Display>; 4],
}

impl Quadrilateral {
    /// Wrap corners that are already in radial-distance order.
    pub fn from_ordered(corners: [Point<Display>; 4]) -> Self {
        Self { corners }
    }

    /// The closed outline, first vertex repeated at the end.
    ///
    /// Note the third hop goes to `p3`, not `p2`: with radial ordering the two
    /// middle corners sit on opposite sides, so row-major order would draw a
    /// bow-tie.
    pub fn closed_path(&self) -> [Point<Display>; 5] {
        let [p0, p1, p2, p3] = self.corners;
        [p0, p1, p3, p2, p0]
    }
}

/// Outcome of running detection on one accepted frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DetectionResult {
    /// No qualifying quadrilateral in this frame. The overlay must be cleared.
    NotFound,
    Quadrilateral(Quadrilateral),
}

impl DetectionResult {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Quadrilateral(_))
    }

    pub fn quadrilateral(&self) -> Option<&Quadrilateral> {
        match self {
            Self::Quadrilateral(quad) => Some(quad),
            Self::NotFound => None,
        }
    }

    /// Closed outline to draw, or `None` when the overlay should be empty.
    pub fn closed_path(&self) -> Option<[Point<Display>; 5]> {
        self.quadrilateral().map(Quadrilateral::closed_path)
    }
}
