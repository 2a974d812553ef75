// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image-processing primitives consumed by the detector as black boxes.
//
// `ImageOps` is the seam: the detector only relies on the documented
// input/output contract of each operation. `ImageprocOps` is the default
// backend built on the `image` and `imageproc` crates.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{BorderType, find_contours};
use imageproc::geometry::{approximate_polygon_dp, arc_length, oriented_contour_area};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use quadsight_core::error::{QuadsightError, Result};
use tracing::trace;

/// Contour vertex in integer working-frame pixel coordinates.
pub type PixelPoint = imageproc::point::Point<i32>;

/// Contract for the image-processing library behind the detector.
pub trait ImageOps: Send + Sync {
    /// Resample an RGB frame to exactly `width` x `height`.
    fn resize(&self, frame: &RgbImage, width: u32, height: u32) -> Result<RgbImage>;

    /// Binary edge mask (0 / 255) of an RGB frame: grayscale, Sobel gradient
    /// magnitude, then `> threshold`.
    fn edge_mask(&self, frame: &RgbImage, threshold: u8) -> Result<GrayImage>;

    /// Outermost contours of the non-zero regions of `mask`, in discovery
    /// order. Holes and contours nested inside holes are not reported.
    fn trace_external_contours(&self, mask: &GrayImage) -> Result<Vec<Vec<PixelPoint>>>;

    /// Signed shoelace area; the sign follows the winding direction.
    fn contour_area(&self, contour: &[PixelPoint]) -> f64;

    fn arc_length(&self, contour: &[PixelPoint], closed: bool) -> f64;

    /// Douglas–Peucker simplification of a closed contour. A non-positive
    /// `epsilon` keeps the contour unchanged.
    fn approximate_polygon(&self, contour: &[PixelPoint], epsilon: f64) -> Vec<PixelPoint>;

    /// Whether the polygon, taken as closed, is convex.
    fn is_convex(&self, polygon: &[PixelPoint]) -> bool;
}

/// Default primitives backed by `image` / `imageproc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageprocOps;

impl ImageOps for ImageprocOps {
    fn resize(&self, frame: &RgbImage, width: u32, height: u32) -> Result<RgbImage> {
        if width == 0 || height == 0 {
            return Err(QuadsightError::ImageError(format!(
                "cannot resize to {width}x{height}"
            )));
        }
        Ok(imageops::resize(frame, width, height, FilterType::Triangle))
    }

    fn edge_mask(&self, frame: &RgbImage, threshold: u8) -> Result<GrayImage> {
        let gray = imageops::grayscale(frame);
        let gx = horizontal_sobel(&gray);
        let gy = vertical_sobel(&gray);

        // Each absolute gradient saturates at 255, then both are averaged
        // with round-half-up.
        let mask = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            let ax = gx.get_pixel(x, y).0[0].unsigned_abs().min(255);
            let ay = gy.get_pixel(x, y).0[0].unsigned_abs().min(255);
            let magnitude = (ax + ay + 1) / 2;
            if magnitude > u16::from(threshold) {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });
        Ok(mask)
    }

    fn trace_external_contours(&self, mask: &GrayImage) -> Result<Vec<Vec<PixelPoint>>> {
        // A uniform mask has no foreground/background boundary.
        let has_background = mask.pixels().any(|p| p.0[0] == 0);
        let has_foreground = mask.pixels().any(|p| p.0[0] != 0);
        if !has_background || !has_foreground {
            return Ok(Vec::new());
        }

        let contours = find_contours::<i32>(mask);
        let total = contours.len();
        let external: Vec<Vec<PixelPoint>> = contours
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .map(|c| c.points)
            .collect();
        trace!(total, external = external.len(), "contours traced");
        Ok(external)
    }

    fn contour_area(&self, contour: &[PixelPoint]) -> f64 {
        oriented_contour_area(contour)
    }

    fn arc_length(&self, contour: &[PixelPoint], closed: bool) -> f64 {
        arc_length(contour, closed)
    }

    fn approximate_polygon(&self, contour: &[PixelPoint], epsilon: f64) -> Vec<PixelPoint> {
        // `approximate_polygon_dp` panics on an empty curve or epsilon <= 0,
        // and needs distinct end points to form its first split line.
        let contour = match contour {
            [first, rest @ .., last] if !rest.is_empty() && first == last => {
                &contour[..contour.len() - 1]
            }
            _ => contour,
        };
        if contour.len() < 3 || !(epsilon.is_finite() && epsilon > 0.0) {
            return contour.to_vec();
        }
        approximate_polygon_dp(contour, epsilon, true)
    }

    fn is_convex(&self, polygon: &[PixelPoint]) -> bool {
        is_convex_polygon(polygon)
    }
}

/// Every turn goes the same way. Collinear vertices are ignored.
fn is_convex_polygon(polygon: &[PixelPoint]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut positive = false;
    let mut negative = false;
    for i in 0..n {
        let (a, b, c) = (polygon[i], polygon[(i + 1) % n], polygon[(i + 2) % n]);
        let cross = i64::from(b.x - a.x) * i64::from(c.y - b.y)
            - i64::from(b.y - a.y) * i64::from(c.x - b.x);
        positive |= cross > 0;
        negative |= cross < 0;
        if positive && negative {
            return false;
        }
    }
    positive || negative
}
