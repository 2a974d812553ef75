// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Colour and orientation normalization: raw sensor bytes in, upright RGB out.

use image::{DynamicImage, GrayImage, Rgb, RgbImage, RgbaImage, imageops};
use quadsight_core::error::{QuadsightError, Result};
use quadsight_core::{Orientation, PixelFormat, RawFrame};
use tracing::{debug, instrument};

use super::Frame;

/// Decode `raw` to RGB and turn it to display orientation.
///
/// Always yields `Frame::Rgb`. Rotations by a quarter turn swap width and
/// height, so downstream scale factors must be taken from the returned frame,
/// never from the raw one.
#[instrument(skip(raw), fields(width = raw.width, height = raw.height, format = ?raw.format))]
pub fn normalize(raw: &RawFrame, orientation: Orientation) -> Result<Frame> {
    raw.validate()?;

    let rgb = match raw.format {
        PixelFormat::Nv21 => decode_nv21(&raw.data, raw.width, raw.height),
        PixelFormat::Rgb8 => {
            let len = PixelFormat::Rgb8
                .buffer_size(raw.width, raw.height)
                .ok_or_else(|| malformed(raw))?;
            RgbImage::from_raw(raw.width, raw.height, raw.data[..len].to_vec())
                .ok_or_else(|| malformed(raw))?
        }
        PixelFormat::Rgba8 => {
            let len = PixelFormat::Rgba8
                .buffer_size(raw.width, raw.height)
                .ok_or_else(|| malformed(raw))?;
            let rgba = RgbaImage::from_raw(raw.width, raw.height, raw.data[..len].to_vec())
                .ok_or_else(|| malformed(raw))?;
            DynamicImage::ImageRgba8(rgba).to_rgb8()
        }
        PixelFormat::Gray8 => {
            let len = PixelFormat::Gray8
                .buffer_size(raw.width, raw.height)
                .ok_or_else(|| malformed(raw))?;
            let gray = GrayImage::from_raw(raw.width, raw.height, raw.data[..len].to_vec())
                .ok_or_else(|| malformed(raw))?;
            DynamicImage::ImageLuma8(gray).to_rgb8()
        }
    };

    let oriented = orient(rgb, orientation);
    debug!(
        out_w = oriented.width(),
        out_h = oriented.height(),
        ?orientation,
        "frame normalized"
    );
    Ok(Frame::Rgb(oriented))
}

fn malformed(raw: &RawFrame) -> QuadsightError {
    QuadsightError::MalformedFrame(format!(
        "{:?} buffer does not fit {}x{}",
        raw.format, raw.width, raw.height
    ))
}

/// Apply the sensor-to-display orientation fix to the pixel buffer.
pub fn orient(rgb: RgbImage, orientation: Orientation) -> RgbImage {
    match orientation {
        Orientation::Upright => rgb,
        // transpose + horizontal flip
        Orientation::Rotate90Clockwise => imageops::rotate90(&rgb),
        Orientation::Rotate180 => imageops::rotate180(&rgb),
        Orientation::Rotate90CounterClockwise => imageops::rotate270(&rgb),
        Orientation::Mirrored => imageops::flip_horizontal(&rgb),
    }
}

/// NV21 → RGB with the BT.601 limited-range coefficients.
///
/// Layout: `width * height` luma bytes, then `width * height / 2` bytes of
/// interleaved V,U pairs, one pair per 2x2 block. Caller has validated the
/// length and even dimensions.
fn decode_nv21(data: &[u8], width: u32, height: u32) -> RgbImage {
    let w = width as usize;
    let luma_len = w * height as usize;

    RgbImage::from_fn(width, height, |x, y| {
        let (xi, yi) = (x as usize, y as usize);
        let luma = f32::from(data[yi * w + xi]);
        let uv = luma_len + (yi / 2) * w + (xi & !1);
        let v = f32::from(data[uv]) - 128.0;
        let u = f32::from(data[uv + 1]) - 128.0;

        let c = 1.164 * (luma - 16.0).max(0.0);
        let r = c + 1.596 * v;
        let g = c - 0.813 * v - 0.391 * u;
        let b = c + 2.018 * u;
        Rgb([clamp_channel(r), clamp_channel(g), clamp_channel(b)])
    })
}

fn clamp_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
