// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Single-frame detection pipeline.
//
// Received → Normalized → Downscaled → EdgeExtracted → CandidatesExtracted
// → Selected → Scaled → Emitted. A failure at any stage returns the error
// and nothing else; there is no partially built result.

use std::sync::Arc;
use std::time::Instant;

use image::{GrayImage, RgbImage};
use quadsight_core::error::{QuadsightError, Result};
use quadsight_core::{
    Captured, DetectionResult, DetectorConfig, Display, Point, Quadrilateral, RawFrame, Working,
};
use tracing::{debug, instrument, trace};

use crate::frame::{Frame, normalize};
use crate::geometry::order_by_radial_distance;
use crate::primitives::{ImageOps, ImageprocOps};
use crate::quad::{CandidateExtractor, PolygonCandidate, QuadSelector};
use crate::transform::ScaleChain;

/// Pipeline position of the frame being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Normalized,
    Downscaled,
    EdgeExtracted,
    CandidatesExtracted,
    Selected,
    Scaled,
    Emitted,
}

/// Everything one invocation accumulates. Never shared between frames.
struct FrameContext {
    stage: Stage,
    started: Instant,
    chain: ScaleChain,
}

impl FrameContext {
    fn new() -> Self {
        Self {
            stage: Stage::Received,
            started: Instant::now(),
            chain: ScaleChain::new(),
        }
    }

    fn advance(&mut self, next: Stage) {
        trace!(
            from = ?self.stage,
            to = ?next,
            elapsed_us = self.started.elapsed().as_micros() as u64,
            "stage complete"
        );
        self.stage = next;
    }
}

/// Finds the document outline in camera frames.
///
/// Holds configuration and the primitives backend only; per-frame state lives
/// in a context created by each call, so one detector can serve many frames
/// (one at a time or from several threads).
pub struct QuadDetector {
    config: DetectorConfig,
    ops: Arc<dyn ImageOps>,
    extractor: CandidateExtractor,
    selector: QuadSelector,
}

impl std::fmt::Debug for QuadDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuadDetector")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl QuadDetector {
    /// Detector with the default `image`/`imageproc` primitives.
    pub fn new(config: DetectorConfig) -> Result<Self> {
        Self::with_ops(config, Arc::new(ImageprocOps))
    }

    /// Detector over a caller-supplied primitives backend.
    pub fn with_ops(config: DetectorConfig, ops: Arc<dyn ImageOps>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            extractor: CandidateExtractor::from_config(&config),
            selector: QuadSelector::from_config(&config),
            config,
            ops,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Full pipeline on a raw camera frame.
    ///
    /// `display_height` is the height of the surface the overlay is drawn on;
    /// the returned corners are in that surface's coordinates.
    #[instrument(
        skip_all,
        fields(
            width = raw.width,
            height = raw.height,
            format = ?raw.format,
            display_height = display_height
        )
    )]
    pub fn detect(&self, raw: &RawFrame, display_height: u32) -> Result<DetectionResult> {
        let mut ctx = FrameContext::new();
        let outcome = normalize(raw, self.config.orientation)
            .and_then(|frame| frame.into_rgb())
            .and_then(|rgb| {
                ctx.advance(Stage::Normalized);
                self.run_from_captured(&mut ctx, rgb, display_height)
            });
        log_outcome(&ctx, &outcome);
        outcome
    }

    /// Pipeline on a frame that is already RGB and upright.
    #[instrument(
        skip_all,
        fields(width = rgb.width(), height = rgb.height(), display_height = display_height)
    )]
    pub fn detect_rgb(&self, rgb: RgbImage, display_height: u32) -> Result<DetectionResult> {
        let mut ctx = FrameContext::new();
        let outcome = if rgb.width() == 0 || rgb.height() == 0 {
            Err(QuadsightError::EmptyFrame {
                width: rgb.width(),
                height: rgb.height(),
            })
        } else {
            ctx.advance(Stage::Normalized);
            self.run_from_captured(&mut ctx, rgb, display_height)
        };
        log_outcome(&ctx, &outcome);
        outcome
    }

    /// Selection and scaling on a binary edge mask at working resolution.
    ///
    /// The mask is taken as both the captured and the working frame, so the
    /// only real factor is mask height to `display_height`.
    #[instrument(
        skip_all,
        fields(width = mask.width(), height = mask.height(), display_height = display_height)
    )]
    pub fn detect_mask(&self, mask: &GrayImage, display_height: u32) -> Result<DetectionResult> {
        let mut ctx = FrameContext::new();
        let outcome = self.run_from_mask(&mut ctx, mask, display_height);
        log_outcome(&ctx, &outcome);
        outcome
    }

    /// Candidates of a binary edge mask, in discovery order.
    pub fn candidates(&self, mask: &GrayImage) -> Result<Vec<PolygonCandidate>> {
        self.extractor.extract(self.ops.as_ref(), mask)
    }

    // -- Stages ---------------------------------------------------------------

    fn run_from_captured(
        &self,
        ctx: &mut FrameContext,
        captured: RgbImage,
        display_height: u32,
    ) -> Result<DetectionResult> {
        let captured_height = captured.height();
        let working = self.downscale(&mut ctx.chain, captured)?;
        ctx.advance(Stage::Downscaled);

        push_display_link(&mut ctx.chain, captured_height, display_height)?;

        let mask = self.extract_edges(&working)?.into_luma()?;
        ctx.advance(Stage::EdgeExtracted);

        self.select_and_scale(ctx, &mask)
    }

    fn run_from_mask(
        &self,
        ctx: &mut FrameContext,
        mask: &GrayImage,
        display_height: u32,
    ) -> Result<DetectionResult> {
        if mask.width() == 0 || mask.height() == 0 {
            return Err(QuadsightError::EmptyFrame {
                width: mask.width(),
                height: mask.height(),
            });
        }
        ctx.chain.push::<Working, Captured>(1.0, 1.0)?;
        push_display_link(&mut ctx.chain, mask.height(), display_height)?;
        ctx.advance(Stage::EdgeExtracted);
        self.select_and_scale(ctx, mask)
    }

    /// Binary edge mask of the working frame.
    fn extract_edges(&self, working: &RgbImage) -> Result<Frame> {
        let mask = self.ops.edge_mask(working, self.config.edge_threshold)?;
        Ok(Frame::Luma(mask))
    }

    fn select_and_scale(
        &self,
        ctx: &mut FrameContext,
        mask: &GrayImage,
    ) -> Result<DetectionResult> {
        let candidates = self.extractor.extract(self.ops.as_ref(), mask)?;
        ctx.advance(Stage::CandidatesExtracted);

        let selected = self.selector.select(&candidates);
        ctx.advance(Stage::Selected);

        let Some(quad) = selected else {
            ctx.advance(Stage::Emitted);
            return Ok(DetectionResult::NotFound);
        };

        let mut corners = [Point::<Display>::new(0.0, 0.0); 4];
        for (slot, corner) in corners.iter_mut().zip(quad) {
            *slot = ctx.chain.to_display_space(corner)?;
        }
        ctx.advance(Stage::Scaled);

        let ordered = order_by_radial_distance(corners);
        let result = DetectionResult::Quadrilateral(Quadrilateral::from_ordered(ordered));
        ctx.advance(Stage::Emitted);
        Ok(result)
    }

    /// Shrink (or grow) the captured frame to fit a `working_size` square,
    /// keeping its aspect, and record the working → captured factor.
    fn downscale(&self, chain: &mut ScaleChain, captured: RgbImage) -> Result<RgbImage> {
        let (width, height) = captured.dimensions();
        let target = f64::from(self.config.working_size);
        let ratio = (f64::from(width) / target).max(f64::from(height) / target);
        let work_w = ((f64::from(width) / ratio) as u32).max(1);
        let work_h = ((f64::from(height) / ratio) as u32).max(1);

        let working = if (work_w, work_h) == (width, height) {
            captured
        } else {
            self.ops.resize(&captured, work_w, work_h)?
        };
        debug!(width, height, work_w, work_h, "frame downscaled");

        chain.push::<Working, Captured>(
            f64::from(width) / f64::from(work_w),
            f64::from(height) / f64::from(work_h),
        )?;
        Ok(working)
    }
}

/// Captured → display factor: the display height over the captured height,
/// applied to both axes.
fn push_display_link(
    chain: &mut ScaleChain,
    captured_height: u32,
    display_height: u32,
) -> Result<()> {
    let factor = f64::from(display_height) / f64::from(captured_height);
    chain.push::<Captured, Display>(factor, factor)
}

fn log_outcome(ctx: &FrameContext, outcome: &Result<DetectionResult>) {
    let elapsed_us = ctx.started.elapsed().as_micros() as u64;
    match outcome {
        Ok(result) => debug!(found = result.is_found(), elapsed_us, "detection finished"),
        Err(err) => debug!(stage = ?ctx.stage, error = %err, elapsed_us, "detection failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};
    use quadsight_core::{Orientation, PixelFormat};

    fn square_mask(size: u32, from: u32, to: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            if (from..to).contains(&x) && (from..to).contains(&y) {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        })
    }

    fn upright() -> DetectorConfig {
        DetectorConfig {
            orientation: Orientation::Upright,
            ..DetectorConfig::default()
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = DetectorConfig {
            working_size: 0,
            ..DetectorConfig::default()
        };
        assert!(QuadDetector::new(config).is_err());
    }

    #[test]
    fn mask_square_maps_to_display_corners() {
        let detector = QuadDetector::new(upright()).unwrap();
        // 200 px square centred in 400x400, display twice as tall.
        let mask = square_mask(400, 100, 300);
        let result = detector.detect_mask(&mask, 800).unwrap();
        let quad = result.quadrilateral().expect("square should be detected");

        let expected = [(200.0, 200.0), (598.0, 200.0), (200.0, 598.0), (598.0, 598.0)];
        for corner in quad.corners {
            assert!(
                expected
                    .iter()
                    .any(|&(x, y)| (corner.x - x).abs() <= 4.0 && (corner.y - y).abs() <= 4.0),
                "unexpected corner {corner:?}"
            );
        }
        // nearest corner first, farthest last
        assert!((quad.corners[0].x - 200.0).abs() <= 4.0);
        assert!((quad.corners[3].y - 598.0).abs() <= 4.0);
    }

    #[test]
    fn blank_mask_is_not_found() {
        let detector = QuadDetector::new(upright()).unwrap();
        let result = detector.detect_mask(&GrayImage::new(400, 400), 800).unwrap();
        assert_eq!(result, DetectionResult::NotFound);
    }

    #[test]
    fn zero_display_height_fails_the_frame() {
        let detector = QuadDetector::new(upright()).unwrap();
        let mask = square_mask(400, 100, 300);
        assert!(matches!(
            detector.detect_mask(&mask, 0),
            Err(QuadsightError::TransformChain(_))
        ));
    }

    #[test]
    fn rgb_frame_is_downscaled_and_scaled_back() {
        let detector = QuadDetector::new(upright()).unwrap();
        // 800x800 bright page on dark background: working frame is 400x400.
        let rgb = RgbImage::from_fn(800, 800, |x, y| {
            if (200..600).contains(&x) && (200..600).contains(&y) {
                Rgb([240, 240, 240])
            } else {
                Rgb([20, 20, 20])
            }
        });
        let result = detector.detect_rgb(rgb, 800).unwrap();
        let quad = result.quadrilateral().expect("page should be detected");
        let [p0, _, _, p3] = quad.corners;
        // Edge ring sits one working pixel outside the page: ~2 display px.
        assert!(
            (p0.x - 200.0).abs() <= 8.0 && (p0.y - 200.0).abs() <= 8.0,
            "{p0:?}"
        );
        assert!(
            (p3.x - 600.0).abs() <= 8.0 && (p3.y - 600.0).abs() <= 8.0,
            "{p3:?}"
        );
    }

    #[test]
    fn uniform_raw_frame_is_not_found() {
        let detector = QuadDetector::new(DetectorConfig::default()).unwrap();
        let mut data = vec![90u8; 64 * 48];
        data.extend(std::iter::repeat_n(128u8, 64 * 48 / 2));
        let raw = RawFrame::new(data, 64, 48, PixelFormat::Nv21);
        assert_eq!(
            detector.detect(&raw, 1920).unwrap(),
            DetectionResult::NotFound
        );
    }

    #[test]
    fn malformed_raw_frame_is_an_error_not_a_result() {
        let detector = QuadDetector::new(DetectorConfig::default()).unwrap();
        let raw = RawFrame::new(vec![0; 10], 64, 48, PixelFormat::Nv21);
        assert!(matches!(
            detector.detect(&raw, 1920),
            Err(QuadsightError::MalformedFrame(_))
        ));
        let empty = RawFrame::new(Vec::new(), 0, 0, PixelFormat::Nv21);
        assert!(matches!(
            detector.detect(&empty, 1920),
            Err(QuadsightError::EmptyFrame { .. })
        ));
    }

    #[test]
    fn edge_stage_hands_on_a_single_channel_mask() {
        let detector = QuadDetector::new(upright()).unwrap();
        let working = RgbImage::from_pixel(40, 30, Rgb([90, 90, 90]));
        let edges = detector.extract_edges(&working).unwrap();
        assert_eq!(edges.format(), PixelFormat::Gray8);
        assert_eq!((edges.width(), edges.height()), (40, 30));
        assert!(edges.into_rgb().is_err());
    }
}
