// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Candidate extraction — edge mask to convex, area-filtered polygons.

use image::GrayImage;
use quadsight_core::error::Result;
use quadsight_core::{DetectorConfig, Point, Working};
use tracing::{debug, trace};

use crate::primitives::{ImageOps, PixelPoint};

/// A simplified contour that survived the area and convexity filters.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonCandidate {
    /// Simplified vertices in working-frame coordinates.
    pub vertices: Vec<Point<Working>>,
    /// Area enclosed by the source contour (not the simplified polygon).
    pub area: f64,
    pub convex: bool,
}

impl PolygonCandidate {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }
}

/// Turns traced contours into polygon candidates.
#[derive(Debug, Clone, Copy)]
pub struct CandidateExtractor {
    /// Minimum `|area|` as a share of the mask area.
    pub min_area_ratio: f64,
    /// Simplification tolerance as a share of the contour perimeter.
    pub epsilon_ratio: f64,
}

impl Default for CandidateExtractor {
    fn default() -> Self {
        Self::from_config(&DetectorConfig::default())
    }
}

impl CandidateExtractor {
    pub fn from_config(config: &DetectorConfig) -> Self {
        Self {
            min_area_ratio: config.min_area_ratio,
            epsilon_ratio: config.approx_epsilon_ratio,
        }
    }

    /// Trace `mask` and filter its external contours into candidates.
    pub fn extract(&self, ops: &dyn ImageOps, mask: &GrayImage) -> Result<Vec<PolygonCandidate>> {
        let contours = ops.trace_external_contours(mask)?;
        let mask_area = f64::from(mask.width()) * f64::from(mask.height());
        Ok(self.filter_contours(ops, contours, mask_area))
    }

    /// Area filter, simplification, and convexity filter over already traced
    /// contours. Output keeps the input order.
    pub fn filter_contours(
        &self,
        ops: &dyn ImageOps,
        contours: Vec<Vec<PixelPoint>>,
        mask_area: f64,
    ) -> Vec<PolygonCandidate> {
        let min_area = mask_area * self.min_area_ratio;
        let traced = contours.len();

        let candidates: Vec<PolygonCandidate> = contours
            .into_iter()
            .filter_map(|contour| {
                let area = ops.contour_area(&contour);
                if area.abs() < min_area {
                    trace!(area, min_area, "contour below area threshold");
                    return None;
                }
                let epsilon = ops.arc_length(&contour, true) * self.epsilon_ratio;
                let polygon = ops.approximate_polygon(&contour, epsilon);
                if !ops.is_convex(&polygon) {
                    trace!(vertices = polygon.len(), "simplified contour not convex");
                    return None;
                }
                Some(PolygonCandidate {
                    vertices: polygon
                        .iter()
                        .map(|p| Point::new(f64::from(p.x), f64::from(p.y)))
                        .collect(),
                    area,
                    convex: true,
                })
            })
            .collect();

        debug!(traced, kept = candidates.len(), "candidates extracted");
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::ImageprocOps;
    use image::Luma;

    fn pp(x: i32, y: i32) -> PixelPoint {
        PixelPoint::new(x, y)
    }

    /// Unit-step outline through axis-aligned `corners`, closed implicitly.
    fn outline(corners: &[(i32, i32)]) -> Vec<PixelPoint> {
        let mut pts = Vec::new();
        for (i, &(x0, y0)) in corners.iter().enumerate() {
            let (x1, y1) = corners[(i + 1) % corners.len()];
            let steps = (x1 - x0).abs().max((y1 - y0).abs());
            for k in 0..steps {
                pts.push(pp(x0 + (x1 - x0).signum() * k, y0 + (y1 - y0).signum() * k));
            }
        }
        pts
    }

    fn rect_contour(x0: i32, y0: i32, x1: i32, y1: i32) -> Vec<PixelPoint> {
        outline(&[(x0, y0), (x1, y0), (x1, y1), (x0, y1)])
    }

    #[test]
    fn contours_below_one_percent_are_never_emitted() {
        let extractor = CandidateExtractor::default();
        let mask_area = 100.0 * 100.0;
        // 9x9 = 81 < 100 (1%), 11x11 = 121 > 100
        for (side, expect_kept) in [(5, false), (9, false), (11, true), (40, true)] {
            let contour = rect_contour(10, 10, 10 + side, 10 + side);
            let kept = extractor.filter_contours(&ImageprocOps, vec![contour], mask_area);
            assert_eq!(!kept.is_empty(), expect_kept, "side {side}");
        }
    }

    #[test]
    fn kept_candidates_are_convex_and_carry_contour_area() {
        let extractor = CandidateExtractor::default();
        let contour = rect_contour(0, 0, 50, 30);
        let kept = extractor.filter_contours(&ImageprocOps, vec![contour], 10_000.0);
        assert_eq!(kept.len(), 1);
        assert!(kept[0].convex);
        assert_eq!(kept[0].vertex_count(), 4);
        assert!((kept[0].area.abs() - 1500.0).abs() < 1e-6);
    }

    #[test]
    fn non_convex_outline_is_rejected() {
        // L-shape: big enough, but its simplification keeps a reflex corner.
        let l_shape = outline(&[(0, 0), (80, 0), (80, 20), (20, 20), (20, 80), (0, 80)]);
        let extractor = CandidateExtractor {
            min_area_ratio: 0.01,
            epsilon_ratio: 0.01,
        };
        let kept = extractor.filter_contours(&ImageprocOps, vec![l_shape], 10_000.0);
        assert!(kept.is_empty());
    }

    #[test]
    fn discovery_order_is_preserved() {
        let extractor = CandidateExtractor::default();
        let small = rect_contour(0, 0, 20, 20);
        let large = rect_contour(30, 30, 90, 90);
        let kept = extractor.filter_contours(&ImageprocOps, vec![small, large], 10_000.0);
        assert_eq!(kept.len(), 2);
        assert!(kept[0].area.abs() < kept[1].area.abs());
    }

    #[test]
    fn blank_masks_give_no_candidates() {
        let extractor = CandidateExtractor::default();
        let black = GrayImage::new(400, 400);
        let white = GrayImage::from_pixel(400, 400, Luma([255u8]));
        assert!(extractor.extract(&ImageprocOps, &black).unwrap().is_empty());
        assert!(extractor.extract(&ImageprocOps, &white).unwrap().is_empty());
    }
}
