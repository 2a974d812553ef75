// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// quadsight-detect — Document outline detection for Quadsight.
//
// Turns one camera frame into at most one quadrilateral in display
// coordinates: colour/orientation normalization, downscaling, edge mask,
// contour candidates, first-match selection, and scale-back.

pub mod detector;
pub mod frame;
pub mod geometry;
pub mod primitives;
pub mod quad;
pub mod transform;

// Re-export the primary types so callers can use `quadsight_detect::QuadDetector` etc.
pub use detector::{QuadDetector, Stage};
pub use frame::Frame;
pub use primitives::{ImageOps, ImageprocOps, PixelPoint};
pub use quad::{CandidateExtractor, PolygonCandidate, QuadSelector};
pub use transform::{ScaleChain, ScaleLink};
