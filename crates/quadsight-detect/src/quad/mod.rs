// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quadrilateral search — candidate extraction from an edge mask and the
// first-match selection over those candidates.

pub mod candidates;
pub mod selector;

pub use candidates::{CandidateExtractor, PolygonCandidate};
pub use selector::{QuadSelector, corner_cosines};
