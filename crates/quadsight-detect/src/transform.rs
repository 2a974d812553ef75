// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scale chain — the ordered resampling factors between the working frame,
// the captured frame, and the display surface.
//
// A chain is built fresh for every frame (preview and display sizes can both
// change mid-session) and lives only in that frame's context.

use quadsight_core::error::{QuadsightError, Result};
use quadsight_core::{CoordSpace, Display, Point, SpaceKind, Working};

use crate::geometry::scale;

/// One resampling step: multiply `(x, y)` by `(fx, fy)` to go `from → to`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleLink {
    pub from: SpaceKind,
    pub to: SpaceKind,
    pub fx: f64,
    pub fy: f64,
}

/// Contiguous sequence of scale links.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScaleChain {
    links: Vec<ScaleLink>,
}

impl ScaleChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn links(&self) -> &[ScaleLink] {
        &self.links
    }

    /// Append the step `S → T`.
    ///
    /// The step must start where the previous one ended, and both factors
    /// must be finite and positive.
    pub fn push<S: CoordSpace, T: CoordSpace>(&mut self, fx: f64, fy: f64) -> Result<()> {
        self.push_link(ScaleLink {
            from: S::KIND,
            to: T::KIND,
            fx,
            fy,
        })
    }

    pub fn push_link(&mut self, link: ScaleLink) -> Result<()> {
        if !(link.fx.is_finite() && link.fy.is_finite() && link.fx > 0.0 && link.fy > 0.0) {
            return Err(QuadsightError::TransformChain(format!(
                "{} -> {} factor ({}, {}) is not a positive finite scale",
                link.from, link.to, link.fx, link.fy
            )));
        }
        if link.from == link.to {
            return Err(QuadsightError::TransformChain(format!(
                "link from {} to itself",
                link.from
            )));
        }
        if let Some(last) = self.links.last() {
            if last.to != link.from {
                return Err(QuadsightError::TransformChain(format!(
                    "link {} -> {} does not continue from {}",
                    link.from, link.to, last.to
                )));
            }
        }
        self.links.push(link);
        Ok(())
    }

    /// Net `(fx, fy)` from `from` to `to`, multiplying every link on the way.
    pub fn factor(&self, from: SpaceKind, to: SpaceKind) -> Result<(f64, f64)> {
        if from == to {
            return Ok((1.0, 1.0));
        }
        let start = self
            .links
            .iter()
            .position(|link| link.from == from)
            .ok_or_else(|| {
                QuadsightError::TransformChain(format!("no link starts at {from}"))
            })?;

        let (mut fx, mut fy) = (1.0, 1.0);
        for link in &self.links[start..] {
            fx *= link.fx;
            fy *= link.fy;
            if link.to == to {
                return Ok((fx, fy));
            }
        }
        Err(QuadsightError::TransformChain(format!(
            "chain from {from} never reaches {to}"
        )))
    }

    /// Move a point between two spaces along the chain.
    pub fn map<S: CoordSpace, T: CoordSpace>(&self, p: Point<S>) -> Result<Point<T>> {
        let (fx, fy) = self.factor(S::KIND, T::KIND)?;
        Ok(scale(p, fx, fy).cast())
    }

    pub fn to_display_space(&self, p: Point<Working>) -> Result<Point<Display>> {
        self.map::<Working, Display>(p)
    }
}
