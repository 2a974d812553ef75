// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quadsight Live — runs the single-frame detector over a stream of camera
// frames. One frame in flight at a time, strictly in arrival order, with a
// bounded queue in front of the worker and results delivered over a channel.

pub mod session;
pub mod source;

pub use session::{DetectionSession, FrameDetection, SessionHandle, SessionStats};
pub use source::{FrameSource, SourceEvent, StillImageSource, pump};
