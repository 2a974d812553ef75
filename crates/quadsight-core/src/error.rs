// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Quadsight, plus the classification that decides
// whether an error is contained to one frame or ends the session.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for all Quadsight operations.
#[derive(Debug, Error)]
pub enum QuadsightError {
    // -- Frame errors --
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("empty frame ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("scale chain broken: {0}")]
    TransformChain(String),

    // -- Session errors --
    #[error("capture device unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("detection session is closed")]
    SessionClosed,

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, QuadsightError>;

/// How far the effects of an error reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Confined to the current frame. Drop it and carry on with the next.
    Transient,
    /// Ends the live-detection session; the caller tears down or restarts.
    Session,
    /// Not related to frame flow at all (bad config file, I/O).
    Permanent,
}

/// Classify a `QuadsightError` for the session worker and its callers.
pub fn classify_error(err: &QuadsightError) -> ErrorClass {
    match err {
        QuadsightError::MalformedFrame(_)
        | QuadsightError::EmptyFrame { .. }
        | QuadsightError::ImageError(_)
        | QuadsightError::TransformChain(_) => ErrorClass::Transient,

        QuadsightError::ResourceUnavailable(_) | QuadsightError::SessionClosed => {
            ErrorClass::Session
        }

        QuadsightError::Config(_)
        | QuadsightError::Io(_)
        | QuadsightError::Serialization(_) => ErrorClass::Permanent,
    }
}
