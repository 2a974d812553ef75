// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Frame sources and the pump that feeds one into a detection session.

use std::collections::VecDeque;
use std::future::Future;
use std::path::PathBuf;

use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use quadsight_core::error::{ErrorClass, QuadsightError, Result, classify_error};
use quadsight_core::{PixelFormat, RawFrame};
use quadsight_detect::frame::decode_rgb;

use crate::session::{DetectionSession, SessionStats};

/// Something the capture side reports.
#[derive(Debug, Clone)]
pub enum SourceEvent {
    Frame(RawFrame),
    /// The preview surface changed size. Later frames carry the new
    /// dimensions themselves; nothing cached needs invalidating.
    PreviewResized { width: u32, height: u32 },
}

/// Asynchronous producer of camera frames.
///
/// `Ok(None)` is end of stream. Losing the device is
/// `Err(QuadsightError::ResourceUnavailable)`.
pub trait FrameSource {
    fn next_event(&mut self) -> impl Future<Output = Result<Option<SourceEvent>>> + Send;
}

/// Feed `source` into `session` until the stream ends or fails.
///
/// Each frame is submitted with the display height current at that moment.
/// End of stream drains the queue; a session-level source error shuts the
/// session down first and is then returned. Frame-level source errors skip
/// that frame.
#[instrument(skip_all)]
pub async fn pump<S: FrameSource>(
    source: &mut S,
    session: DetectionSession,
    display_height: watch::Receiver<u32>,
) -> Result<SessionStats> {
    loop {
        let event = match source.next_event().await {
            Ok(event) => event,
            Err(err) if classify_error(&err) == ErrorClass::Transient => {
                warn!(error = %err, "frame source skipped a frame");
                continue;
            }
            Err(err) => {
                error!(error = %err, "frame source failed, shutting session down");
                session.shutdown().await;
                return Err(err);
            }
        };

        match event {
            Some(SourceEvent::Frame(frame)) => {
                let height = *display_height.borrow();
                if let Err(err) = session.submit(frame, height) {
                    session.shutdown().await;
                    return Err(err);
                }
            }
            Some(SourceEvent::PreviewResized { width, height }) => {
                info!(width, height, "preview resized");
            }
            None => {
                debug!("frame source exhausted");
                return Ok(session.finish().await);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Still images
// ---------------------------------------------------------------------------

/// Replays encoded still images (PNG, JPEG, ...) as RGB frames, in order.
///
/// Emits `PreviewResized` whenever an image's dimensions differ from the
/// previous one. A file that cannot be decoded is reported as a frame-level
/// error; one that cannot be read ends the stream with an I/O error.
pub struct StillImageSource {
    paths: VecDeque<PathBuf>,
    last_size: Option<(u32, u32)>,
    held: Option<RawFrame>,
}

impl StillImageSource {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
            last_size: None,
            held: None,
        }
    }

    /// Every regular file in `dir`, sorted by name.
    pub fn from_dir(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                paths.push(entry.path());
            }
        }
        paths.sort();
        info!(dir = %dir.display(), images = paths.len(), "still image source opened");
        Ok(Self::new(paths))
    }

    pub fn remaining(&self) -> usize {
        self.paths.len() + usize::from(self.held.is_some())
    }

    async fn read_next(&mut self) -> Result<Option<SourceEvent>> {
        if let Some(frame) = self.held.take() {
            return Ok(Some(SourceEvent::Frame(frame)));
        }
        let Some(path) = self.paths.pop_front() else {
            return Ok(None);
        };

        let bytes = tokio::fs::read(&path).await?;
        let rgb = decode_rgb(&bytes).map_err(|err| {
            QuadsightError::ImageError(format!("{}: {err}", path.display()))
        })?;
        let (width, height) = rgb.dimensions();
        debug!(path = %path.display(), width, height, "still image decoded");
        let frame = RawFrame::new(rgb.into_raw(), width, height, PixelFormat::Rgb8);

        let resized = self.last_size.is_some_and(|size| size != (width, height));
        self.last_size = Some((width, height));
        if resized {
            self.held = Some(frame);
            return Ok(Some(SourceEvent::PreviewResized { width, height }));
        }
        Ok(Some(SourceEvent::Frame(frame)))
    }
}

impl FrameSource for StillImageSource {
    fn next_event(&mut self) -> impl Future<Output = Result<Option<SourceEvent>>> + Send {
        self.read_next()
    }
}
