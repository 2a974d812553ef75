// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Detection session -- a bounded FIFO in front of a single detection worker.
//
// The capture side calls `submit` from whatever thread delivers frames. The
// worker pops one frame, runs the detector on the blocking pool, awaits it,
// and only then pops the next, so frames never overlap and never reorder.
//
// # Overflow
//
// The queue holds at most `max_queued_frames`. A frame arriving at a full
// queue evicts the oldest queued frame (never the one in flight): for a live
// overlay the newest frame is the useful one.
//
// # Lifecycle
//
//   start ─► running ─┬─ finish   ─► queue drained, worker joined
//                     └─ shutdown ─► queue discarded, in-flight frame
//                                    completes, worker joined

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, debug_span, error, info, instrument, warn};

use quadsight_core::error::{ErrorClass, QuadsightError, Result, classify_error};
use quadsight_core::{DetectionResult, FrameId, RawFrame};
use quadsight_detect::QuadDetector;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// One emitted result, tagged with the id `submit` returned for its frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameDetection {
    pub frame_id: FrameId,
    pub result: DetectionResult,
}

/// Frame counters for one session.
///
/// Every accepted frame ends up in exactly one of `emitted`, `dropped`
/// (detection failed) or `discarded` (evicted from the queue or flushed by
/// shutdown), or is still queued / in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub accepted: u64,
    pub emitted: u64,
    pub dropped: u64,
    pub discarded: u64,
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct Pending {
    id: FrameId,
    frame: RawFrame,
    display_height: u32,
}

/// Queue plus the intake flag, under one lock so a frame can never be
/// enqueued after the session has closed.
struct Intake {
    queue: VecDeque<Pending>,
    closed: bool,
}

struct Shared {
    intake: Mutex<Intake>,
    wake: Notify,
    capacity: usize,
    next_id: AtomicU64,
    accepted: AtomicU64,
    emitted: AtomicU64,
    dropped: AtomicU64,
    discarded: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Intake> {
        // Nothing under the lock can leave the queue half-updated.
        self.intake.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stats(&self) -> SessionStats {
        SessionStats {
            accepted: self.accepted.load(Ordering::Acquire),
            emitted: self.emitted.load(Ordering::Acquire),
            dropped: self.dropped.load(Ordering::Acquire),
            discarded: self.discarded.load(Ordering::Acquire),
        }
    }

    fn submit(&self, frame: RawFrame, display_height: u32) -> Result<FrameId> {
        let id = {
            let mut intake = self.lock();
            if intake.closed {
                return Err(QuadsightError::SessionClosed);
            }
            let id = FrameId(self.next_id.fetch_add(1, Ordering::Relaxed));
            if intake.queue.len() >= self.capacity {
                if let Some(evicted) = intake.queue.pop_front() {
                    self.discarded.fetch_add(1, Ordering::AcqRel);
                    warn!(
                        evicted = %evicted.id,
                        incoming = %id,
                        capacity = self.capacity,
                        "frame queue full, oldest frame discarded"
                    );
                }
            }
            intake.queue.push_back(Pending {
                id,
                frame,
                display_height,
            });
            self.accepted.fetch_add(1, Ordering::AcqRel);
            id
        };
        self.wake.notify_one();
        debug!(frame = %id, "frame queued");
        Ok(id)
    }

    /// Stop intake. With `discard`, also flush whatever is still queued.
    /// Returns the number of frames flushed.
    fn close(&self, discard: bool) -> usize {
        let flushed = {
            let mut intake = self.lock();
            intake.closed = true;
            if discard {
                let n = intake.queue.len();
                intake.queue.clear();
                n
            } else {
                0
            }
        };
        self.discarded.fetch_add(flushed as u64, Ordering::AcqRel);
        self.wake.notify_one();
        flushed
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cloneable submit side of a session, for capture callbacks that live on
/// another thread.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl SessionHandle {
    /// Queue a frame for detection.
    ///
    /// Never blocks. Fails with [`QuadsightError::SessionClosed`] once the
    /// session is finishing or shut down.
    pub fn submit(&self, frame: RawFrame, display_height: u32) -> Result<FrameId> {
        self.shared.submit(frame, display_height)
    }

    pub fn stats(&self) -> SessionStats {
        self.shared.stats()
    }

    /// Frames waiting behind the in-flight one.
    pub fn queued(&self) -> usize {
        self.shared.lock().queue.len()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A running detection session: the queue and its worker task.
///
/// Must be started inside a Tokio runtime.
pub struct DetectionSession {
    handle: SessionHandle,
    worker: Option<JoinHandle<()>>,
}

impl DetectionSession {
    /// Spawn the worker and return the session with its result receiver.
    ///
    /// The queue bound comes from the detector's `max_queued_frames`.
    pub fn start(detector: QuadDetector) -> (Self, mpsc::UnboundedReceiver<FrameDetection>) {
        let capacity = detector.config().max_queued_frames;
        let shared = Arc::new(Shared {
            intake: Mutex::new(Intake {
                queue: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            wake: Notify::new(),
            capacity,
            next_id: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            emitted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        });
        let (tx, rx) = mpsc::unbounded_channel();

        let worker = tokio::spawn(worker_loop(Arc::clone(&shared), Arc::new(detector), tx));
        info!(capacity, "detection session started");

        (
            Self {
                handle: SessionHandle { shared },
                worker: Some(worker),
            },
            rx,
        )
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn submit(&self, frame: RawFrame, display_height: u32) -> Result<FrameId> {
        self.handle.submit(frame, display_height)
    }

    pub fn stats(&self) -> SessionStats {
        self.handle.stats()
    }

    pub fn queued(&self) -> usize {
        self.handle.queued()
    }

    /// Stop intake, discard queued frames, let the in-flight frame finish,
    /// and join the worker. The capture device may be released once this
    /// returns.
    #[instrument(skip_all)]
    pub async fn shutdown(mut self) -> SessionStats {
        let flushed = self.handle.shared.close(true);
        info!(flushed, "detection session shutting down");
        self.join().await;
        self.finished()
    }

    /// Stop intake, process everything already queued, and join the worker.
    #[instrument(skip_all)]
    pub async fn finish(mut self) -> SessionStats {
        self.handle.shared.close(false);
        info!(queued = self.queued(), "detection session draining");
        self.join().await;
        self.finished()
    }

    async fn join(&mut self) {
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                error!(error = %e, "detection worker terminated abnormally");
            }
        }
    }

    fn finished(&self) -> SessionStats {
        let stats = self.stats();
        info!(
            accepted = stats.accepted,
            emitted = stats.emitted,
            dropped = stats.dropped,
            discarded = stats.discarded,
            "detection session stopped"
        );
        stats
    }
}

impl Drop for DetectionSession {
    fn drop(&mut self) {
        // Dropped without shutdown: stop the worker after its current frame.
        if self.worker.is_some() {
            self.handle.shared.close(true);
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

async fn worker_loop(
    shared: Arc<Shared>,
    detector: Arc<QuadDetector>,
    results: mpsc::UnboundedSender<FrameDetection>,
) {
    loop {
        let next = {
            let mut intake = shared.lock();
            match intake.queue.pop_front() {
                Some(pending) => Some(pending),
                None if intake.closed => break,
                None => None,
            }
        };

        let Some(pending) = next else {
            // `notify_one` keeps a permit if we are not waiting yet.
            shared.wake.notified().await;
            continue;
        };

        process(&shared, &detector, &results, pending).await;
    }
    debug!("detection worker exiting");
}

async fn process(
    shared: &Shared,
    detector: &Arc<QuadDetector>,
    results: &mpsc::UnboundedSender<FrameDetection>,
    pending: Pending,
) {
    let Pending {
        id,
        frame,
        display_height,
    } = pending;

    let detector = Arc::clone(detector);
    let span = debug_span!("frame", id = %id);
    let outcome = tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        detector.detect(&frame, display_height)
    })
    .await;

    match outcome {
        Ok(Ok(result)) => {
            shared.emitted.fetch_add(1, Ordering::AcqRel);
            debug!(frame = %id, found = result.is_found(), "frame emitted");
            if results.send(FrameDetection { frame_id: id, result }).is_err() {
                debug!(frame = %id, "result receiver gone");
            }
        }
        Ok(Err(err)) => {
            shared.dropped.fetch_add(1, Ordering::AcqRel);
            match classify_error(&err) {
                ErrorClass::Transient => debug!(frame = %id, error = %err, "frame dropped"),
                class => warn!(frame = %id, error = %err, ?class, "frame dropped"),
            }
        }
        Err(join) => {
            shared.dropped.fetch_add(1, Ordering::AcqRel);
            warn!(frame = %id, error = %join, "detection task failed");
        }
    }
}
