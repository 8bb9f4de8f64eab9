//! Delay sessions
//!
//! A [`Session`] binds one visual source to its ring buffer, output surface
//! and the two repeating tasks that move frames between them:
//!
//! ```text
//!   source ──(capture loop, source cadence)──> RingBuffer
//!                                                  │
//!   surface <──(playback loop, display cadence)────┘
//!                select_best(now - delay)
//! ```
//!
//! The loops are independent Tokio tasks; they may run on different worker
//! threads, so every cycle runs under the session lock. A slot write is
//! therefore complete before any playback cycle can read it, and a resize
//! from the geometry watcher never interleaves with a cycle.
//!
//! # Lifecycle
//!
//! - [`Session::activate`] resets the ring, creates the surface and spawns the
//!   capture loop, playback loop and geometry watcher under one cancellation
//!   token. Calling it again while active does nothing.
//! - `Session::deactivate` removes the surface and cancels the token. An
//!   in-flight cycle finishes; the loops exit on their next iteration. It is
//!   reached through [`crate::controller::DelayController`], which also
//!   unlinks the session from its registry.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::frame::{BufferError, Capacity, RingBuffer};
use crate::scheduler::{Clock, Scheduler};
use crate::source::{SourceId, VisualSource};
use crate::surface::{OutputSurface, SurfaceProvider};

mod loops;
mod stats;

pub use stats::SessionStats;

/// Shared collaborators every session needs
#[derive(Clone)]
pub struct EngineContext {
    /// Creates and removes output surfaces
    pub surfaces: Arc<dyn SurfaceProvider>,
    /// Timestamp source for captures and playback targets
    pub clock: Arc<dyn Clock>,
    /// Loop cadence
    pub scheduler: Scheduler,
}

impl EngineContext {
    /// Bundle the engine collaborators
    pub fn new(
        surfaces: Arc<dyn SurfaceProvider>,
        clock: Arc<dyn Clock>,
        scheduler: Scheduler,
    ) -> Self {
        Self {
            surfaces,
            clock,
            scheduler,
        }
    }
}

impl fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineContext")
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

/// What a capture cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// A snapshot was written
    Captured { slot: usize, overflow: bool },
    /// The cursor advanced but the source had no content
    Empty { slot: usize },
    /// Inactive session, paused or hidden source
    Skipped,
}

/// What a playback cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// A snapshot was drawn
    Rendered { slot: usize },
    /// Inactive session or paused source
    Idle,
    /// Every slot is empty
    NoFrame,
    /// The best slot is the one already on screen
    Unchanged { slot: usize },
    /// Drawing failed; the frame was skipped
    Failed { slot: usize },
}

struct SessionTasks {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

struct SessionState {
    ring: RingBuffer,
    delay_ms: u64,
    active: bool,
    last_rendered: Option<usize>,
    surface: Option<Box<dyn OutputSurface>>,
    tasks: Option<SessionTasks>,
    stats: SessionStats,
}

/// Live binding of one source to its buffering and playback engine
pub struct Session {
    source: Arc<dyn VisualSource>,
    context: EngineContext,
    state: Mutex<SessionState>,
}

impl Session {
    /// Create an inactive session
    ///
    /// The ring is sized to the source's current dimensions.
    pub fn new(
        source: Arc<dyn VisualSource>,
        capacity: Capacity,
        delay_ms: u64,
        context: EngineContext,
    ) -> Self {
        let (width, height) = source.dimensions();
        debug!(
            "Creating session for {}: {} slots, {}x{}, delay {}ms",
            source.id(),
            capacity,
            width,
            height,
            delay_ms
        );

        Self {
            state: Mutex::new(SessionState {
                ring: RingBuffer::new(capacity, width, height),
                delay_ms,
                active: false,
                last_rendered: None,
                surface: None,
                tasks: None,
                stats: SessionStats::default(),
            }),
            source,
            context,
        }
    }

    /// Source this session delays
    pub fn source_id(&self) -> SourceId {
        self.source.id()
    }

    /// Start capturing and playing back
    ///
    /// Must be called from within a Tokio runtime. No-op while active.
    pub fn activate(self: &Arc<Self>) {
        let mut state = self.state.lock();
        if state.active {
            trace!("Session for {} already active", self.source.id());
            return;
        }

        let (width, height) = self.source.dimensions();
        state.ring.reset(width, height);
        state.last_rendered = None;

        let geometry = self.source.geometry();
        state.surface = Some(self.context.surfaces.create(self.source.id(), &geometry));
        state.active = true;

        let cancel = CancellationToken::new();
        let handles = vec![
            loops::spawn_capture_loop(Arc::clone(self), cancel.clone()),
            loops::spawn_playback_loop(Arc::clone(self), cancel.clone()),
            loops::spawn_geometry_watcher(Arc::clone(self), cancel.clone()),
        ];
        state.tasks = Some(SessionTasks { cancel, handles });

        info!(
            "Session for {} active: {} slots, delay {}ms",
            self.source.id(),
            state.ring.capacity(),
            state.delay_ms
        );
    }

    /// Stop the loops and remove the output surface
    ///
    /// Safe to call at any time, including while a cycle is in flight (the
    /// cycle holds the lock and completes first). The cancelled task handles
    /// are kept until the next activation so [`Session::running_tasks`] can
    /// report when the loops have actually exited.
    pub(crate) fn deactivate(&self) {
        let mut state = self.state.lock();
        let was_active = state.active;
        state.active = false;

        if let Some(surface) = state.surface.take() {
            self.context.surfaces.remove(self.source.id(), surface);
        }
        if let Some(tasks) = state.tasks.as_ref() {
            tasks.cancel.cancel();
        }

        if was_active {
            info!(
                "Session for {} deactivated ({} frames captured, {} rendered)",
                self.source.id(),
                state.stats.frames_captured,
                state.stats.frames_rendered
            );
        }
    }

    /// Re-sync the surface and ring with the source's geometry
    ///
    /// Returns `false` (and does nothing) before activation or while the
    /// source has no valid dimensions. Buffered timestamps are kept.
    pub fn resize(&self) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(surface) = state.surface.as_mut() else {
            return false;
        };
        let (width, height) = self.source.dimensions();
        if width == 0 || height == 0 {
            trace!(
                "Ignoring resize of {} to {}x{}",
                self.source.id(),
                width,
                height
            );
            return false;
        }

        surface.set_geometry(&self.source.geometry());
        state.ring.resize(width, height);
        state.stats.resizes += 1;
        debug!("Session for {} resized to {}x{}", self.source.id(), width, height);
        true
    }

    /// Replace the ring with `slots` empty slots
    ///
    /// Fewer than two slots is rejected and the current ring is kept.
    pub fn set_capacity(&self, slots: usize) -> Result<(), BufferError> {
        let capacity = match Capacity::new(slots) {
            Ok(capacity) => capacity,
            Err(e) => {
                error!("Rejecting capacity for {}: {}", self.source.id(), e);
                return Err(e);
            }
        };

        let (width, height) = self.source.dimensions();
        let mut state = self.state.lock();
        state.ring = RingBuffer::new(capacity, width, height);
        state.last_rendered = None;
        debug!("Session for {} reinitialised with {} slots", self.source.id(), capacity);
        Ok(())
    }

    /// Change the delay in place; buffered frames are kept
    pub fn set_delay(&self, delay_ms: u64) {
        let mut state = self.state.lock();
        if state.delay_ms != delay_ms {
            debug!(
                "Session for {} delay {}ms -> {}ms",
                self.source.id(),
                state.delay_ms,
                delay_ms
            );
            state.delay_ms = delay_ms;
        }
    }

    /// Run one capture cycle at `now` (milliseconds)
    pub fn capture_tick(&self, now: u64) -> CaptureOutcome {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if !state.active || self.source.is_paused() || !self.source.is_visible() {
            state.stats.captures_skipped += 1;
            return CaptureOutcome::Skipped;
        }

        let outcome = state.ring.enqueue(self.source.as_ref(), now, state.delay_ms);

        if outcome.overflow {
            state.stats.overflow_events += 1;
            let events = state.stats.overflow_events;
            if events == 1 || events % 100 == 0 {
                warn!(
                    "Ring for {} cannot span {}ms delay with {} slots, overwriting ({} overflows)",
                    self.source.id(),
                    state.delay_ms,
                    state.ring.capacity(),
                    events
                );
            }
        }

        if outcome.captured {
            state.stats.frames_captured += 1;
            CaptureOutcome::Captured {
                slot: outcome.slot,
                overflow: outcome.overflow,
            }
        } else {
            state.stats.captures_empty += 1;
            CaptureOutcome::Empty { slot: outcome.slot }
        }
    }

    /// Run one playback cycle at `now` (milliseconds)
    pub fn playback_tick(&self, now: u64) -> PlaybackOutcome {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if !state.active || self.source.is_paused() {
            return PlaybackOutcome::Idle;
        }
        let Some(surface) = state.surface.as_mut() else {
            return PlaybackOutcome::Idle;
        };

        let target = playback_target(now, state.delay_ms);
        let Some(slot) = state.ring.select_best(target) else {
            state.stats.renders_skipped += 1;
            return PlaybackOutcome::NoFrame;
        };
        if state.last_rendered == Some(slot) {
            state.stats.renders_skipped += 1;
            return PlaybackOutcome::Unchanged { slot };
        }

        let Some(snapshot) = state.ring.slot(slot) else {
            return PlaybackOutcome::NoFrame;
        };
        match surface.draw(snapshot) {
            Ok(()) => {
                state.last_rendered = Some(slot);
                state.stats.frames_rendered += 1;
                trace!(
                    "Rendered slot {} of {} (target {}, captured {:?})",
                    slot,
                    self.source.id(),
                    target,
                    snapshot.captured_at()
                );
                PlaybackOutcome::Rendered { slot }
            }
            Err(e) => {
                state.stats.render_failures += 1;
                let failures = state.stats.render_failures;
                if failures == 1 || failures % 100 == 0 {
                    warn!(
                        "Failed to render slot {} of {}: {} ({} failures)",
                        slot,
                        self.source.id(),
                        e,
                        failures
                    );
                }
                PlaybackOutcome::Failed { slot }
            }
        }
    }

    /// True between activation and deactivation
    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Current delay in milliseconds
    pub fn delay_ms(&self) -> u64 {
        self.state.lock().delay_ms
    }

    /// Number of ring slots
    pub fn capacity(&self) -> usize {
        self.state.lock().ring.capacity()
    }

    /// Ring writes since the last activation or capacity change
    pub fn write_count(&self) -> u64 {
        self.state.lock().ring.write_count()
    }

    /// Slots currently holding a capture
    pub fn filled_slots(&self) -> usize {
        self.state.lock().ring.filled()
    }

    /// Slot last drawn to the surface
    pub fn last_rendered_index(&self) -> Option<usize> {
        self.state.lock().last_rendered
    }

    /// Capture timestamp held by `slot`
    pub fn slot_timestamp(&self, slot: usize) -> Option<u64> {
        self.state.lock().ring.slot(slot).and_then(|s| s.captured_at())
    }

    /// Number of session tasks that have not exited yet
    ///
    /// Counts the tasks of the current or most recent activation, so it
    /// drops to zero only once cancelled loops have really finished.
    pub fn running_tasks(&self) -> usize {
        self.state
            .lock()
            .tasks
            .as_ref()
            .map(|t| t.handles.iter().filter(|h| !h.is_finished()).count())
            .unwrap_or(0)
    }

    /// Snapshot of the session counters
    pub fn stats(&self) -> SessionStats {
        self.state.lock().stats.clone()
    }
}

/// `now - delay_ms` as a signed timestamp
///
/// Saturates instead of wrapping, so an absurd delay targets the distant past
/// (oldest frame) rather than the future.
fn playback_target(now: u64, delay_ms: u64) -> i64 {
    let now = i64::try_from(now).unwrap_or(i64::MAX);
    let delay = i64::try_from(delay_ms).unwrap_or(i64::MAX);
    now.saturating_sub(delay)
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Session")
            .field("source", &self.source.id())
            .field("active", &state.active)
            .field("delay_ms", &state.delay_ms)
            .field("capacity", &state.ring.capacity())
            .field("write_count", &state.ring.write_count())
            .field("last_rendered", &state.last_rendered)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualClock;
    use crate::source::TestPatternSource;
    use crate::surface::SoftwareSurfaceProvider;
    use std::time::Duration;

    struct Harness {
        source: Arc<TestPatternSource>,
        surfaces: Arc<SoftwareSurfaceProvider>,
        session: Arc<Session>,
    }

    fn harness(capacity: usize, delay_ms: u64) -> Harness {
        let source = Arc::new(TestPatternSource::new(16, 9));
        let surfaces = Arc::new(SoftwareSurfaceProvider::new());
        // A very slow scheduler keeps the background loops out of the way of
        // the manually driven ticks below.
        let context = EngineContext::new(
            surfaces.clone(),
            Arc::new(ManualClock::new(0)),
            Scheduler::new(1),
        );
        let session = Arc::new(Session::new(
            source.clone(),
            Capacity::new(capacity).unwrap(),
            delay_ms,
            context,
        ));
        Harness {
            source,
            surfaces,
            session,
        }
    }

    #[tokio::test]
    async fn test_ticks_skip_while_inactive() {
        let h = harness(4, 100);
        assert_eq!(h.session.capture_tick(10), CaptureOutcome::Skipped);
        assert_eq!(h.session.playback_tick(10), PlaybackOutcome::Idle);
        assert_eq!(h.session.write_count(), 0);
        assert_eq!(h.session.stats().captures_skipped, 1);
    }

    #[tokio::test]
    async fn test_delayed_selection_scenario() {
        let h = harness(4, 100);
        h.session.activate();

        for ts in [0, 30, 60, 90, 120] {
            h.session.capture_tick(ts);
        }
        assert_eq!(h.session.write_count(), 5);

        let outcome = h.session.playback_tick(150);
        let PlaybackOutcome::Rendered { slot } = outcome else {
            panic!("expected a render, got {:?}", outcome);
        };
        assert_eq!(h.session.slot_timestamp(slot), Some(60));
        assert_eq!(h.session.last_rendered_index(), Some(slot));
        assert_eq!(
            h.surfaces.info(h.source.id()).unwrap().last_captured_at,
            Some(60)
        );

        h.session.deactivate();
    }

    #[tokio::test]
    async fn test_unchanged_selection_not_redrawn() {
        let h = harness(4, 0);
        h.session.activate();

        h.session.capture_tick(10);
        assert_eq!(h.session.playback_tick(10), PlaybackOutcome::Rendered { slot: 0 });
        assert_eq!(h.session.playback_tick(11), PlaybackOutcome::Unchanged { slot: 0 });
        assert_eq!(h.session.stats().frames_rendered, 1);

        h.session.deactivate();
    }

    #[tokio::test]
    async fn test_empty_ring_renders_nothing() {
        let h = harness(4, 50);
        h.session.activate();

        assert_eq!(h.session.playback_tick(1000), PlaybackOutcome::NoFrame);
        assert_eq!(h.session.last_rendered_index(), None);
        assert_eq!(h.surfaces.info(h.source.id()).unwrap().frames_drawn, 0);

        h.session.deactivate();
    }

    #[tokio::test]
    async fn test_paused_and_hidden_sources_are_not_captured() {
        let h = harness(4, 0);
        h.session.activate();

        h.source.set_paused(true);
        assert_eq!(h.session.capture_tick(1), CaptureOutcome::Skipped);
        assert_eq!(h.session.playback_tick(1), PlaybackOutcome::Idle);

        h.source.set_paused(false);
        h.source.set_visible(false);
        assert_eq!(h.session.capture_tick(2), CaptureOutcome::Skipped);
        assert_eq!(h.session.write_count(), 0);

        h.source.set_visible(true);
        assert!(matches!(
            h.session.capture_tick(3),
            CaptureOutcome::Captured { slot: 0, .. }
        ));

        h.session.deactivate();
    }

    #[tokio::test]
    async fn test_overflow_counted_and_overwritten() {
        let h = harness(2, 10);
        h.session.activate();

        assert_eq!(
            h.session.capture_tick(0),
            CaptureOutcome::Captured { slot: 0, overflow: false }
        );
        assert_eq!(
            h.session.capture_tick(5),
            CaptureOutcome::Captured { slot: 1, overflow: true }
        );
        assert_eq!(h.session.write_count(), 2);
        assert_eq!(h.session.slot_timestamp(1), Some(5));
        assert_eq!(h.session.stats().overflow_events, 1);

        h.session.deactivate();
    }

    #[tokio::test]
    async fn test_delay_change_keeps_buffer() {
        let h = harness(8, 100);
        h.session.activate();

        for ts in [100, 200, 300, 400] {
            h.session.capture_tick(ts);
        }
        // target 300
        assert_eq!(h.session.playback_tick(400), PlaybackOutcome::Rendered { slot: 2 });

        h.session.set_delay(300);
        assert_eq!(h.session.write_count(), 4);
        assert_eq!(h.session.filled_slots(), 4);
        // target 100, picked up on the very next cycle
        assert_eq!(h.session.playback_tick(400), PlaybackOutcome::Rendered { slot: 0 });

        h.session.deactivate();
    }

    #[test]
    fn test_playback_target_saturates() {
        assert_eq!(playback_target(150, 100), 50);
        assert_eq!(playback_target(50, 100), -50);
        assert_eq!(playback_target(1000, u64::MAX), 1000 - i64::MAX);
        assert_eq!(playback_target(u64::MAX, 0), i64::MAX);
    }

    #[tokio::test]
    async fn test_huge_delay_selects_oldest_frame() {
        let h = harness(2, u64::MAX);
        h.session.activate();

        h.session.capture_tick(0);
        h.session.capture_tick(1000);
        assert_eq!(h.session.playback_tick(1000), PlaybackOutcome::Rendered { slot: 0 });
        assert_eq!(h.session.slot_timestamp(0), Some(0));

        h.session.deactivate();
    }

    #[tokio::test]
    async fn test_render_failure_is_skipped() {
        let h = harness(4, 0);
        h.session.activate();
        // Content size collapses to zero width: the ring is rebuilt with
        // zero-sized slots, but the source comes back before the capture.
        h.source.set_dimensions(0, 9);
        h.session.set_capacity(4).unwrap();
        h.source.set_dimensions(16, 9);

        assert!(matches!(
            h.session.capture_tick(5),
            CaptureOutcome::Captured { slot: 0, .. }
        ));
        assert_eq!(h.session.playback_tick(5), PlaybackOutcome::Failed { slot: 0 });
        assert_eq!(h.session.last_rendered_index(), None);
        assert_eq!(h.session.stats().render_failures, 1);

        h.session.deactivate();
    }

    #[tokio::test]
    async fn test_activate_is_idempotent() {
        let h = harness(4, 50);
        h.session.activate();
        h.session.activate();

        assert!(h.session.is_active());
        assert_eq!(h.surfaces.created_count(), 1);
        assert_eq!(h.surfaces.live_surfaces(), 1);
        assert_eq!(h.session.running_tasks(), 3);

        h.session.deactivate();
    }

    #[tokio::test]
    async fn test_deactivate_then_activate_starts_empty() {
        let h = harness(4, 0);
        h.session.activate();
        h.session.capture_tick(1);
        h.session.playback_tick(1);
        assert_eq!(h.session.last_rendered_index(), Some(0));

        h.session.deactivate();
        assert!(!h.session.is_active());
        assert_eq!(h.surfaces.live_surfaces(), 0);

        h.session.activate();
        assert_eq!(h.session.last_rendered_index(), None);
        assert_eq!(h.session.write_count(), 0);
        assert_eq!(h.session.filled_slots(), 0);

        h.session.deactivate();
    }

    #[tokio::test]
    async fn test_set_capacity_rejects_too_small() {
        let h = harness(4, 0);
        assert!(h.session.set_capacity(1).is_err());
        assert_eq!(h.session.capacity(), 4);
        h.session.set_capacity(6).unwrap();
        assert_eq!(h.session.capacity(), 6);
        assert_eq!(h.session.write_count(), 0);
    }

    #[tokio::test]
    async fn test_resize_requires_surface_and_valid_source() {
        let h = harness(4, 0);
        assert!(!h.session.resize());

        h.session.activate();
        h.session.capture_tick(7);

        h.source.set_dimensions(0, 0);
        assert!(!h.session.resize());

        h.source.set_dimensions(32, 18);
        assert!(h.session.resize());
        assert_eq!(h.session.slot_timestamp(0), Some(7));

        h.session.deactivate();
    }

    #[tokio::test]
    async fn test_geometry_watcher_triggers_resize() {
        let h = harness(4, 0);
        h.session.activate();

        h.source.set_dimensions(32, 18);
        for _ in 0..50 {
            if h.session.stats().resizes > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(h.session.stats().resizes, 1);

        h.session.deactivate();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_loops_exit_after_deactivate() {
        let source = Arc::new(TestPatternSource::with_frame_rate(16, 9, 200));
        let surfaces = Arc::new(SoftwareSurfaceProvider::new());
        let context = EngineContext::new(
            surfaces.clone(),
            Arc::new(ManualClock::new(0)),
            Scheduler::new(200),
        );
        let session = Arc::new(Session::new(source, Capacity::new(8).unwrap(), 20, context));

        session.activate();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(session.running_tasks(), 3);
        assert!(session.stats().frames_captured > 0);

        session.deactivate();
        for _ in 0..50 {
            if session.running_tasks() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(session.running_tasks(), 0);

        // No cycle runs once the loops are gone, not even a skipped one
        let stopped = session.stats();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let later = session.stats();
        assert_eq!(later.captures_skipped, stopped.captures_skipped);
        assert_eq!(later.frames_captured, stopped.frames_captured);
        assert_eq!(
            later.frames_rendered + later.renders_skipped,
            stopped.frames_rendered + stopped.renders_skipped
        );
        assert_eq!(surfaces.live_surfaces(), 0);
    }
}
