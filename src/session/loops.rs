//! Session tasks
//!
//! Three repeating tasks per active session, all stopped by the same
//! cancellation token:
//!
//! - capture loop: source cadence, writes the ring
//! - playback loop: display cadence, reads the ring and draws
//! - geometry watcher: re-syncs surface and ring when the source moves or
//!   changes size

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::Session;

pub(super) fn spawn_capture_loop(
    session: Arc<Session>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let mut ticker = session
        .context
        .scheduler
        .source_ticker(session.source.frame_rate());

    tokio::spawn(async move {
        debug!(
            "Capture loop for {} started ({:?} period)",
            session.source.id(),
            ticker.period()
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let now = session.context.clock.now_ms();
                    session.capture_tick(now);
                }
            }
        }

        debug!("Capture loop for {} stopped", session.source.id());
    })
}

pub(super) fn spawn_playback_loop(
    session: Arc<Session>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let mut ticker = session.context.scheduler.display_ticker();

    tokio::spawn(async move {
        debug!(
            "Playback loop for {} started ({:?} period)",
            session.source.id(),
            ticker.period()
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let now = session.context.clock.now_ms();
                    session.playback_tick(now);
                }
            }
        }

        debug!("Playback loop for {} stopped", session.source.id());
    })
}

pub(super) fn spawn_geometry_watcher(
    session: Arc<Session>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    // Subscribe before spawning so changes made right after activation are
    // not missed.
    let mut geometry_rx = session.source.watch_geometry();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = geometry_rx.changed() => {
                    if changed.is_err() {
                        trace!("Geometry feed for {} closed", session.source.id());
                        break;
                    }
                    session.resize();
                }
            }
        }

        trace!("Geometry watcher for {} stopped", session.source.id());
    })
}
