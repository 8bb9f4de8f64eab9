//! Synthetic test pattern source
//!
//! Produces an animated BGRA gradient whose red channel advances with every
//! sample, so consecutive captures are distinguishable. Used by the demo
//! host and throughout the tests.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

use super::{SourceGeometry, SourceId, VisualSource};

/// Default native frame rate of the pattern
const DEFAULT_FRAME_RATE: u32 = 30;

#[derive(Debug)]
struct PatternState {
    width: u32,
    height: u32,
    paused: bool,
    visible: bool,
}

/// Animated gradient source
#[derive(Debug)]
pub struct TestPatternSource {
    id: SourceId,
    frame_rate: u32,
    state: RwLock<PatternState>,
    frames_sampled: AtomicU64,
    geometry_tx: watch::Sender<SourceGeometry>,
}

impl TestPatternSource {
    /// Create a visible, playing source displayed at its natural size
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_frame_rate(width, height, DEFAULT_FRAME_RATE)
    }

    /// Create a source updating at `frame_rate` FPS
    pub fn with_frame_rate(width: u32, height: u32, frame_rate: u32) -> Self {
        let geometry = SourceGeometry {
            width,
            height,
            ..SourceGeometry::default()
        };
        let (geometry_tx, _) = watch::channel(geometry);

        Self {
            id: SourceId::new(),
            frame_rate,
            state: RwLock::new(PatternState {
                width,
                height,
                paused: false,
                visible: true,
            }),
            frames_sampled: AtomicU64::new(0),
            geometry_tx,
        }
    }

    /// Change the intrinsic content size (e.g. a resolution switch)
    pub fn set_dimensions(&self, width: u32, height: u32) {
        {
            let mut state = self.state.write();
            state.width = width;
            state.height = height;
        }
        // Content size changes are reported through the geometry watch too
        let current = *self.geometry_tx.borrow();
        self.geometry_tx.send_replace(current);
    }

    /// Move or restyle the on-screen box
    pub fn set_geometry(&self, geometry: SourceGeometry) {
        self.geometry_tx.send_replace(geometry);
    }

    /// Pause or resume the source's own playback
    pub fn set_paused(&self, paused: bool) {
        self.state.write().paused = paused;
    }

    /// Show or hide the source
    pub fn set_visible(&self, visible: bool) {
        self.state.write().visible = visible;
    }

    /// Number of times the pattern was sampled
    pub fn frames_sampled(&self) -> u64 {
        self.frames_sampled.load(Ordering::Relaxed)
    }
}

impl VisualSource for TestPatternSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn dimensions(&self) -> (u32, u32) {
        let state = self.state.read();
        (state.width, state.height)
    }

    fn is_paused(&self) -> bool {
        self.state.read().paused
    }

    fn is_visible(&self) -> bool {
        self.state.read().visible
    }

    fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    fn sample(&self, dst: &mut [u8], width: u32, height: u32) {
        let phase = self.frames_sampled.fetch_add(1, Ordering::Relaxed) as u8;
        let w = width.max(1) as usize;
        let h = height.max(1) as usize;

        for (i, pixel) in dst.chunks_exact_mut(4).enumerate() {
            let x = i % w;
            let y = i / w;
            pixel[0] = (x * 255 / w) as u8; // B
            pixel[1] = (y * 255 / h) as u8; // G
            pixel[2] = phase; // R
            pixel[3] = 255; // A
        }
    }

    fn geometry(&self) -> SourceGeometry {
        *self.geometry_tx.borrow()
    }

    fn watch_geometry(&self) -> watch::Receiver<SourceGeometry> {
        self.geometry_tx.subscribe()
    }
}
