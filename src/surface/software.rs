//! Software output surfaces
//!
//! Renders snapshots into an in-memory BGRA framebuffer using
//! nearest-neighbour scaling. The provider keeps a handle on every live
//! surface so a host (or a test) can inspect what was last drawn.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use super::{fit_content, OutputSurface, RenderError, SurfaceProvider};
use crate::frame::{FrameSnapshot, BYTES_PER_PIXEL};
use crate::source::{SourceGeometry, SourceId};

/// Background for areas not covered by content (letterbox bars)
const BACKGROUND: [u8; 4] = [0, 0, 0, 255];

#[derive(Debug)]
struct SurfaceState {
    geometry: SourceGeometry,
    framebuffer: Vec<u8>,
    frames_drawn: u64,
    last_captured_at: Option<u64>,
}

impl SurfaceState {
    fn new(geometry: SourceGeometry) -> Self {
        Self {
            framebuffer: vec![0; fb_len(&geometry)],
            geometry,
            frames_drawn: 0,
            last_captured_at: None,
        }
    }
}

/// Public view of a software surface
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceInfo {
    /// Geometry the surface currently mirrors
    pub geometry: SourceGeometry,
    /// Successful draws since creation
    pub frames_drawn: u64,
    /// Capture timestamp of the last snapshot drawn
    pub last_captured_at: Option<u64>,
}

/// In-memory surface
#[derive(Debug)]
pub struct SoftwareSurface {
    source: SourceId,
    state: Arc<Mutex<SurfaceState>>,
}

impl SoftwareSurface {
    fn new(source: SourceId, geometry: SourceGeometry) -> Self {
        Self {
            source,
            state: Arc::new(Mutex::new(SurfaceState::new(geometry))),
        }
    }

    /// Source this surface overlays
    pub fn source(&self) -> SourceId {
        self.source
    }
}

impl OutputSurface for SoftwareSurface {
    fn set_geometry(&mut self, geometry: &SourceGeometry) {
        let mut state = self.state.lock();
        let resized = state.geometry.width != geometry.width
            || state.geometry.height != geometry.height;
        state.geometry = *geometry;
        if resized {
            let len = fb_len(geometry);
            state.framebuffer.clear();
            state.framebuffer.resize(len, 0);
        }
        trace!(
            "Surface for {} now at ({}, {}) {}x{}",
            self.source,
            geometry.x,
            geometry.y,
            geometry.width,
            geometry.height
        );
    }

    fn dimensions(&self) -> (u32, u32) {
        let state = self.state.lock();
        (state.geometry.width, state.geometry.height)
    }

    fn draw(&mut self, snapshot: &FrameSnapshot) -> Result<(), RenderError> {
        let (sw, sh) = (snapshot.width(), snapshot.height());
        if sw == 0 || sh == 0 {
            return Err(RenderError::EmptySnapshot {
                width: sw,
                height: sh,
            });
        }
        let expected = sw as usize * sh as usize * BYTES_PER_PIXEL;
        if snapshot.data().len() != expected {
            return Err(RenderError::MalformedSnapshot {
                expected,
                actual: snapshot.data().len(),
            });
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let (tw, th) = (state.geometry.width, state.geometry.height);
        if tw == 0 || th == 0 {
            return Err(RenderError::EmptySurface);
        }

        let placement = fit_content((sw, sh), (tw, th), state.geometry.fit);
        let src = snapshot.data();
        let src_stride = snapshot.stride();
        let dst_stride = tw as usize * BYTES_PER_PIXEL;

        for (dy, row) in state.framebuffer.chunks_exact_mut(dst_stride).enumerate() {
            let py = dy as i64 - placement.y;
            let row_covered = py >= 0 && (py as u64) < placement.height;
            let sy = if row_covered {
                (py as u64 * sh as u64 / placement.height) as usize
            } else {
                0
            };

            for (dx, pixel) in row.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
                let px = dx as i64 - placement.x;
                if !row_covered || px < 0 || px as u64 >= placement.width {
                    pixel.copy_from_slice(&BACKGROUND);
                    continue;
                }
                let sx = (px as u64 * sw as u64 / placement.width) as usize;
                let offset = sy * src_stride + sx * BYTES_PER_PIXEL;
                pixel.copy_from_slice(&src[offset..offset + BYTES_PER_PIXEL]);
            }
        }

        state.frames_drawn += 1;
        state.last_captured_at = snapshot.captured_at();
        Ok(())
    }
}

/// Provider of [`SoftwareSurface`]s
#[derive(Debug, Default)]
pub struct SoftwareSurfaceProvider {
    live: RwLock<HashMap<SourceId, Arc<Mutex<SurfaceState>>>>,
    created: AtomicU64,
}

impl SoftwareSurfaceProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of surfaces currently alive
    pub fn live_surfaces(&self) -> usize {
        self.live.read().len()
    }

    /// Number of surfaces ever created
    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Inspect the live surface for `source`
    pub fn info(&self, source: SourceId) -> Option<SurfaceInfo> {
        self.live.read().get(&source).map(|state| {
            let state = state.lock();
            SurfaceInfo {
                geometry: state.geometry,
                frames_drawn: state.frames_drawn,
                last_captured_at: state.last_captured_at,
            }
        })
    }

    /// Copy of the live surface's framebuffer
    pub fn pixels(&self, source: SourceId) -> Option<Vec<u8>> {
        self.live
            .read()
            .get(&source)
            .map(|state| state.lock().framebuffer.clone())
    }
}

impl SurfaceProvider for SoftwareSurfaceProvider {
    fn create(&self, source: SourceId, geometry: &SourceGeometry) -> Box<dyn OutputSurface> {
        let surface = SoftwareSurface::new(source, *geometry);
        self.live.write().insert(source, surface.state.clone());
        self.created.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Created software surface for {}: {}x{} at ({}, {})",
            source, geometry.width, geometry.height, geometry.x, geometry.y
        );
        Box::new(surface)
    }

    fn remove(&self, source: SourceId, surface: Box<dyn OutputSurface>) {
        drop(surface);
        if self.live.write().remove(&source).is_some() {
            debug!("Removed software surface for {}", source);
        }
    }
}

fn fb_len(geometry: &SourceGeometry) -> usize {
    geometry.width as usize * geometry.height as usize * BYTES_PER_PIXEL
}
