//! Output surfaces
//!
//! The drawable a session renders delayed frames into. A surface overlays the
//! source on screen, so it mirrors the source's position, size, fit mode and
//! transform. Surfaces are created and removed through a [`SurfaceProvider`];
//! once created, a surface is owned by exactly one session.

use crate::frame::FrameSnapshot;
use crate::source::{FitMode, SourceGeometry, SourceId};

mod software;

pub use software::{SoftwareSurface, SoftwareSurfaceProvider, SurfaceInfo};

/// Rendering errors
///
/// All of these are recoverable: the playback loop logs them and treats the
/// frame as skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("Snapshot is empty ({width}x{height})")]
    EmptySnapshot { width: u32, height: u32 },

    #[error("Snapshot buffer holds {actual} bytes, expected {expected}")]
    MalformedSnapshot { expected: usize, actual: usize },

    #[error("Output surface has zero size")]
    EmptySurface,
}

/// A drawable positioned over a source
pub trait OutputSurface: Send {
    /// Re-sync position, size and style with the source
    fn set_geometry(&mut self, geometry: &SourceGeometry);

    /// Current drawable size in pixels
    fn dimensions(&self) -> (u32, u32);

    /// Render `snapshot` scaled to the surface's current dimensions
    fn draw(&mut self, snapshot: &FrameSnapshot) -> Result<(), RenderError>;
}

/// Creates and removes output surfaces
#[cfg_attr(test, mockall::automock)]
pub trait SurfaceProvider: Send + Sync {
    /// Create a surface mirroring `geometry` for `source`
    fn create(&self, source: SourceId, geometry: &SourceGeometry) -> Box<dyn OutputSurface>;

    /// Remove a surface previously returned by [`create`](Self::create)
    fn remove(&self, source: SourceId, surface: Box<dyn OutputSurface>);
}

/// Placement of scaled content inside a box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Left edge relative to the box (may be negative when cropping)
    pub x: i64,
    /// Top edge relative to the box
    pub y: i64,
    /// Scaled content width
    pub width: u64,
    /// Scaled content height
    pub height: u64,
}

/// Compute where `content` lands inside `target` for a fit mode
pub fn fit_content(content: (u32, u32), target: (u32, u32), fit: FitMode) -> Placement {
    let (cw, ch) = (content.0 as u64, content.1 as u64);
    let (tw, th) = (target.0 as u64, target.1 as u64);

    let (width, height) = match fit {
        FitMode::Fill => (tw, th),
        FitMode::None => (cw, ch),
        FitMode::Contain => scale_to(cw, ch, tw, th, false),
        FitMode::Cover => scale_to(cw, ch, tw, th, true),
        FitMode::ScaleDown => {
            if cw <= tw && ch <= th {
                (cw, ch)
            } else {
                scale_to(cw, ch, tw, th, false)
            }
        }
    };

    Placement {
        x: (tw as i64 - width as i64) / 2,
        y: (th as i64 - height as i64) / 2,
        width,
        height,
    }
}

/// Aspect-preserving scale of `cw` x `ch` into `tw` x `th`
fn scale_to(cw: u64, ch: u64, tw: u64, th: u64, cover: bool) -> (u64, u64) {
    if cw == 0 || ch == 0 {
        return (0, 0);
    }
    // Compare tw/cw against th/ch without floating point
    let width_limited = tw * ch <= th * cw;
    if width_limited != cover {
        (tw, (ch * tw / cw).max(1))
    } else {
        ((cw * th / ch).max(1), th)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_fill_stretches() {
        let p = fit_content((100, 50), (40, 40), FitMode::Fill);
        assert_eq!(p, Placement { x: 0, y: 0, width: 40, height: 40 });
    }

    #[test]
    fn test_fit_contain_letterboxes() {
        let p = fit_content((100, 50), (40, 40), FitMode::Contain);
        assert_eq!(p, Placement { x: 0, y: 10, width: 40, height: 20 });
    }

    #[test]
    fn test_fit_cover_crops() {
        let p = fit_content((100, 50), (40, 40), FitMode::Cover);
        assert_eq!(p, Placement { x: -20, y: 0, width: 80, height: 40 });
    }

    #[test]
    fn test_fit_none_centers() {
        let p = fit_content((10, 10), (40, 20), FitMode::None);
        assert_eq!(p, Placement { x: 15, y: 5, width: 10, height: 10 });
    }

    #[test]
    fn test_fit_scale_down() {
        let small = fit_content((10, 10), (40, 40), FitMode::ScaleDown);
        assert_eq!(small.width, 10);

        let large = fit_content((100, 50), (40, 40), FitMode::ScaleDown);
        assert_eq!(large, fit_content((100, 50), (40, 40), FitMode::Contain));
    }
}
