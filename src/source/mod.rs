//! Visual sources
//!
//! A visual source is anything that continuously produces pixels and sits
//! somewhere on screen - a video element, a camera preview, a canvas. The
//! engine only ever reads from it; it never changes the source's own
//! playback.
//!
//! Sources stay plain data: the engine keeps its per-source state in the
//! [`DelayController`](crate::controller::DelayController) registry rather
//! than on the source.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;

mod test_pattern;

pub use test_pattern::TestPatternSource;

/// Source identifier (unique per source)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub u64);

impl SourceId {
    /// Allocate a fresh source ID
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Source({})", self.0)
    }
}

/// How source content is fitted into its on-screen box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FitMode {
    /// Scale to fit inside the box, preserving aspect ratio (letterbox)
    #[default]
    Contain,
    /// Scale to cover the box, preserving aspect ratio (crop)
    Cover,
    /// Stretch to the box
    Fill,
    /// Natural size, centered
    None,
    /// Like `None`, unless that would overflow the box, then `Contain`
    ScaleDown,
}

/// 2D affine transform applied to the source's box
///
/// Row-major `[a, b, c, d, tx, ty]`, mapping `(x, y)` to
/// `(a*x + c*y + tx, b*x + d*y + ty)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform(pub [f32; 6]);

impl Transform {
    /// The identity transform
    pub const IDENTITY: Transform = Transform([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    /// True if this transform leaves geometry unchanged
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// On-screen geometry and style of a source
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SourceGeometry {
    /// Left edge in screen pixels
    pub x: i32,
    /// Top edge in screen pixels
    pub y: i32,
    /// Displayed width (not the intrinsic content width)
    pub width: u32,
    /// Displayed height
    pub height: u32,
    /// Content fit mode
    pub fit: FitMode,
    /// Visual transform
    pub transform: Transform,
}

/// A continuously updating visual source
///
/// Implementations must be cheap to query; the engine calls these from its
/// capture and playback loops at display refresh rate.
pub trait VisualSource: Send + Sync {
    /// Stable identity of this source
    fn id(&self) -> SourceId;

    /// Intrinsic content dimensions; `(0, 0)` while nothing is loaded
    fn dimensions(&self) -> (u32, u32);

    /// True while the source's own playback is paused
    fn is_paused(&self) -> bool;

    /// True while the source is visible on screen
    fn is_visible(&self) -> bool;

    /// Native update rate in frames per second
    fn frame_rate(&self) -> u32;

    /// Write the current content into `dst` as BGRA, scaled to
    /// `width` x `height`
    ///
    /// `dst` is exactly `width * height * 4` bytes.
    fn sample(&self, dst: &mut [u8], width: u32, height: u32);

    /// Current on-screen geometry
    fn geometry(&self) -> SourceGeometry;

    /// Subscribe to geometry and dimension changes
    ///
    /// The receiver is notified whenever the on-screen box or the intrinsic
    /// content size changes.
    fn watch_geometry(&self) -> watch::Receiver<SourceGeometry>;
}
