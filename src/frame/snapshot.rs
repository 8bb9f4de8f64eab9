//! Frame snapshot
//!
//! A single buffered image. The backing store always holds
//! `width * height * BYTES_PER_PIXEL` bytes of BGRA pixels.

use tracing::trace;

use crate::source::VisualSource;

/// Bytes per pixel of snapshot storage (BGRA8888)
pub const BYTES_PER_PIXEL: usize = 4;

/// One buffered image plus its capture timestamp
#[derive(Debug, Clone, Default)]
pub struct FrameSnapshot {
    width: u32,
    height: u32,
    data: Vec<u8>,
    /// Capture time in milliseconds; `None` until the first capture
    captured_at: Option<u64>,
}

impl FrameSnapshot {
    /// Create an empty snapshot with storage for `width` x `height` pixels
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; byte_len(width, height)],
            captured_at: None,
        }
    }

    /// Copy the source's current content into this snapshot
    ///
    /// The content is sampled at the snapshot's own dimensions. Returns
    /// `false` and leaves the timestamp untouched when the source reports a
    /// zero width or height.
    pub fn capture(&mut self, source: &dyn VisualSource, timestamp: u64) -> bool {
        let (source_width, source_height) = source.dimensions();
        if source_width == 0 || source_height == 0 {
            trace!(
                "Source {} reports {}x{}, skipping capture",
                source.id(),
                source_width,
                source_height
            );
            return false;
        }

        source.sample(&mut self.data, self.width, self.height);
        self.captured_at = Some(timestamp);
        true
    }

    /// Reallocate the backing store for new dimensions
    ///
    /// The capture timestamp is kept; the next capture overwrites the
    /// stale-sized pixels.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }

        let len = byte_len(width, height);
        self.data.clear();
        self.data.resize(len, 0);
        self.data.shrink_to_fit();
        self.width = width;
        self.height = height;
    }

    /// Forget the last capture without touching the pixel storage
    pub(crate) fn clear(&mut self) {
        self.captured_at = None;
    }

    /// Snapshot width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Snapshot height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw BGRA pixel data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Capture timestamp in milliseconds, if this slot was ever written
    pub fn captured_at(&self) -> Option<u64> {
        self.captured_at
    }

    /// True if this snapshot was never captured into
    pub fn is_empty(&self) -> bool {
        self.captured_at.is_none()
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }
}

fn byte_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::TestPatternSource;

    #[test]
    fn test_new_snapshot_is_empty() {
        let snapshot = FrameSnapshot::new(4, 2);
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.data().len(), 4 * 2 * BYTES_PER_PIXEL);
        assert_eq!(snapshot.stride(), 16);
    }

    #[test]
    fn test_capture_records_timestamp() {
        let source = TestPatternSource::new(8, 8);
        let mut snapshot = FrameSnapshot::new(8, 8);

        assert!(snapshot.capture(&source, 42));
        assert_eq!(snapshot.captured_at(), Some(42));
        // Test pattern writes opaque pixels
        assert_eq!(snapshot.data()[3], 255);
    }

    #[test]
    fn test_capture_skipped_for_zero_sized_source() {
        let source = TestPatternSource::new(8, 8);
        let mut snapshot = FrameSnapshot::new(8, 8);
        assert!(snapshot.capture(&source, 10));

        source.set_dimensions(0, 8);
        assert!(!snapshot.capture(&source, 20));
        assert_eq!(snapshot.captured_at(), Some(10));
    }

    #[test]
    fn test_resize_keeps_timestamp() {
        let source = TestPatternSource::new(8, 8);
        let mut snapshot = FrameSnapshot::new(8, 8);
        snapshot.capture(&source, 99);

        snapshot.resize(16, 4);
        assert_eq!(snapshot.width(), 16);
        assert_eq!(snapshot.height(), 4);
        assert_eq!(snapshot.data().len(), 16 * 4 * BYTES_PER_PIXEL);
        assert_eq!(snapshot.captured_at(), Some(99));
    }

    #[test]
    fn test_clear() {
        let source = TestPatternSource::new(2, 2);
        let mut snapshot = FrameSnapshot::new(2, 2);
        snapshot.capture(&source, 5);
        snapshot.clear();
        assert!(snapshot.is_empty());
    }
}
