//! Snapshot ring buffer
//!
//! Fixed number of [`FrameSnapshot`] slots written round-robin. The write
//! slot is always `write_count mod capacity`; slots are never skipped and
//! never replaced, only overwritten.
//!
//! # Overflow
//!
//! When the buffer cannot span the configured delay, a write evicts a frame
//! that playback still wants. The buffer keeps writing (overwrite, not grow)
//! and reports the condition in [`EnqueueOutcome::overflow`] so the caller
//! can log it.

use std::fmt;

use crate::frame::snapshot::FrameSnapshot;
use crate::source::VisualSource;

/// Smallest usable ring (one slot being written, one being shown)
const MIN_CAPACITY: usize = 2;

/// Default number of slots per session
const DEFAULT_CAPACITY: usize = 60;

/// Ring buffer errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// Fewer slots than the ring can operate with
    #[error("Invalid ring capacity {requested} (minimum is {minimum})")]
    InvalidCapacity {
        /// Slot count asked for
        requested: usize,
        /// Smallest accepted slot count
        minimum: usize,
    },
}

/// Validated ring capacity (at least two slots)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Capacity(usize);

impl Capacity {
    /// Smallest valid capacity
    pub const MIN: Capacity = Capacity(MIN_CAPACITY);

    /// Default session capacity
    pub const DEFAULT: Capacity = Capacity(DEFAULT_CAPACITY);

    /// Validate a requested slot count
    pub fn new(slots: usize) -> Result<Self, BufferError> {
        if slots < MIN_CAPACITY {
            return Err(BufferError::InvalidCapacity {
                requested: slots,
                minimum: MIN_CAPACITY,
            });
        }
        Ok(Self(slots))
    }

    /// Number of slots
    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for Capacity {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of a single [`RingBuffer::enqueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueOutcome {
    /// Slot that was written
    pub slot: usize,
    /// The buffer no longer spans the configured delay
    pub overflow: bool,
    /// False if the source had no content to capture
    pub captured: bool,
}

/// Fixed-capacity round-robin snapshot storage
#[derive(Debug)]
pub struct RingBuffer {
    slots: Vec<FrameSnapshot>,
    write_count: u64,
}

impl RingBuffer {
    /// Create a ring of empty snapshots sized `width` x `height`
    pub fn new(capacity: Capacity, width: u32, height: u32) -> Self {
        Self {
            slots: (0..capacity.get())
                .map(|_| FrameSnapshot::new(width, height))
                .collect(),
            write_count: 0,
        }
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Total writes since creation or the last reset
    pub fn write_count(&self) -> u64 {
        self.write_count
    }

    /// Slot the next write lands in
    pub fn next_slot(&self) -> usize {
        (self.write_count % self.slots.len() as u64) as usize
    }

    /// Slot holding the most recent write
    pub fn latest_slot(&self) -> Option<usize> {
        if self.write_count == 0 {
            return None;
        }
        Some(((self.write_count - 1) % self.slots.len() as u64) as usize)
    }

    /// Snapshot at `index`
    pub fn slot(&self, index: usize) -> Option<&FrameSnapshot> {
        self.slots.get(index)
    }

    /// Iterate over all slots in index order
    pub fn slots(&self) -> impl Iterator<Item = &FrameSnapshot> {
        self.slots.iter()
    }

    /// Number of slots that hold a capture
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_empty()).count()
    }

    /// Capture `source` into the next slot
    ///
    /// The write cursor advances even when the capture itself is skipped
    /// (zero-sized source), so writes never skip a slot.
    pub fn enqueue(
        &mut self,
        source: &dyn VisualSource,
        timestamp: u64,
        delay_ms: u64,
    ) -> EnqueueOutcome {
        let slot = self.next_slot();

        // After this write the oldest frame left is the one at the following
        // slot. If even that one is younger than the delay, playback can no
        // longer reach the target.
        let oldest_retained = (slot + 1) % self.slots.len();
        let overflow = self.slots[oldest_retained]
            .captured_at()
            .is_some_and(|oldest| timestamp.saturating_sub(oldest) < delay_ms);

        let captured = self.slots[slot].capture(source, timestamp);
        self.write_count += 1;

        EnqueueOutcome {
            slot,
            overflow,
            captured,
        }
    }

    /// Find the slot whose capture time is nearest to `target`
    ///
    /// Empty slots are ignored. Exact ties resolve to the lowest index.
    /// `target` may be negative early in a session (now < delay).
    pub fn select_best(&self, target: i64) -> Option<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, snapshot)| {
                snapshot
                    .captured_at()
                    .map(|ts| (index, (ts as i64).abs_diff(target)))
            })
            .min_by_key(|&(_, distance)| distance)
            .map(|(index, _)| index)
    }

    /// Reallocate every slot for new source dimensions
    pub fn resize(&mut self, width: u32, height: u32) {
        for snapshot in &mut self.slots {
            snapshot.resize(width, height);
        }
    }

    /// Empty every slot and rewind the write cursor
    pub fn reset(&mut self, width: u32, height: u32) {
        for snapshot in &mut self.slots {
            snapshot.clear();
            snapshot.resize(width, height);
        }
        self.write_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::TestPatternSource;
    use proptest::prelude::*;

    fn ring_with(capacity: usize, timestamps: &[u64], delay_ms: u64) -> RingBuffer {
        let source = TestPatternSource::new(4, 4);
        let mut ring = RingBuffer::new(Capacity::new(capacity).unwrap(), 4, 4);
        for &ts in timestamps {
            ring.enqueue(&source, ts, delay_ms);
        }
        ring
    }

    #[test]
    fn test_capacity_validation() {
        assert!(Capacity::new(0).is_err());
        assert_eq!(
            Capacity::new(1),
            Err(BufferError::InvalidCapacity {
                requested: 1,
                minimum: 2
            })
        );
        assert_eq!(Capacity::new(2).unwrap(), Capacity::MIN);
        assert_eq!(Capacity::default().get(), 60);
    }

    #[test]
    fn test_empty_ring() {
        let ring = ring_with(4, &[], 0);
        assert_eq!(ring.capacity(), 4);
        assert_eq!(ring.write_count(), 0);
        assert_eq!(ring.latest_slot(), None);
        assert_eq!(ring.select_best(100), None);
        assert_eq!(ring.filled(), 0);
    }

    #[test]
    fn test_select_nearest_to_delayed_target() {
        // now = 150, delay = 100 -> target 50
        let ring = ring_with(4, &[0, 30, 60, 90, 120], 100);
        let best = ring.select_best(150 - 100).unwrap();
        assert_eq!(ring.slot(best).unwrap().captured_at(), Some(60));
        assert_eq!(best, 2);
    }

    #[test]
    fn test_select_ties_resolve_to_lowest_index() {
        let ring = ring_with(4, &[40, 60, 60], 0);
        // 40 and 60 are both 10 away from 50
        assert_eq!(ring.select_best(50), Some(0));
        // two identical timestamps
        assert_eq!(ring.select_best(60), Some(1));
    }

    #[test]
    fn test_select_with_negative_target() {
        let ring = ring_with(3, &[5, 10], 0);
        assert_eq!(ring.select_best(-20), Some(0));
    }

    #[test]
    fn test_overflow_reported_but_slot_overwritten() {
        let source = TestPatternSource::new(4, 4);
        let mut ring = RingBuffer::new(Capacity::MIN, 4, 4);

        let first = ring.enqueue(&source, 0, 10);
        assert!(!first.overflow);

        let second = ring.enqueue(&source, 5, 10);
        assert!(second.overflow);
        assert!(second.captured);
        assert_eq!(second.slot, 1);
        assert_eq!(ring.slot(1).unwrap().captured_at(), Some(5));
        assert_eq!(ring.write_count(), 2);
    }

    #[test]
    fn test_no_overflow_when_buffer_spans_delay() {
        let ring_source = TestPatternSource::new(4, 4);
        let mut ring = RingBuffer::new(Capacity::new(4).unwrap(), 4, 4);
        for ts in [0, 30, 60, 90] {
            assert!(!ring.enqueue(&ring_source, ts, 60).overflow);
        }
        // oldest retained after this write is t=30, 120 - 30 >= 60
        assert!(!ring.enqueue(&ring_source, 120, 60).overflow);
    }

    #[test]
    fn test_zero_delay_never_overflows() {
        let ring = {
            let source = TestPatternSource::new(4, 4);
            let mut ring = RingBuffer::new(Capacity::MIN, 4, 4);
            for ts in 0..10 {
                assert!(!ring.enqueue(&source, ts, 0).overflow);
            }
            ring
        };
        assert_eq!(ring.write_count(), 10);
    }

    #[test]
    fn test_cursor_advances_on_skipped_capture() {
        let source = TestPatternSource::new(4, 4);
        let mut ring = RingBuffer::new(Capacity::new(3).unwrap(), 4, 4);
        ring.enqueue(&source, 1, 0);

        source.set_dimensions(0, 0);
        let outcome = ring.enqueue(&source, 2, 0);
        assert!(!outcome.captured);
        assert_eq!(outcome.slot, 1);
        assert_eq!(ring.write_count(), 2);
        assert!(ring.slot(1).unwrap().is_empty());
    }

    #[test]
    fn test_resize_preserves_timestamps() {
        let mut ring = ring_with(3, &[10, 20], 0);
        ring.resize(8, 2);
        assert!(ring.slots().all(|s| s.width() == 8 && s.height() == 2));
        assert_eq!(ring.slot(0).unwrap().captured_at(), Some(10));
        assert_eq!(ring.slot(1).unwrap().captured_at(), Some(20));
        assert_eq!(ring.write_count(), 2);
    }

    #[test]
    fn test_reset() {
        let mut ring = ring_with(3, &[10, 20, 30, 40], 0);
        ring.reset(2, 2);
        assert_eq!(ring.write_count(), 0);
        assert_eq!(ring.filled(), 0);
        assert_eq!(ring.next_slot(), 0);
        assert!(ring.slots().all(|s| s.width() == 2));
    }

    proptest! {
        #[test]
        fn prop_latest_slot_follows_write_count(capacity in 2usize..16, writes in 1u64..200) {
            let source = TestPatternSource::new(1, 1);
            let mut ring = RingBuffer::new(Capacity::new(capacity).unwrap(), 1, 1);
            for ts in 0..writes {
                ring.enqueue(&source, ts, 0);
            }
            let expected = ((writes - 1) % capacity as u64) as usize;
            prop_assert_eq!(ring.latest_slot(), Some(expected));
            prop_assert_eq!(ring.slot(expected).unwrap().captured_at(), Some(writes - 1));
            prop_assert_eq!(ring.write_count(), writes);
        }

        #[test]
        fn prop_select_best_minimises_distance(
            timestamps in proptest::collection::vec(0u64..10_000, 1..32),
            target in -1_000i64..11_000,
        ) {
            let ring = ring_with(timestamps.len().max(2), &timestamps, 0);
            let best = ring.select_best(target).unwrap();
            let best_distance = (ring.slot(best).unwrap().captured_at().unwrap() as i64).abs_diff(target);

            for (index, snapshot) in ring.slots().enumerate() {
                if let Some(ts) = snapshot.captured_at() {
                    let distance = (ts as i64).abs_diff(target);
                    prop_assert!(distance >= best_distance);
                    if distance == best_distance {
                        prop_assert!(index >= best);
                    }
                }
            }
        }
    }
}
