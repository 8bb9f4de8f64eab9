//! Session statistics

/// Counters for one session's capture and playback loops
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Snapshots written into the ring
    pub frames_captured: u64,

    /// Capture cycles skipped (inactive, paused or hidden source)
    pub captures_skipped: u64,

    /// Captures that advanced the cursor without content (zero-sized source)
    pub captures_empty: u64,

    /// Writes that happened while the ring could not span the delay
    pub overflow_events: u64,

    /// Snapshots drawn to the output surface
    pub frames_rendered: u64,

    /// Playback cycles with nothing new to draw
    pub renders_skipped: u64,

    /// Draws that failed and were skipped
    pub render_failures: u64,

    /// Geometry re-syncs
    pub resizes: u64,
}

impl SessionStats {
    /// Fraction of writes that overflowed
    pub fn overflow_rate(&self) -> f64 {
        let writes = self.frames_captured + self.captures_empty;
        if writes == 0 {
            0.0
        } else {
            self.overflow_events as f64 / writes as f64
        }
    }

    /// Fraction of draw attempts that failed
    pub fn render_failure_rate(&self) -> f64 {
        let attempts = self.frames_rendered + self.render_failures;
        if attempts == 0 {
            0.0
        } else {
            self.render_failures as f64 / attempts as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates() {
        let stats = SessionStats {
            frames_captured: 90,
            captures_empty: 10,
            overflow_events: 25,
            frames_rendered: 45,
            render_failures: 5,
            ..SessionStats::default()
        };
        assert_eq!(stats.overflow_rate(), 0.25);
        assert_eq!(stats.render_failure_rate(), 0.1);
    }

    #[test]
    fn test_rates_with_no_activity() {
        let stats = SessionStats::default();
        assert_eq!(stats.overflow_rate(), 0.0);
        assert_eq!(stats.render_failure_rate(), 0.0);
    }
}
