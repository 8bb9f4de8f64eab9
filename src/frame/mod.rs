//! Frame storage
//!
//! Fixed-capacity storage for captured source frames:
//!
//! - [`FrameSnapshot`] - one BGRA image plus the time it was captured
//! - [`RingBuffer`] - round-robin sequence of snapshots with a monotonically
//!   increasing write cursor and nearest-timestamp selection
//!
//! # Layout
//!
//! ```text
//!  write_count = 6, capacity = 4
//!
//!  slot:        0      1      2      3
//!             ┌──────┬──────┬──────┬──────┐
//!  captured:  │ t=120│ t=150│ t= 60│ t= 90│
//!             └──────┴──────┴──────┴──────┘
//!                        ▲      ▲
//!                 latest ┘      └ next write (oldest retained)
//! ```
//!
//! Slots are never freed; a write overwrites the slot in place and a resize
//! reallocates each slot's backing store without clearing its timestamp.

mod ring;
mod snapshot;

pub use ring::{BufferError, Capacity, EnqueueOutcome, RingBuffer};
pub use snapshot::{FrameSnapshot, BYTES_PER_PIXEL};
