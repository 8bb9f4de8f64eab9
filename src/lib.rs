//! # lamco-frame-delay
//!
//! Frame delay engine: shows a visual source's content a configurable number
//! of milliseconds late.
//!
//! Each delayed source gets a [`session::Session`] that captures timestamped
//! snapshots into a fixed-capacity ring buffer at the source's cadence and, at
//! the display's cadence, draws the snapshot whose capture time is closest to
//! `now - delay` onto an output surface positioned over the source.
//!
//! # Architecture
//!
//! ```text
//! lamco-frame-delay
//!   ├─> DelayController (delay/pause authority, SourceId -> Session registry)
//!   │     └─> Session (one per delayed source)
//!   │           ├─> RingBuffer of FrameSnapshot
//!   │           ├─> capture loop   (source cadence)
//!   │           ├─> playback loop  (display cadence)
//!   │           └─> geometry watcher
//!   ├─> VisualSource (content provider, e.g. TestPatternSource)
//!   ├─> SurfaceProvider / OutputSurface (drawable over the source)
//!   └─> Scheduler + Clock (tickers and timestamps)
//! ```
//!
//! # Data Flow
//!
//! **Capture Path:** VisualSource → FrameSnapshot (ring slot) → RingBuffer
//!
//! **Playback Path:** RingBuffer → select_best(now − delay) → OutputSurface
//!
//! **Control Path:** Config / SIGHUP → `watch` feed → DelayController → Sessions

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Engine configuration
pub mod config;

/// Delay/pause authority and session registry
pub mod controller;

/// Frame snapshots and the ring buffer
pub mod frame;

/// Tickers and clocks
pub mod scheduler;

/// Per-source delay sessions and their loops
pub mod session;

/// Visual source abstraction
pub mod source;

/// Output surfaces
pub mod surface;

/// Utility functions
pub mod utils;

pub use controller::{DelayController, DelaySettings};
pub use frame::{BufferError, Capacity, FrameSnapshot, RingBuffer};
pub use scheduler::{Clock, ManualClock, MonotonicClock, Scheduler};
pub use session::{CaptureOutcome, EngineContext, PlaybackOutcome, Session, SessionStats};
pub use source::{FitMode, SourceGeometry, SourceId, TestPatternSource, VisualSource};
pub use surface::{OutputSurface, RenderError, SoftwareSurfaceProvider, SurfaceProvider};
