//! Utility Functions
//!
//! User-friendly error formatting and small formatting helpers used by the
//! binary.
//!
//! ## Error Formatting
//!
//! The [`errors`] module provides user-friendly error messages:
//!
//! ```rust,no_run
//! use lamco_frame_delay::utils::format_user_error;
//!
//! # fn operation() -> anyhow::Result<()> { Ok(()) }
//! if let Err(e) = operation() {
//!     eprintln!("{}", format_user_error(&e));
//! }
//! ```
//!
//! Error categories with context-aware help:
//! - Capacity errors → minimum size, sizing for the configured delay
//! - Rate errors → zero refresh or frame rate
//! - Config errors → file location, syntax, value types

use std::time::Duration;

pub mod errors;

pub use errors::format_user_error;

/// Format an uptime as `HH:MM:SS`
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
