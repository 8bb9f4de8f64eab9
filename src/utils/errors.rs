//! User-Friendly Error Formatting
//!
//! Provides user-friendly error messages with troubleshooting hints
//! for common error scenarios.

use std::fmt::Write;

/// Format error for user consumption
///
/// Takes technical error and produces user-friendly message with
/// troubleshooting steps and context.
pub fn format_user_error(error: &anyhow::Error) -> String {
    let mut output = String::new();

    // Header
    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "╔════════════════════════════════════════════════════════════╗"
    )
    .ok();
    writeln!(
        &mut output,
        "║                     ERROR                                  ║"
    )
    .ok();
    writeln!(
        &mut output,
        "╚════════════════════════════════════════════════════════════╝"
    )
    .ok();
    writeln!(&mut output).ok();

    // Match against the whole chain so context layers count too
    let error_msg = format!("{:#}", error);

    if error_msg.contains("capacity") {
        format_capacity_error(&mut output);
    } else if error_msg.contains("refresh rate") || error_msg.contains("frame rate") {
        format_rate_error(&mut output);
    } else if error_msg.contains("config") {
        format_config_error(&mut output);
    } else if error_msg.contains("log") {
        format_logging_error(&mut output);
    } else {
        format_generic_error(&mut output, &error.to_string());
    }

    // Technical details
    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
    )
    .ok();
    writeln!(&mut output, "Technical Details:").ok();
    writeln!(&mut output).ok();
    writeln!(&mut output, "{:#}", error).ok();
    writeln!(&mut output).ok();

    // Footer with help
    writeln!(
        &mut output,
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
    )
    .ok();
    writeln!(&mut output, "Need Help?").ok();
    writeln!(
        &mut output,
        "  - Run with --verbose for detailed logs: lamco-frame-delay -vv"
    )
    .ok();
    writeln!(
        &mut output,
        "  - Override the delay without a file: lamco-frame-delay --delay-ms 500"
    )
    .ok();
    writeln!(
        &mut output,
        "╚════════════════════════════════════════════════════════════╝"
    )
    .ok();

    output
}

fn format_capacity_error(output: &mut String) {
    writeln!(output, "Buffer Capacity Error").ok();
    writeln!(output).ok();
    writeln!(output, "The frame ring buffer size is not usable.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Capacity below the minimum").ok();
    writeln!(output, "     → [buffer] capacity must be at least 2").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Capacity too small for the delay").ok();
    writeln!(
        output,
        "     → Need roughly delay_ms × frame_rate / 1000 slots, plus one"
    )
    .ok();
    writeln!(
        output,
        "     → Example: 500 ms at 30 FPS needs at least 16 slots"
    )
    .ok();
}

fn format_rate_error(output: &mut String) {
    writeln!(output, "Timing Configuration Error").ok();
    writeln!(output).ok();
    writeln!(output, "A refresh or frame rate in the configuration is zero.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. [display] refresh_hz = 0").ok();
    writeln!(output, "     → Use the display's refresh rate, e.g. 60").ok();
    writeln!(output).ok();
    writeln!(output, "  2. [source] frame_rate = 0").ok();
    writeln!(output, "     → Use the source's native rate, e.g. 30").ok();
}

fn format_config_error(output: &mut String) {
    writeln!(output, "Configuration Error").ok();
    writeln!(output).ok();
    writeln!(output, "Problem with configuration file.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Configuration file not found").ok();
    writeln!(
        output,
        "     → Specify: lamco-frame-delay -c /path/to/config.toml"
    )
    .ok();
    writeln!(output, "     → Without a file, built-in defaults are used").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Invalid TOML syntax").ok();
    writeln!(output, "     → Check for typos, missing quotes, etc.").ok();
    writeln!(output).ok();
    writeln!(output, "  3. Wrong value types").ok();
    writeln!(
        output,
        "     → delay_ms, capacity and rates are integers; paused is a boolean"
    )
    .ok();
}

fn format_logging_error(output: &mut String) {
    writeln!(output, "Logging Error").ok();
    writeln!(output).ok();
    writeln!(output, "Could not set up log output.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Log file directory does not exist or is read-only").ok();
    writeln!(output, "     → Check the --log-file path").ok();
}

fn format_generic_error(output: &mut String, error: &str) {
    writeln!(output, "Engine Error").ok();
    writeln!(output).ok();
    writeln!(output, "An error occurred while running the delay engine.").ok();
    writeln!(output).ok();
    writeln!(output, "Error: {}", error).ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_format_user_error() {
        let error = anyhow::anyhow!("something went sideways");
        let formatted = format_user_error(&error);
        assert!(formatted.contains("ERROR"));
        assert!(formatted.contains("Engine Error"));
        assert!(formatted.contains("something went sideways"));
    }

    #[test]
    fn test_capacity_hint_from_context_chain() {
        let error = Err::<(), _>(anyhow::anyhow!("requested 1, minimum 2"))
            .context("Invalid buffer capacity in config")
            .unwrap_err();
        let formatted = format_user_error(&error);
        assert!(formatted.contains("Buffer Capacity Error"));
        assert!(formatted.contains("requested 1, minimum 2"));
    }

    #[test]
    fn test_config_error_formatting() {
        let error = anyhow::anyhow!("Failed to read config file: /nope.toml");
        let formatted = format_user_error(&error);
        assert!(formatted.contains("Configuration Error"));
    }
}
