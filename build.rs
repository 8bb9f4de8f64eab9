//! Build script for lamco-frame-delay
//!
//! Embeds build identification (date, time, commit) for the startup banner.

use std::process::Command;

fn command_output(program: &str, args: &[&str], fallback: &str) -> String {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_else(|| fallback.to_string())
}

fn main() {
    let date = command_output("date", &["+%Y-%m-%d"], "unknown");
    let time = command_output("date", &["+%H:%M:%S"], "");
    let git_hash = command_output("git", &["rev-parse", "--short", "HEAD"], "unknown");

    println!("cargo:rustc-env=BUILD_DATE={}", date);
    println!("cargo:rustc-env=BUILD_TIME={}", time);
    println!("cargo:rustc-env=GIT_HASH={}", git_hash);

    println!("cargo:rerun-if-changed=.git/HEAD");
}
