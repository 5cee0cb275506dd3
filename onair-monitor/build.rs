//! Build script for onair-monitor
//!
//! Captures build identification for the `/health` endpoint:
//! - Git commit hash (short form)
//! - Build timestamp
//! - Build profile (debug/release)

use std::process::Command;

fn main() {
    let git_hash = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let built_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=ONAIR_GIT_HASH={}", git_hash);
    println!("cargo:rustc-env=ONAIR_BUILT_AT={}", built_at);
    println!("cargo:rustc-env=ONAIR_BUILD_PROFILE={}", profile);
    // Paths are relative to the crate; the repository root is one level up
    println!("cargo:rerun-if-changed=../.git/HEAD");
}
