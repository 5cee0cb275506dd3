//! Build script for onair-playout
//!
//! Stamps the binary with the short git commit and build time so the
//! `/health` endpoint can report exactly what is running on air.

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

    println!("cargo:rustc-env=ONAIR_GIT_HASH={}", git_hash);
    println!("cargo:rustc-env=ONAIR_BUILT_AT={}", built_at);
    // Paths are relative to the crate; the repository root is one level up
    println!("cargo:rerun-if-changed=../.git/HEAD");
}
