// LogMeter - GPL-3.0-or-later
// Build script to embed version info at compile time

use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok()
}

fn main() {
    let hash = git(&["rev-parse", "--short", "HEAD"])
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let dirty = git(&["status", "--porcelain"]).is_some_and(|s| !s.is_empty());

    if dirty {
        println!("cargo:rustc-env=GIT_HASH={hash}-dirty");
    } else {
        println!("cargo:rustc-env=GIT_HASH={hash}");
    }

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
}
