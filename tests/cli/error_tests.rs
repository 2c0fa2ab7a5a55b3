use crate::common::{fixture, script_debug};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_missing_script_fails() {
    let dir = TempDir::new().unwrap();
    script_debug(&dir)
        .args(["run", "does-not-exist.lua"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read script"));
}

#[test]
fn test_script_error_fails_with_message() {
    let dir = TempDir::new().unwrap();
    script_debug(&dir)
        .arg("run")
        .arg(fixture("fail.lua"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("script:2: boom"))
        .stderr(predicate::str::contains("Script failed"));
}

#[test]
fn test_invalid_breakpoint_is_rejected() {
    let dir = TempDir::new().unwrap();
    script_debug(&dir)
        .arg("run")
        .arg(fixture("loop.lua"))
        .args(["--break", "two"])
        .assert()
        .failure();
}

#[test]
fn test_bad_settings_name_the_key() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("config.toml"),
        "[execution]\ndelay_ms = \"slow\"\n",
    )
    .unwrap();
    script_debug(&dir)
        .arg("run")
        .arg(fixture("loop.lua"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("execution.delay_ms"));
}
