use crate::common::{fixture, script_debug};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_run_prints_script_output() {
    let dir = TempDir::new().unwrap();
    script_debug(&dir)
        .arg("run")
        .arg(fixture("loop.lua"))
        .assert()
        .success()
        .stdout("0\n1\n2\n");
}

#[test]
fn test_run_reports_breakpoints_and_keeps_going() {
    let dir = TempDir::new().unwrap();
    script_debug(&dir)
        .arg("run")
        .arg(fixture("add.lua"))
        .args(["--break", "2", "--break", "6"])
        .assert()
        .success()
        .stdout("3\n")
        .stderr(predicate::str::contains("paused at line 2: local s = a + b"))
        .stderr(predicate::str::contains("paused at line 6: print(r)"));
}

#[test]
fn test_include_dir_resolves_require() {
    let dir = TempDir::new().unwrap();
    script_debug(&dir)
        .arg("run")
        .arg(fixture("uses_module.lua"))
        .arg("-I")
        .arg(fixture("modules"))
        .assert()
        .success()
        .stdout("hello, lua\n");
}

#[test]
fn test_host_module_is_available() {
    let dir = TempDir::new().unwrap();
    script_debug(&dir)
        .arg("run")
        .arg(fixture("host.lua"))
        .assert()
        .success()
        .stdout("3\tProcessed by host: abc\n");
}

#[test]
fn test_settings_file_supplies_search_paths() {
    let dir = TempDir::new().unwrap();
    let modules = fixture("modules");
    fs::write(
        dir.path().join("config.toml"),
        format!(
            "[runtime]\nsearch_paths = [{:?}]\n",
            modules.display().to_string()
        ),
    )
    .unwrap();
    script_debug(&dir)
        .arg("run")
        .arg(fixture("uses_module.lua"))
        .assert()
        .success()
        .stdout("hello, lua\n");
}
