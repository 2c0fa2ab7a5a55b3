use crate::common::script_debug;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    script_debug(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("debug"))
        .stdout(predicate::str::contains("completions"));
}

#[test]
fn test_run_help_documents_breakpoints() {
    let dir = TempDir::new().unwrap();
    script_debug(&dir)
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--break"))
        .stdout(predicate::str::contains("--delay"))
        .stdout(predicate::str::contains("--output"));
}

#[test]
fn test_completions_are_generated() {
    let dir = TempDir::new().unwrap();
    script_debug(&dir)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("script-debug"));
}
