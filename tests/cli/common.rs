use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::TempDir;

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/scripts")
        .join(name)
}

/// The binary, isolated from any settings file on the machine.
pub fn script_debug(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("script-debug").unwrap();
    cmd.env("SCRIPT_DEBUG_CONFIG", config_dir.path().join("config.toml"))
        .env_remove("RUST_LOG");
    cmd
}
