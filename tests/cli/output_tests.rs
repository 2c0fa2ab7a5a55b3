use crate::common::{fixture, script_debug};
use serde_json::Value;
use tempfile::TempDir;

fn json_events(args: &[&str], script: &str) -> Vec<Value> {
    let dir = TempDir::new().unwrap();
    let output = script_debug(&dir)
        .arg("--quiet")
        .arg("run")
        .arg(fixture(script))
        .args(args)
        .args(["--output", "json"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8(output.stdout).expect("Stdout is not valid UTF-8");
    stdout
        .lines()
        .map(|line| {
            serde_json::from_str(line)
                .unwrap_or_else(|e| panic!("not JSON ({}): {}", e, line))
        })
        .collect()
}

fn kinds(events: &[Value]) -> Vec<&str> {
    events
        .iter()
        .map(|e| e["event"].as_str().unwrap_or_default())
        .collect()
}

#[test]
fn test_json_output_is_one_event_per_line() {
    let events = json_events(&[], "loop.lua");
    let kinds = kinds(&events);
    assert_eq!(kinds.first(), Some(&"execution_started"));
    assert_eq!(kinds.last(), Some(&"execution_finished"));

    let text: String = events
        .iter()
        .filter(|e| e["event"] == "output_received")
        .filter_map(|e| e["text"].as_str())
        .collect();
    assert_eq!(text, "0\n1\n2\n");
}

#[test]
fn test_json_output_reports_pause_and_resume() {
    let events = json_events(&["--break", "5"], "add.lua");
    let states: Vec<&str> = events
        .iter()
        .filter(|e| e["event"] == "debug_state_changed")
        .filter_map(|e| e["state"].as_str())
        .collect();
    assert_eq!(states, vec!["paused", "running"]);
}

#[test]
fn test_json_output_carries_errors() {
    let events = json_events(&[], "fail.lua");
    let errors: Vec<&str> = events
        .iter()
        .filter(|e| e["event"] == "error_occurred")
        .filter_map(|e| e["message"].as_str())
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("boom"));
}
