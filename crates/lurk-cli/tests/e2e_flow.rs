//! End-to-end tests for the complete flow.
//!
//! Tests the full pipeline: ingest → write state → ingest with prior state → report

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn lurk_binary() -> String {
    env!("CARGO_BIN_EXE_lurk").to_string()
}

fn lurk(home: &Path, args: &[&str]) -> Output {
    Command::new(lurk_binary())
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("XDG_DATA_HOME", home.join(".local/share"))
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("failed to run lurk")
}

/// Fixture logs are from 2020; keep them inside the report's retention window.
fn lurk_report(home: &Path, args: &[&str]) -> Output {
    Command::new(lurk_binary())
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("XDG_DATA_HOME", home.join(".local/share"))
        .env("LURK_RETENTION_DAYS", "100000")
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("failed to run lurk")
}

fn state_json(path: &Path) -> serde_json::Value {
    let text = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&text).unwrap()
}

const DAY_ONE: &str = "\
--- Log opened Mon Jan 01 00:00:00 2020
09:00 (-) alice [~alice@host] has joined #x
09:01 <alice> hi
09:02 <alice> hi again
09:05 (-) alice [~alice@host] has quit [Ping timeout]
09:10 (-) bob [~bob@host] has joined #x
09:20 (-) bob is now known as bobby
09:30 (-) bobby was kicked from #x by op [spam]
--- Log closed Mon Jan 01 23:00:00 2020
";

const DAY_TWO: &str = "\
--- Log opened Thu Jan 02 08:00:00 2020
08:00 <alice> back
08:10 (-) alice [~alice@host] has left #x []
";

/// Test the reference scenario end to end through the binary.
#[test]
fn test_ingest_writes_state() {
    let temp = TempDir::new().unwrap();
    let log = temp.path().join("day1.log");
    let state = temp.path().join("state.json");
    std::fs::write(&log, DAY_ONE).unwrap();

    let output = lurk(
        temp.path(),
        &["ingest", log.to_str().unwrap(), "-w", state.to_str().unwrap()],
    );
    assert!(
        output.status.success(),
        "ingest should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "1 files, 9 lines, 7 events, 3 names\n"
    );

    let doc = state_json(&state);
    let alice = &doc["records"][doc["names"]["alice"].as_u64().unwrap() as usize];
    assert_eq!(alice["n_visits"], 2);
    assert_eq!(alice["total_lines"], 2);
    assert_eq!(alice["total_time_seconds"], 300.0);
    assert_eq!(alice["visits_by_bucket"]["10"], 300.0);
    assert_eq!(alice["last_in_at"], "2020-01-01T09:05:00");

    // bob and bobby share one record
    assert_eq!(doc["names"]["bob"], doc["names"]["bobby"]);
}

/// Test that prior state is extended by a second run.
#[test]
fn test_ingest_with_prior_state() {
    let temp = TempDir::new().unwrap();
    let day1 = temp.path().join("day1.log");
    let day2 = temp.path().join("day2.log");
    let state = temp.path().join("state.json");
    std::fs::write(&day1, DAY_ONE).unwrap();
    std::fs::write(&day2, DAY_TWO).unwrap();

    let first = lurk(
        temp.path(),
        &["ingest", day1.to_str().unwrap(), "-w", state.to_str().unwrap()],
    );
    assert!(first.status.success());

    let second = lurk(
        temp.path(),
        &[
            "ingest",
            day2.to_str().unwrap(),
            "-r",
            state.to_str().unwrap(),
            "-w",
            state.to_str().unwrap(),
        ],
    );
    assert!(
        second.status.success(),
        "second ingest should succeed: {}",
        String::from_utf8_lossy(&second.stderr)
    );

    let doc = state_json(&state);
    let alice = &doc["records"][doc["names"]["alice"].as_u64().unwrap() as usize];
    assert_eq!(alice["n_visits"], 3);
    assert_eq!(alice["total_lines"], 3);
    assert_eq!(alice["total_time_seconds"], 900.0);
}

/// Test that a line without a timestamp aborts with file and line.
#[test]
fn test_malformed_log_fails_with_location() {
    let temp = TempDir::new().unwrap();
    let log = temp.path().join("broken.log");
    let state = temp.path().join("state.json");
    std::fs::write(
        &log,
        "--- Log opened Mon Jan 01 00:00:00 2020\n09:00 <alice> hi\nstray noise\n",
    )
    .unwrap();

    let output = lurk(
        temp.path(),
        &["ingest", log.to_str().unwrap(), "-w", state.to_str().unwrap()],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("broken.log:3"), "stderr: {stderr}");
    assert!(!state.exists(), "no state should be written on failure");
}

/// Test that a log starting without a header is rejected.
#[test]
fn test_missing_header_fails() {
    let temp = TempDir::new().unwrap();
    let log = temp.path().join("headless.log");
    std::fs::write(&log, "09:00 <alice> hi\n").unwrap();

    let output = lurk(temp.path(), &["ingest", log.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("headless.log:1"), "stderr: {stderr}");
}

/// Test that an unreadable prior state fails the run.
#[test]
fn test_missing_prior_state_fails() {
    let temp = TempDir::new().unwrap();
    let log = temp.path().join("day1.log");
    std::fs::write(&log, DAY_ONE).unwrap();

    let output = lurk(
        temp.path(),
        &[
            "ingest",
            log.to_str().unwrap(),
            "-r",
            temp.path().join("nope.json").to_str().unwrap(),
        ],
    );
    assert!(!output.status.success());
}

/// Test the report over a written state file.
#[test]
fn test_report_from_state() {
    let temp = TempDir::new().unwrap();
    let log = temp.path().join("day1.log");
    let state = temp.path().join("state.json");
    std::fs::write(&log, DAY_ONE).unwrap();

    let ingest = lurk(
        temp.path(),
        &["ingest", log.to_str().unwrap(), "-w", state.to_str().unwrap()],
    );
    assert!(ingest.status.success());

    let report = lurk_report(temp.path(), &["report", state.to_str().unwrap(), "--json"]);
    assert!(
        report.status.success(),
        "report should succeed: {}",
        String::from_utf8_lossy(&report.stderr)
    );
    let json: serde_json::Value = serde_json::from_slice(&report.stdout).unwrap();
    assert_eq!(json["most_talkative"][0]["name"], "alice");
    assert_eq!(json["said_nothing"], serde_json::json!(["bob"]));
}

/// Test that `report` falls back to the configured state path.
#[test]
fn test_report_uses_configured_state_path() {
    let temp = TempDir::new().unwrap();
    let log = temp.path().join("day1.log");
    let state = temp.path().join("custom-state.json");
    let config = temp.path().join("lurk.toml");
    std::fs::write(&log, DAY_ONE).unwrap();
    std::fs::write(
        &config,
        format!(
            "state_path = {:?}\nretention_days = 100000\n",
            state.to_str().unwrap()
        ),
    )
    .unwrap();

    let ingest = lurk(
        temp.path(),
        &["ingest", log.to_str().unwrap(), "-w", state.to_str().unwrap()],
    );
    assert!(ingest.status.success());

    let report = lurk(
        temp.path(),
        &["--config", config.to_str().unwrap(), "report"],
    );
    assert!(
        report.status.success(),
        "report should succeed: {}",
        String::from_utf8_lossy(&report.stderr)
    );
    let stdout = String::from_utf8_lossy(&report.stdout);
    assert!(stdout.contains("most talkative irc-ers:"));
    assert!(stdout.contains("1. alice"));
}
