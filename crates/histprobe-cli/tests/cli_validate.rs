//! Tests for `histprobe validate` against logs on disk.
// Test module - relaxed lint rules
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use std::path::Path;
use std::process::{Command, Output};

const MINIMAL_VALID_LOG: &str = concat!(
    "{\"cmd\":\"true\",\"exit\":0,\"dur\":1}\n",
    "{\"cmd\":\"false\",\"exit\":1,\"dur\":1}\n",
    "{\"cmd\":\"begin; end\",\"dur\":0}\n",
);

fn validate(log: &Path, json: bool) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_histprobe"));
    cmd.args(["--color=never", "validate", "--log"]).arg(log);
    if json {
        cmd.arg("--json");
    }
    cmd.output().expect("failed to execute")
}

fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn valid_log_prints_one_line_per_property_and_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("h.jsonl");
    std::fs::write(&log, MINIMAL_VALID_LOG).unwrap();

    let output = validate(&log, false);

    assert_eq!(output.status.code(), Some(0), "{output:?}");
    assert_eq!(
        stdout_lines(&output),
        vec![
            "Found at least 3 history items",
            "Found exit code 0",
            "Found exit code 1",
            "All 3 items have duration",
            "begin;end has no exit code",
            "begin;end has duration",
        ]
    );
    assert!(log.exists(), "validate must not delete the log");
}

#[test]
fn failing_property_exits_one_with_fail_line() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("h.jsonl");
    std::fs::write(
        &log,
        concat!(
            "{\"cmd\":\"true\",\"exit\":0,\"dur\":1}\n",
            "{\"cmd\":\"false\",\"exit\":1}\n",
            "{\"cmd\":\"begin; end\",\"dur\":0}\n",
        ),
    )
    .unwrap();

    let output = validate(&log, false);

    assert_eq!(output.status.code(), Some(1));
    let lines = stdout_lines(&output);
    assert!(lines
        .iter()
        .any(|line| line.starts_with("FAIL universal_duration:")));
    assert_eq!(lines.len(), 6);
}

#[test]
fn missing_log_prints_single_error_and_exits_three() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("fish").join("absent.jsonl");

    let output = validate(&log, false);

    assert_eq!(output.status.code(), Some(3));
    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 1);
    assert!(lines
        .first()
        .unwrap()
        .starts_with("ERROR: History file not found:"));
}

#[test]
fn malformed_lines_are_warned_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("h.jsonl");
    std::fs::write(&log, format!("garbage\n{MINIMAL_VALID_LOG}")).unwrap();

    let output = validate(&log, false);

    assert_eq!(output.status.code(), Some(0));
    let lines = stdout_lines(&output);
    assert!(lines
        .first()
        .unwrap()
        .starts_with("WARN line 1: malformed record"));
}

#[test]
fn json_output_is_machine_readable() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("h.jsonl");
    std::fs::write(&log, MINIMAL_VALID_LOG).unwrap();

    let output = validate(&log, true);

    assert_eq!(output.status.code(), Some(0));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["outcome"]["status"], "checked");
    assert_eq!(report["outcome"]["entries"], 3);
    assert_eq!(
        report["outcome"]["properties"].as_array().unwrap().len(),
        6
    );
}

#[test]
fn json_output_for_missing_log() {
    let dir = tempfile::tempdir().unwrap();
    let output = validate(&dir.path().join("absent.jsonl"), true);

    assert_eq!(output.status.code(), Some(3));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["outcome"]["status"], "missing_artifact");
}

#[test]
fn json_output_tags_malformed_lines_with_their_code() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("h.jsonl");
    std::fs::write(&log, format!("{MINIMAL_VALID_LOG}{{\"cmd\":\n")).unwrap();

    let output = validate(&log, true);

    assert_eq!(output.status.code(), Some(0));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let malformed = report["outcome"]["malformed"].as_array().unwrap();
    assert_eq!(malformed.len(), 1);
    let bad = malformed.first().unwrap();
    assert_eq!(bad["code"], "E_MALFORMED_RECORD");
    assert_eq!(bad["line"], 4);
}
