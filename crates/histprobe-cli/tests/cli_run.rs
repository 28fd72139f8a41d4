//! Tests for `histprobe run` driving the fake shell fixture.
//!
//! The fixture binary lives next to `histprobe` once the whole workspace is
//! built. Tests skip when it is absent.
// Test module - relaxed lint rules
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const FAKE_SHELL: &str = "histprobe-fake-shell";
const FAKE_PROMPT: &str = "fake> ";

fn fixture_path(name: &str) -> Option<PathBuf> {
    let histprobe_path = env!("CARGO_BIN_EXE_histprobe");
    let fixture = Path::new(histprobe_path).parent()?.join(name);
    if fixture.exists() {
        Some(fixture)
    } else {
        eprintln!(
            "skipping: fixture binary not found at {}; run 'cargo build --workspace' first",
            fixture.display()
        );
        None
    }
}

fn run_fake(data_dir: &Path, extra: &[&str], shell_args: &[&str]) -> Option<Output> {
    let shell = fixture_path(FAKE_SHELL)?;
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_histprobe"));
    cmd.args(["--color=never", "run", "--shell"])
        .arg(&shell)
        .args(["--prompt", FAKE_PROMPT, "--namespace", "cli_test", "--data-dir"])
        .arg(data_dir)
        .args(extra);
    if !shell_args.is_empty() {
        cmd.arg("--").args(shell_args);
    }
    Some(cmd.output().expect("failed to execute"))
}

fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn passing_run_prints_findings_and_removes_log() {
    let dir = tempfile::tempdir().unwrap();
    let Some(output) = run_fake(dir.path(), &[], &[]) else {
        return;
    };

    assert_eq!(
        output.status.code(),
        Some(0),
        "stdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
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
    assert!(!dir.path().join("fish").join("cli_test.jsonl").exists());
}

#[test]
fn unsaved_history_exits_with_missing_artifact_code() {
    let dir = tempfile::tempdir().unwrap();
    let Some(output) = run_fake(dir.path(), &[], &["--mode", "no-save"]) else {
        return;
    };

    assert_eq!(output.status.code(), Some(3));
    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 1);
    assert!(lines
        .first()
        .unwrap()
        .starts_with("ERROR: History file not found:"));
}

#[test]
fn property_failure_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let Some(output) = run_fake(dir.path(), &[], &["--mode", "no-duration"]) else {
        return;
    };

    assert_eq!(output.status.code(), Some(1));
    let lines = stdout_lines(&output);
    assert!(lines
        .iter()
        .any(|line| line.starts_with("FAIL universal_duration:")));
    assert!(!dir.path().join("fish").join("cli_test.jsonl").exists());
}

#[test]
fn wrong_prompt_times_out_with_timeout_code() {
    let dir = tempfile::tempdir().unwrap();
    let Some(shell) = fixture_path(FAKE_SHELL) else {
        return;
    };
    let output = Command::new(env!("CARGO_BIN_EXE_histprobe"))
        .args(["--color=never", "run", "--shell"])
        .arg(&shell)
        .args(["--prompt", "nope> ", "--timeout-ms", "300", "--data-dir"])
        .arg(dir.path())
        .output()
        .expect("failed to execute");

    assert_eq!(output.status.code(), Some(4));
    let lines = stdout_lines(&output);
    assert!(lines.iter().any(|line| line.contains("E_TIMEOUT")), "{lines:?}");
    assert!(lines.iter().any(|line| line.starts_with("SKIP step")));
}

#[test]
fn json_report_has_run_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let Some(output) = run_fake(dir.path(), &["--json"], &[]) else {
        return;
    };

    assert_eq!(output.status.code(), Some(0));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["report_version"], 1);
    assert_eq!(report["cleanup"]["status"], "removed");
    assert_eq!(report["validation"]["outcome"]["status"], "checked");
    assert_eq!(report["scenario"]["steps"].as_array().unwrap().len(), 5);
}

#[test]
fn scenario_file_replaces_default_steps() {
    let dir = tempfile::tempdir().unwrap();
    let scenario = dir.path().join("scenario.yaml");
    std::fs::write(
        &scenario,
        concat!(
            "name: custom\n",
            "steps:\n",
            "  - name: clear\n",
            "    send: builtin history clear\n",
            "  - name: ok\n",
            "    send: \"true\"\n",
            "  - name: fail\n",
            "    send: \"false\"\n",
            "  - name: block\n",
            "    send: begin; end\n",
            "  - name: again\n",
            "    send: \"true\"\n",
            "  - name: save\n",
            "    send: builtin history save\n",
        ),
    )
    .unwrap();

    let Some(output) = run_fake(
        dir.path(),
        &["--json", "--scenario", scenario.to_str().unwrap()],
        &[],
    ) else {
        return;
    };

    assert_eq!(output.status.code(), Some(0));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["scenario"]["name"], "custom");
    assert_eq!(report["validation"]["outcome"]["entries"], 4);
}

#[test]
fn unreadable_scenario_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_histprobe"))
        .args(["--color=never", "run", "--scenario"])
        .arg(dir.path().join("missing.json"))
        .arg("--data-dir")
        .arg(dir.path())
        .output()
        .expect("failed to execute");

    assert_eq!(output.status.code(), Some(6));
    assert!(String::from_utf8_lossy(&output.stderr).contains("E_IO"));
}
