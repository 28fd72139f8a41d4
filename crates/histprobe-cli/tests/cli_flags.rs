//! Tests for global flags, help output and completions.
// Test module - relaxed lint rules
#![allow(clippy::expect_used)]

use std::process::Command;

fn histprobe_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_histprobe"))
}

#[test]
fn help_lists_subcommands_and_color_flag() {
    let output = histprobe_bin()
        .arg("--help")
        .output()
        .expect("failed to execute");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for needle in ["run", "validate", "completions", "--color"] {
        assert!(stdout.contains(needle), "help should mention {needle}: {stdout}");
    }
}

#[test]
fn color_modes_are_accepted_and_invalid_rejected() {
    for mode in ["auto", "always", "never"] {
        let output = histprobe_bin()
            .arg(format!("--color={mode}"))
            .arg("--help")
            .output()
            .expect("failed to execute");
        assert!(
            output.status.success(),
            "--color={mode} should be accepted: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    let output = histprobe_bin()
        .arg("--color=sometimes")
        .arg("--help")
        .output()
        .expect("failed to execute");
    assert!(!output.status.success());
}

#[test]
fn color_always_overrides_no_color_env() {
    let output = histprobe_bin()
        .env("NO_COLOR", "1")
        .args(["--color=always", "validate", "--help"])
        .output()
        .expect("failed to execute");

    assert!(
        output.status.success(),
        "--color=always should override NO_COLOR: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn run_help_documents_overrides() {
    let output = histprobe_bin()
        .args(["run", "--help"])
        .output()
        .expect("failed to execute");

    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in [
        "--shell",
        "--namespace",
        "--data-dir",
        "--prompt",
        "--timeout-ms",
        "--scenario",
        "--json",
        "--verbose",
    ] {
        assert!(stdout.contains(flag), "run help should mention {flag}");
    }
}

#[test]
fn run_accepts_short_verbose_flag() {
    let output = histprobe_bin()
        .args(["run", "-v", "--help"])
        .output()
        .expect("failed to execute");

    assert!(
        output.status.success(),
        "run -v --help should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn completions_are_generated_for_bash() {
    let output = histprobe_bin()
        .args(["completions", "bash"])
        .output()
        .expect("failed to execute");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("histprobe"));
    assert!(stdout.contains("validate"));
}

#[test]
fn invalid_namespace_flag_exits_with_protocol_code() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = histprobe_bin()
        .args(["run", "--namespace", "not/valid", "--data-dir"])
        .arg(dir.path())
        .output()
        .expect("failed to execute");

    assert_eq!(output.status.code(), Some(2));
}
