//! Shared helpers for histprobe tests.
//!
//! The `histprobe-fake-shell` binary in this crate stands in for the real
//! shell: it prints a fixed prompt, runs a handful of built-in commands and
//! writes the JSON Lines history log at the same location the harness reads.

use std::fs;
use std::path::{Path, PathBuf};

use histprobe::model::{log_path_in, HarnessConfig, HistoryLocation, ShellConfig};

/// Prompt printed by the fake shell unless [`PROMPT_VAR`] overrides it.
pub const FAKE_SHELL_PROMPT: &str = "fake> ";
/// Variable selecting the fake shell's [`FakeMode`].
pub const MODE_VAR: &str = "HISTPROBE_FAKE_MODE";
/// Variable overriding the fake shell's prompt.
pub const PROMPT_VAR: &str = "HISTPROBE_FAKE_PROMPT";

/// A log that satisfies every history property.
pub const MINIMAL_VALID_LOG: &str = concat!(
    "{\"cmd\":\"true\",\"exit\":0,\"dur\":1}\n",
    "{\"cmd\":\"false\",\"exit\":1,\"dur\":1}\n",
    "{\"cmd\":\"begin; end\",\"dur\":0}\n",
);

/// How the fake shell persists history.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FakeMode {
    /// One complete record per command.
    #[default]
    Normal,
    /// Each item split over id-tagged annotation lines.
    Split,
    /// Records never carry `dur`.
    NoDuration,
    /// `history save` is a no-op, so no log appears.
    NoSave,
    /// The block construct records exit status 0.
    BlockExit,
}

impl FakeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FakeMode::Normal => "normal",
            FakeMode::Split => "split",
            FakeMode::NoDuration => "no-duration",
            FakeMode::NoSave => "no-save",
            FakeMode::BlockExit => "block-exit",
        }
    }

    /// Unknown names fall back to [`FakeMode::Normal`].
    pub fn parse(name: &str) -> Self {
        match name {
            "split" => FakeMode::Split,
            "no-duration" => FakeMode::NoDuration,
            "no-save" => FakeMode::NoSave,
            "block-exit" => FakeMode::BlockExit,
            _ => FakeMode::Normal,
        }
    }
}

/// Harness configuration that drives `fake_shell` and stores history under
/// `data_dir`.
#[must_use]
pub fn fake_shell_config(
    fake_shell: &Path,
    data_dir: &Path,
    namespace: &str,
    mode: FakeMode,
) -> HarnessConfig {
    let mut config = HarnessConfig::from_lookup(|_| None);
    let mut shell = ShellConfig {
        command: fake_shell.display().to_string(),
        args: Vec::new(),
        cwd: None,
        prompt: FAKE_SHELL_PROMPT.to_string(),
        env: config.shell.env.clone(),
    };
    shell
        .env
        .set
        .insert(MODE_VAR.to_string(), mode.as_str().to_string());
    shell
        .env
        .set
        .insert(PROMPT_VAR.to_string(), FAKE_SHELL_PROMPT.to_string());
    config.shell = shell;
    config.history = HistoryLocation::in_data_dir(namespace, data_dir);
    config
}

/// Write `contents` where the harness expects the log for `namespace`.
///
/// # Panics
///
/// Panics if the directory or file cannot be written.
pub fn write_log(data_dir: &Path, namespace: &str, contents: &str) -> PathBuf {
    let path = log_path_in(data_dir, namespace);
    if let Some(parent) = path.parent() {
        #[allow(clippy::expect_used)]
        fs::create_dir_all(parent).expect("failed to create history directory");
    }
    #[allow(clippy::expect_used)]
    fs::write(&path, contents).expect("failed to write history log");
    path
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn write_log_uses_harness_path_convention() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_log(dir.path(), "ns", MINIMAL_VALID_LOG);
        assert_eq!(path, dir.path().join("fish").join("ns.jsonl"));
        assert_eq!(fs::read_to_string(path).unwrap(), MINIMAL_VALID_LOG);
    }

    #[test]
    fn fake_shell_config_points_history_at_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = fake_shell_config(
            Path::new("/bin/fake"),
            dir.path(),
            "ns",
            FakeMode::Split,
        );
        assert_eq!(
            config.history.log_path(),
            Some(dir.path().join("fish").join("ns.jsonl"))
        );
        let env = config.shell_env();
        assert_eq!(env.set.get(MODE_VAR).map(String::as_str), Some("split"));
        assert_eq!(env.set.get("fish_history").map(String::as_str), Some("ns"));
    }

    #[test]
    fn mode_names_round_trip() {
        for mode in [
            FakeMode::Normal,
            FakeMode::Split,
            FakeMode::NoDuration,
            FakeMode::NoSave,
            FakeMode::BlockExit,
        ] {
            assert_eq!(FakeMode::parse(mode.as_str()), mode);
        }
        assert_eq!(FakeMode::parse("bogus"), FakeMode::Normal);
    }
}
