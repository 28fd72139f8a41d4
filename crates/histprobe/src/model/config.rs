//! Harness configuration.
//!
//! Environment variables are read exactly once, in [`HarnessConfig::from_env`],
//! and mapped into an explicit value that the rest of the crate receives by
//! construction.

use crate::model::policy::EnvPolicy;
use crate::model::TerminalSize;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Variable selecting the history namespace (log file stem).
pub const NAMESPACE_VAR: &str = "fish_history";
/// Variable overriding the base data directory.
pub const DATA_DIR_VAR: &str = "XDG_DATA_HOME";
/// Product subdirectory under the data directory.
pub const PRODUCT_SUBDIR: &str = "fish";
/// Extension of the history log.
pub const LOG_EXTENSION: &str = "jsonl";
/// Namespace used when none (or an invalid one) is configured.
pub const DEFAULT_NAMESPACE: &str = "histprobe_test";
/// Placeholder replaced by the prompt's sequence number.
pub const PROMPT_COUNTER: &str = "{n}";
/// Prompt printed by the default shell init command.
pub const DEFAULT_PROMPT: &str = "histprobe {n}> ";
/// Default shell executable.
pub const DEFAULT_SHELL: &str = "fish";

/// Default per-checkpoint timeout.
pub const DEFAULT_EXPECT_TIMEOUT_MS: u64 = 5_000;

/// Returns true if `name` is usable as a history namespace.
///
/// Namespaces become file names, so only ASCII alphanumerics and underscores
/// are accepted.
pub fn is_valid_namespace(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Where the shell persists its history log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryLocation {
    pub namespace: String,
    /// Explicit base data directory (`XDG_DATA_HOME` equivalent).
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Home directory used to derive the platform default data directory.
    #[serde(default)]
    pub home: Option<PathBuf>,
}

impl HistoryLocation {
    /// Location with an explicit data directory and no home fallback.
    pub fn in_data_dir(namespace: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            namespace: namespace.into(),
            data_dir: Some(data_dir.into()),
            home: None,
        }
    }

    /// Base data directory: the override if set, else `$HOME/.local/share`.
    pub fn base_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Some(dir.clone());
        }
        self.home
            .as_ref()
            .map(|home| home.join(".local").join("share"))
    }

    /// `<data-dir>/<product-subdir>/<namespace>.jsonl`, or `None` when no
    /// data directory can be determined.
    pub fn log_path(&self) -> Option<PathBuf> {
        self.base_dir().map(|base| log_path_in(&base, &self.namespace))
    }
}

/// Join the log file name for `namespace` under `base`.
pub fn log_path_in(base: &Path, namespace: &str) -> PathBuf {
    base.join(PRODUCT_SUBDIR)
        .join(format!("{namespace}.{LOG_EXTENSION}"))
}

/// Shell process configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    /// Literal text the shell prints when idle.
    pub prompt: String,
    #[serde(default)]
    pub env: EnvPolicy,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_SHELL.to_string(),
            args: default_shell_args(DEFAULT_PROMPT),
            cwd: None,
            prompt: DEFAULT_PROMPT.to_string(),
            env: EnvPolicy::default(),
        }
    }
}

/// Arguments that start the default shell without user config and with a
/// fixed prompt.
///
/// [`PROMPT_COUNTER`] in `prompt` becomes a number that advances once per
/// `fish_prompt` event. Repaints reuse the current number.
pub fn default_shell_args(prompt: &str) -> Vec<String> {
    let escaped = prompt.replace('\\', "\\\\").replace('\'', "\\'");
    let init = [
        "set -g __histprobe_prompt 0".to_string(),
        "function __histprobe_prompt_due --on-event fish_prompt; set -g __histprobe_due 1; end"
            .to_string(),
        format!(
            "function fish_prompt; \
             if set -q __histprobe_due; set -eg __histprobe_due; \
             set -g __histprobe_prompt (math $__histprobe_prompt + 1); end; \
             printf '%s' (string replace -a -- '{PROMPT_COUNTER}' $__histprobe_prompt \
             '{escaped}'); end"
        ),
    ];
    vec!["--no-config".to_string(), "-C".to_string(), init.join("; ")]
}

/// Bounded polling used to wait for the out-of-band history flush.
///
/// This only tolerates the race between `history save` returning and the
/// file reaching disk; it is not a synchronization guarantee.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushPolicy {
    pub attempts: u32,
    pub interval_ms: u64,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            attempts: 20,
            interval_ms: 10,
        }
    }
}

/// Thresholds for the log checks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckThresholds {
    /// Minimum number of well-formed entries.
    pub min_entries: usize,
    /// Exit code the failing scenario command is expected to record.
    pub failure_exit_code: i32,
    /// Markers identifying the block construct that has no exit status.
    pub block_start: String,
    pub block_end: String,
}

impl Default for CheckThresholds {
    fn default() -> Self {
        Self {
            min_entries: 3,
            failure_exit_code: 1,
            block_start: "begin".to_string(),
            block_end: "end".to_string(),
        }
    }
}

/// Complete harness configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    pub shell: ShellConfig,
    pub history: HistoryLocation,
    pub expect_timeout_ms: u64,
    #[serde(default)]
    pub flush: FlushPolicy,
    #[serde(default)]
    pub checks: CheckThresholds,
    #[serde(default)]
    pub size: TerminalSize,
}

impl HarnessConfig {
    /// Build a configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let namespace = match lookup(NAMESPACE_VAR) {
            Some(value) if is_valid_namespace(&value) => value,
            Some(value) => {
                tracing::warn!(
                    namespace = %value,
                    fallback = DEFAULT_NAMESPACE,
                    "history namespace is not a valid variable name; falling back"
                );
                DEFAULT_NAMESPACE.to_string()
            }
            None => DEFAULT_NAMESPACE.to_string(),
        };
        let data_dir = lookup(DATA_DIR_VAR)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        let home = lookup("HOME")
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);

        Self {
            shell: ShellConfig::default(),
            history: HistoryLocation {
                namespace,
                data_dir,
                home,
            },
            expect_timeout_ms: DEFAULT_EXPECT_TIMEOUT_MS,
            flush: FlushPolicy::default(),
            checks: CheckThresholds::default(),
            size: TerminalSize::default(),
        }
    }

    /// Shell environment with the history variables applied.
    ///
    /// The namespace is always set; the data directory only when overridden,
    /// so the shell and the validator agree on the log location.
    pub fn shell_env(&self) -> EnvPolicy {
        let mut env = self.shell.env.clone();
        env.set
            .insert(NAMESPACE_VAR.to_string(), self.history.namespace.clone());
        if let Some(dir) = &self.history.data_dir {
            env.set
                .insert(DATA_DIR_VAR.to_string(), dir.display().to_string());
        }
        if let Some(home) = &self.history.home {
            env.set
                .entry("HOME".to_string())
                .or_insert_with(|| home.display().to_string());
        }
        env
    }
}
