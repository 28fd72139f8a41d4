use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Variables passed through from the harness environment by default.
///
/// Everything else is cleared so the user's real history settings cannot
/// leak into the spawned shell.
pub const DEFAULT_ENV_ALLOWLIST: &[&str] = &["PATH", "HOME", "USER", "LANG", "LC_ALL", "TMPDIR"];

/// Environment variable policy for the spawned shell.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvPolicy {
    /// Environment variable names to allow through.
    #[serde(default)]
    pub allowlist: Vec<String>,
    /// Explicit environment variable values to set.
    #[serde(default)]
    pub set: BTreeMap<String, String>,
    /// Inherit environment from parent (filtered by allowlist).
    #[serde(default)]
    pub inherit: bool,
}

impl Default for EnvPolicy {
    fn default() -> Self {
        let mut set = BTreeMap::new();
        set.insert("TERM".to_string(), "xterm".to_string());
        Self {
            allowlist: DEFAULT_ENV_ALLOWLIST
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
            set,
            inherit: true,
        }
    }
}
