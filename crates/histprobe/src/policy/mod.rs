//! Environment policy for the spawned shell.

use crate::model::policy::EnvPolicy;
use crate::runner::HarnessError;

/// Variables that let a caller inject code into the shell under test.
const DANGEROUS_ENV_VARS: &[&str] = &[
    // Linux library injection
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "LD_AUDIT",
    // macOS library injection
    "DYLD_INSERT_LIBRARIES",
    "DYLD_LIBRARY_PATH",
    "DYLD_FRAMEWORK_PATH",
];

fn is_dangerous_env_var(key: &str) -> bool {
    DANGEROUS_ENV_VARS
        .iter()
        .any(|d| d.eq_ignore_ascii_case(key))
}

/// Reject policies that would forward injection variables.
pub fn validate_env_policy(env_policy: &EnvPolicy) -> Result<(), HarnessError> {
    let offending = env_policy
        .allowlist
        .iter()
        .chain(env_policy.set.keys())
        .find(|key| is_dangerous_env_var(key));
    if let Some(key) = offending {
        return Err(HarnessError::protocol(
            "dangerous environment variable blocked",
            serde_json::json!({
                "var": key,
                "blocked_vars": DANGEROUS_ENV_VARS,
            }),
        ));
    }
    Ok(())
}

/// Resolve the child environment as ordered `(name, value)` pairs.
///
/// The lookup is injected so callers read the process environment once.
pub fn resolve_env<F>(
    env_policy: &EnvPolicy,
    lookup: F,
) -> Result<Vec<(String, String)>, HarnessError>
where
    F: Fn(&str) -> Option<String>,
{
    validate_env_policy(env_policy)?;
    let mut resolved = Vec::new();
    if env_policy.inherit {
        for key in &env_policy.allowlist {
            if env_policy.set.contains_key(key) {
                continue;
            }
            if let Some(value) = lookup(key) {
                resolved.push((key.clone(), value));
            }
        }
    }
    resolved.extend(
        env_policy
            .set
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );
    Ok(resolved)
}

/// Clear the command's environment and apply the policy.
pub fn apply_env_policy(
    env_policy: &EnvPolicy,
    cmd: &mut portable_pty::CommandBuilder,
) -> Result<(), HarnessError> {
    cmd.env_clear();
    for (key, value) in resolve_env(env_policy, |key| std::env::var(key).ok())? {
        cmd.env(key, value);
    }
    Ok(())
}
