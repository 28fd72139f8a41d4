//! histprobe CLI: drive a shell in a PTY and verify its history log.
//!
//! Report lines go to stdout. Diagnostics and tracing output go to stderr.

// CLI-specific lint allowances (CLI binary, not library)
#![allow(missing_docs)]
#![allow(clippy::print_stdout)] // CLI must print to stdout
#![allow(clippy::print_stderr)] // CLI must print to stderr
#![allow(clippy::exit)] // CLI uses exit codes

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use histprobe::model::{default_shell_args, CheckThresholds, ErrorCode, HarnessConfig};
use histprobe::report::{harness_lines, validation_lines};
use histprobe::runner::{run_harness, HarnessError, HarnessResult};
use histprobe::scenario::load_scenario;
use histprobe::validate::validate;
use histprobe::Scenario;
use miette::{IntoDiagnostic, Result};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Exit status when at least one property failed.
const EXIT_PROPERTY_FAILED: i32 = 1;
/// Exit status after Ctrl-C (128 + SIGINT).
const EXIT_INTERRUPTED: i32 = 130;

/// Color output mode
#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum ColorMode {
    /// Auto-detect based on terminal and `NO_COLOR` env
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

#[derive(Debug, Parser)]
#[command(
    name = "histprobe",
    version,
    about = "End-to-end check of a shell's history persistence"
)]
struct Cli {
    /// Control color output
    #[arg(long, value_enum, default_value = "auto", global = true)]
    color: ColorMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Spawn the shell, run the scenario, validate and remove the history log
    Run {
        #[arg(long, help = "Shell executable (default: fish)")]
        shell: Option<String>,
        #[arg(long, help = "History namespace (overrides $fish_history)")]
        namespace: Option<String>,
        #[arg(long, help = "Base data directory (overrides $XDG_DATA_HOME)")]
        data_dir: Option<PathBuf>,
        #[arg(long, help = "Prompt the shell prints when idle; {n} matches its sequence number")]
        prompt: Option<String>,
        #[arg(long, help = "Per-checkpoint timeout in milliseconds")]
        timeout_ms: Option<u64>,
        #[arg(long, help = "Scenario file (JSON or YAML)")]
        scenario: Option<PathBuf>,
        #[arg(long)]
        json: bool,
        #[arg(long, short = 'v', help = "Log driver and scenario progress to stderr")]
        verbose: bool,
        #[arg(last = true, help = "Arguments passed to the shell instead of the defaults")]
        shell_args: Vec<String>,
    },
    /// Validate an existing history log without deleting it
    Validate {
        #[arg(long)]
        log: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Configure color output based on CLI flag and environment
fn configure_colors(mode: ColorMode) {
    let use_color = match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => {
            if std::env::var("NO_COLOR").is_ok() {
                false
            } else {
                supports_color::on(supports_color::Stream::Stderr).is_some()
            }
        }
    };
    miette::set_hook(Box::new(move |_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .color(use_color)
                .unicode(use_color)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set
}

/// Install the stderr subscriber. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    configure_colors(cli.color);
    match cli.command {
        Commands::Run {
            shell,
            namespace,
            data_dir,
            prompt,
            timeout_ms,
            scenario,
            json,
            verbose,
            shell_args,
        } => {
            init_tracing(verbose);
            let overrides = RunOverrides {
                shell,
                namespace,
                data_dir,
                prompt,
                timeout_ms,
                shell_args,
            };
            match overrides.apply(HarnessConfig::from_env()) {
                Ok(config) => cmd_run(config, scenario, json),
                Err(err) => emit_error(json, &err),
            }
        }
        Commands::Validate { log, json } => {
            init_tracing(false);
            cmd_validate(log, json)
        }
        Commands::Completions { shell } => cmd_completions(shell),
    }
}

// =============================================================================
// Command Handlers
// =============================================================================

/// Flags that override the environment-derived configuration.
#[derive(Debug, Default)]
struct RunOverrides {
    shell: Option<String>,
    namespace: Option<String>,
    data_dir: Option<PathBuf>,
    prompt: Option<String>,
    timeout_ms: Option<u64>,
    shell_args: Vec<String>,
}

impl RunOverrides {
    fn apply(self, mut config: HarnessConfig) -> HarnessResult<HarnessConfig> {
        if let Some(namespace) = self.namespace {
            if !histprobe::model::is_valid_namespace(&namespace) {
                return Err(HarnessError::protocol(
                    format!("invalid history namespace {namespace:?}"),
                    serde_json::json!({
                        "hint": "use only ASCII letters, digits and underscores",
                    }),
                ));
            }
            config.history.namespace = namespace;
        }
        if let Some(dir) = self.data_dir {
            config.history.data_dir = Some(dir);
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.expect_timeout_ms = timeout_ms;
        }
        let custom_shell = self.shell.is_some();
        if let Some(shell) = self.shell {
            config.shell.command = shell;
            config.shell.args.clear();
        }
        if let Some(prompt) = self.prompt {
            if !custom_shell {
                config.shell.args = default_shell_args(&prompt);
            }
            config.shell.prompt = prompt;
        }
        if !self.shell_args.is_empty() {
            config.shell.args = self.shell_args;
        }
        Ok(config)
    }
}

fn cmd_run(config: HarnessConfig, scenario: Option<PathBuf>, json: bool) -> Result<()> {
    let scenario = match scenario {
        Some(path) => match load_scenario(&path) {
            Ok(scenario) => scenario,
            Err(err) => return emit_error(json, &err),
        },
        None => Scenario::history_exit_duration(),
    };
    if let Some(path) = config.history.log_path() {
        install_interrupt_cleanup(path);
    }

    match run_harness(config, scenario) {
        Ok(report) => {
            if json {
                let payload = serde_json::to_string(&report).into_diagnostic()?;
                println!("{payload}");
            } else {
                for line in harness_lines(&report) {
                    println!("{line}");
                }
            }
            finish(report.passed(), report.error_code())
        }
        Err(err) => emit_error(json, &err),
    }
}

fn cmd_validate(log: PathBuf, json: bool) -> Result<()> {
    let report = validate(&log, &CheckThresholds::default());
    if json {
        let payload = serde_json::to_string(&report).into_diagnostic()?;
        println!("{payload}");
    } else {
        for line in validation_lines(&report) {
            println!("{line}");
        }
    }
    finish(report.passed(), report.error_code())
}

fn cmd_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "histprobe", &mut io::stdout());
    Ok(())
}

/// Remove the log if the user interrupts the run, then exit.
fn install_interrupt_cleanup(path: PathBuf) {
    let installed = ctrlc::set_handler(move || {
        if let Err(err) = histprobe::artifacts::remove_artifact(&path) {
            eprintln!("error: {err}");
        }
        std::process::exit(EXIT_INTERRUPTED);
    });
    if let Err(err) = installed {
        tracing::warn!(error = %err, "could not install Ctrl-C handler");
    }
}

fn emit_error(json: bool, err: &HarnessError) -> Result<()> {
    if json {
        let payload = serde_json::to_string(&err.to_error_info()).into_diagnostic()?;
        println!("{payload}");
    } else {
        eprintln!("error: {err}");
    }
    if err.message.contains("open pty") {
        eprintln!("warning: PTY support appears unavailable; this is common in minimal containers");
    }
    std::process::exit(err.exit_code());
}

fn finish(passed: bool, error: Option<ErrorCode>) -> Result<()> {
    match exit_status(passed, error) {
        0 => Ok(()),
        code => std::process::exit(code),
    }
}

fn exit_status(passed: bool, error: Option<ErrorCode>) -> i32 {
    match (passed, error) {
        (_, Some(code)) => code.exit_code(),
        (true, None) => 0,
        (false, None) => EXIT_PROPERTY_FAILED,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> HarnessConfig {
        HarnessConfig::from_lookup(|_| None)
    }

    #[test]
    fn exit_status_distinguishes_property_failures_from_errors() {
        assert_eq!(exit_status(true, None), 0);
        assert_eq!(exit_status(false, None), 1);
        assert_eq!(exit_status(false, Some(ErrorCode::MissingArtifact)), 3);
        assert_eq!(exit_status(false, Some(ErrorCode::Timeout)), 4);
    }

    #[test]
    fn exit_code_maps_harness_errors() {
        let err = HarnessError::new(ErrorCode::Protocol, "bad scenario", None);
        assert_eq!(err.exit_code(), 2);
        let err = HarnessError::new(ErrorCode::ProcessExit, "shell exited", None);
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn prompt_override_regenerates_default_shell_args() {
        let overrides = RunOverrides {
            prompt: Some("p> ".to_string()),
            ..RunOverrides::default()
        };
        let config = overrides.apply(config()).unwrap();
        assert_eq!(config.shell.prompt, "p> ");
        assert!(config.shell.args.iter().any(|arg| arg.contains("'p> '")));
    }

    #[test]
    fn custom_shell_drops_default_args() {
        let overrides = RunOverrides {
            shell: Some("/bin/sh".to_string()),
            prompt: Some("$ ".to_string()),
            ..RunOverrides::default()
        };
        let config = overrides.apply(config()).unwrap();
        assert_eq!(config.shell.command, "/bin/sh");
        assert!(config.shell.args.is_empty());
    }

    #[test]
    fn invalid_namespace_flag_is_rejected() {
        let overrides = RunOverrides {
            namespace: Some("../x".to_string()),
            ..RunOverrides::default()
        };
        assert!(overrides.apply(config()).is_err());
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }
}
