//! Harness orchestration.
//!
//! Spawn the shell, run the scenario, wait for the flush, validate the log,
//! and remove the log on every path out of [`run_harness`].

mod error;

pub use error::{HarnessError, HarnessResult};

use crate::artifacts::{wait_for_flush, ArtifactGuard};
use crate::driver::Driver;
use crate::model::{HarnessConfig, HarnessReport, RunId, Scenario, REPORT_VERSION};
use crate::scenario::{run_scenario, validate_scenario};
use crate::validate::validate;
use std::time::{Duration, Instant};

/// Grace period between SIGTERM and SIGKILL when closing the shell.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Run `scenario` under `config` and validate the resulting history log.
///
/// Returns `Err` only when the run could not start (no data directory,
/// invalid scenario, shell failed to spawn). Checkpoint failures and
/// validation failures are reported inside [`HarnessReport`].
pub fn run_harness(config: HarnessConfig, scenario: Scenario) -> HarnessResult<HarnessReport> {
    validate_scenario(&scenario)?;
    let log_path = config.history.log_path().ok_or_else(|| {
        HarnessError::protocol(
            "cannot determine history data directory",
            serde_json::json!({
                "hint": "set XDG_DATA_HOME or HOME, or pass --data-dir",
            }),
        )
    })?;

    let run_id = RunId::new();
    let started = Instant::now();
    tracing::info!(%run_id, log = %log_path.display(), scenario = %scenario.name, "starting harness run");

    // Armed before the shell starts so every early return still cleans up.
    let guard = ArtifactGuard::new(log_path.clone());

    let mut driver = Driver::spawn(&config)?;
    let scenario_report = run_scenario(&mut driver, &scenario)?;
    if let Err(err) = driver.close(SHUTDOWN_GRACE) {
        tracing::warn!(error = %err, "shell did not shut down cleanly");
    }

    let validation = if scenario_report.completed() {
        wait_for_flush(&log_path, config.flush);
        Some(validate(&log_path, &config.checks))
    } else {
        None
    };

    let cleanup = guard.finish();
    tracing::debug!(?cleanup, "artifact cleanup");

    Ok(HarnessReport {
        report_version: REPORT_VERSION,
        run_id,
        log_path,
        scenario: scenario_report,
        validation,
        cleanup,
        ended_at_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    })
}
