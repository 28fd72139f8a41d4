//! histprobe: an end-to-end harness for a shell's history persistence.
//!
//! The harness spawns a shell inside a pseudo-terminal, drives it through a
//! scripted scenario using prompt checkpoints, then validates the JSON Lines
//! history log the shell wrote and removes it again.

#![forbid(unsafe_code)]
// Internal types are documented as they stabilize.
#![allow(missing_docs)]

pub mod artifacts;
pub mod driver;
pub mod history;
pub mod model;
pub mod policy;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod session;
pub mod terminal;
pub mod validate;

pub use crate::model::*;

pub mod run {
    use super::runner::{run_harness, HarnessResult};
    use super::{HarnessConfig, HarnessReport, Scenario};

    /// Run the built-in history exit/duration scenario.
    pub fn run_default(config: HarnessConfig) -> HarnessResult<HarnessReport> {
        run_harness(config, Scenario::history_exit_duration())
    }

    pub fn run_with_scenario(
        config: HarnessConfig,
        scenario: Scenario,
    ) -> HarnessResult<HarnessReport> {
        run_harness(config, scenario)
    }
}
