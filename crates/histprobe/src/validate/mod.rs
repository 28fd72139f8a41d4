//! History log validation.
//!
//! [`validate`] reads the log once and evaluates every property
//! independently; one failing property never suppresses the others. A
//! missing log is a single terminal outcome with no property results.

use crate::history::parse_log;
use crate::model::{
    CheckThresholds, HistoryEntry, ParsedLog, Property, PropertyResult, ValidationOutcome,
    ValidationReport,
};
use std::collections::BTreeSet;
use std::path::Path;

/// Read and check the log at `path`.
pub fn validate(path: &Path, thresholds: &CheckThresholds) -> ValidationReport {
    let outcome = match std::fs::read(path) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(text) => checked_outcome(&parse_log(&text), thresholds),
            Err(err) => ValidationOutcome::UnexpectedFailure {
                message: format!("history file is not valid UTF-8: {err}"),
            },
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "history file not found");
            ValidationOutcome::MissingArtifact
        }
        Err(err) => ValidationOutcome::UnexpectedFailure {
            message: format!("failed to read history file: {err}"),
        },
    };
    ValidationReport {
        path: path.to_path_buf(),
        outcome,
    }
}

fn checked_outcome(log: &ParsedLog, thresholds: &CheckThresholds) -> ValidationOutcome {
    let properties = check_entries(&log.entries, thresholds);
    tracing::info!(
        entries = log.entries.len(),
        malformed = log.malformed.len(),
        passed = properties.iter().filter(|result| result.passed).count(),
        failed = properties.iter().filter(|result| !result.passed).count(),
        "validated history log"
    );
    ValidationOutcome::Checked {
        entries: log.entries.len(),
        properties,
        malformed: log.malformed.clone(),
    }
}

/// Evaluate every property against parsed entries.
pub fn check_entries(entries: &[HistoryEntry], thresholds: &CheckThresholds) -> Vec<PropertyResult> {
    let mut results = vec![check_min_entries(entries, thresholds.min_entries)];
    results.extend(check_exit_coverage(entries, thresholds.failure_exit_code));
    results.push(check_universal_duration(entries));
    results.extend(check_block_entry(
        entries,
        &thresholds.block_start,
        &thresholds.block_end,
    ));
    results
}

pub fn check_min_entries(entries: &[HistoryEntry], minimum: usize) -> PropertyResult {
    if entries.len() >= minimum {
        PropertyResult::pass(
            Property::MinEntries,
            format!("Found at least {minimum} history items"),
        )
    } else {
        PropertyResult::fail(
            Property::MinEntries,
            format!(
                "expected at least {minimum} well-formed history items, found {}",
                entries.len()
            ),
        )
    }
}

/// Exit status 0 and the failing command's status must both be recorded.
pub fn check_exit_coverage(entries: &[HistoryEntry], failure_code: i32) -> [PropertyResult; 2] {
    let codes: BTreeSet<i32> = entries.iter().filter_map(|entry| entry.exit).collect();
    let seen = || {
        codes
            .iter()
            .map(i32::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    let zero = if codes.contains(&0) {
        PropertyResult::pass(Property::ExitZero, "Found exit code 0")
    } else {
        PropertyResult::fail(
            Property::ExitZero,
            format!("no entry recorded exit code 0 (recorded: [{}])", seen()),
        )
    };
    let failure = if failure_code != 0 && codes.contains(&failure_code) {
        PropertyResult::pass(
            Property::ExitFailure,
            format!("Found exit code {failure_code}"),
        )
    } else {
        PropertyResult::fail(
            Property::ExitFailure,
            format!(
                "no entry recorded nonzero exit code {failure_code} (recorded: [{}])",
                seen()
            ),
        )
    };
    [zero, failure]
}

pub fn check_universal_duration(entries: &[HistoryEntry]) -> PropertyResult {
    let missing: Vec<&HistoryEntry> = entries.iter().filter(|entry| entry.dur.is_none()).collect();
    if missing.is_empty() {
        PropertyResult::pass(
            Property::UniversalDuration,
            format!("All {} items have duration", entries.len()),
        )
    } else {
        let described: Vec<String> = missing
            .iter()
            .map(|entry| format!("line {} {:?}", entry.line, entry.cmd))
            .collect();
        PropertyResult::fail(
            Property::UniversalDuration,
            format!(
                "{} of {} items have no duration: {}",
                missing.len(),
                entries.len(),
                described.join(", ")
            ),
        )
    }
}

/// Some entry containing both block markers must lack `exit` and carry `dur`.
///
/// When no entry satisfies both, each property lists the block entries that
/// violate it.
pub fn check_block_entry(entries: &[HistoryEntry], start: &str, end: &str) -> [PropertyResult; 2] {
    let label = format!("{start};{end}");
    let blocks: Vec<&HistoryEntry> = entries
        .iter()
        .filter(|entry| entry.contains_markers(start, end))
        .collect();
    if blocks.is_empty() {
        let reason = format!("no entry contains both {start:?} and {end:?}");
        return [
            PropertyResult::fail(Property::BlockWithoutExit, reason.clone()),
            PropertyResult::fail(Property::BlockWithDuration, reason),
        ];
    }

    let conforming = blocks
        .iter()
        .any(|block| block.exit.is_none() && block.dur.is_some());
    let with_exit: Vec<String> = blocks
        .iter()
        .filter_map(|block| {
            block
                .exit
                .map(|code| format!("line {} {:?} recorded exit code {code}", block.line, block.cmd))
        })
        .collect();
    let without_dur: Vec<String> = blocks
        .iter()
        .filter(|block| block.dur.is_none())
        .map(|block| format!("line {} {:?} has no duration", block.line, block.cmd))
        .collect();

    let without_exit = if conforming || with_exit.is_empty() {
        PropertyResult::pass(
            Property::BlockWithoutExit,
            format!("{label} has no exit code"),
        )
    } else {
        PropertyResult::fail(
            Property::BlockWithoutExit,
            format!("no {label} entry without exit code: {}", with_exit.join(", ")),
        )
    };
    let with_duration = if conforming || without_dur.is_empty() {
        PropertyResult::pass(
            Property::BlockWithDuration,
            format!("{label} has duration"),
        )
    } else {
        PropertyResult::fail(
            Property::BlockWithDuration,
            format!("no {label} entry with duration: {}", without_dur.join(", ")),
        )
    };
    [without_exit, with_duration]
}
