use crate::model::{MalformedLine, RunId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

/// Stable error codes shared by errors, reports and exit statuses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// An expected pattern did not appear in time.
    #[serde(rename = "E_TIMEOUT")]
    Timeout,
    /// The shell exited while a checkpoint was pending.
    #[serde(rename = "E_PROCESS_EXIT")]
    ProcessExit,
    /// PTY or filesystem I/O failed.
    #[serde(rename = "E_IO")]
    Io,
    /// Invalid scenario, pattern or configuration input.
    #[serde(rename = "E_PROTOCOL")]
    Protocol,
    /// The history log did not exist at validation time.
    #[serde(rename = "E_MISSING_ARTIFACT")]
    MissingArtifact,
    /// A log line could not be decoded.
    #[serde(rename = "E_MALFORMED_RECORD")]
    MalformedRecord,
    /// Any other fault during validation.
    #[serde(rename = "E_UNEXPECTED")]
    UnexpectedFailure,
    /// Harness invariant violated.
    #[serde(rename = "E_INTERNAL")]
    Internal,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 8] = [
        ErrorCode::Timeout,
        ErrorCode::ProcessExit,
        ErrorCode::Io,
        ErrorCode::Protocol,
        ErrorCode::MissingArtifact,
        ErrorCode::MalformedRecord,
        ErrorCode::UnexpectedFailure,
        ErrorCode::Internal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Timeout => "E_TIMEOUT",
            ErrorCode::ProcessExit => "E_PROCESS_EXIT",
            ErrorCode::Io => "E_IO",
            ErrorCode::Protocol => "E_PROTOCOL",
            ErrorCode::MissingArtifact => "E_MISSING_ARTIFACT",
            ErrorCode::MalformedRecord => "E_MALFORMED_RECORD",
            ErrorCode::UnexpectedFailure => "E_UNEXPECTED",
            ErrorCode::Internal => "E_INTERNAL",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == code)
    }

    /// Process exit status for the CLI. 1 is reserved for failed properties.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorCode::Protocol => 2,
            ErrorCode::MissingArtifact => 3,
            ErrorCode::Timeout => 4,
            ErrorCode::ProcessExit => 5,
            ErrorCode::Io => 6,
            ErrorCode::Internal => 7,
            ErrorCode::MalformedRecord | ErrorCode::UnexpectedFailure => 8,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializable error payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

/// The invariants checked against the history log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    /// At least the configured minimum of well-formed entries.
    MinEntries,
    /// Some entry recorded exit status 0.
    ExitZero,
    /// Some entry recorded the failing command's exit status.
    ExitFailure,
    /// Every entry carries `dur`.
    UniversalDuration,
    /// The block entry has no `exit`.
    BlockWithoutExit,
    /// The block entry has `dur`.
    BlockWithDuration,
}

impl Property {
    pub fn as_str(self) -> &'static str {
        match self {
            Property::MinEntries => "min_entries",
            Property::ExitZero => "exit_zero",
            Property::ExitFailure => "exit_failure",
            Property::UniversalDuration => "universal_duration",
            Property::BlockWithoutExit => "block_without_exit",
            Property::BlockWithDuration => "block_with_duration",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one property check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyResult {
    pub property: Property,
    pub passed: bool,
    /// Human-readable statement of what was found, or of the violated invariant.
    pub message: String,
}

impl PropertyResult {
    pub fn pass(property: Property, message: impl Into<String>) -> Self {
        Self {
            property,
            passed: true,
            message: message.into(),
        }
    }

    pub fn fail(property: Property, message: impl Into<String>) -> Self {
        Self {
            property,
            passed: false,
            message: message.into(),
        }
    }
}

/// What validation concluded about the log file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// The log did not exist; no properties were checked.
    MissingArtifact,
    /// Reading the log failed for another reason.
    UnexpectedFailure { message: String },
    /// The log was parsed and every property evaluated.
    Checked {
        entries: usize,
        properties: Vec<PropertyResult>,
        malformed: Vec<MalformedLine>,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub path: PathBuf,
    pub outcome: ValidationOutcome,
}

impl ValidationReport {
    /// True when the log was checked and every property held.
    pub fn passed(&self) -> bool {
        match &self.outcome {
            ValidationOutcome::Checked { properties, .. } => {
                properties.iter().all(|result| result.passed)
            }
            ValidationOutcome::MissingArtifact | ValidationOutcome::UnexpectedFailure { .. } => {
                false
            }
        }
    }

    pub fn properties(&self) -> &[PropertyResult] {
        match &self.outcome {
            ValidationOutcome::Checked { properties, .. } => properties,
            _ => &[],
        }
    }

    /// Error code for outcomes that prevented checking.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match &self.outcome {
            ValidationOutcome::MissingArtifact => Some(ErrorCode::MissingArtifact),
            ValidationOutcome::UnexpectedFailure { .. } => Some(ErrorCode::UnexpectedFailure),
            ValidationOutcome::Checked { .. } => None,
        }
    }
}

/// What happened when the artifact was removed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CleanupStatus {
    Removed,
    AlreadyAbsent,
    Failed { message: String },
}

/// Full result of a harness run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HarnessReport {
    pub report_version: u32,
    pub run_id: RunId,
    pub log_path: PathBuf,
    pub scenario: crate::model::ScenarioReport,
    /// Absent when the scenario aborted before the flush step.
    #[serde(default)]
    pub validation: Option<ValidationReport>,
    pub cleanup: CleanupStatus,
    pub ended_at_ms: u64,
}

impl HarnessReport {
    /// True when the scenario completed and every property held.
    pub fn passed(&self) -> bool {
        self.scenario.error.is_none()
            && self
                .validation
                .as_ref()
                .is_some_and(ValidationReport::passed)
    }

    /// The error that ended the run early, if any.
    pub fn error_code(&self) -> Option<ErrorCode> {
        if let Some(err) = &self.scenario.error {
            return Some(err.code);
        }
        self.validation
            .as_ref()
            .and_then(ValidationReport::error_code)
    }
}
