use crate::model::ErrorCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One line of the history log as written by the shell.
///
/// Every field is optional at this layer. Presence rules are enforced when
/// records are assembled into [`HistoryEntry`] values, so a missing `exit` or
/// `dur` is a valid decode rather than a parse error. A field that is
/// present with the wrong type still fails to decode.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub cmd: Option<String>,
    #[serde(default)]
    pub exit: Option<i32>,
    #[serde(default)]
    pub dur: Option<f64>,
    #[serde(default)]
    pub paths: Option<Vec<String>>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub sid: Option<String>,
    /// Fields this validator does not know about.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A history item after annotation lines sharing an `id` are coalesced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// 1-based line number of the first line contributing to this entry.
    pub line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub cmd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dur: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    /// Number of unknown fields seen across contributing lines.
    #[serde(default)]
    pub extra_fields: usize,
}

impl HistoryEntry {
    /// True if the command text contains both markers, in any position.
    pub fn contains_markers(&self, start: &str, end: &str) -> bool {
        self.cmd.contains(start) && self.cmd.contains(end)
    }
}

/// A line that could not be used as (part of) a history entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalformedLine {
    /// Always [`ErrorCode::MalformedRecord`].
    pub code: ErrorCode,
    /// 1-based line number.
    pub line: usize,
    pub reason: String,
}

impl MalformedLine {
    pub fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::MalformedRecord,
            line,
            reason: reason.into(),
        }
    }
}

/// Result of parsing a complete log.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedLog {
    pub entries: Vec<HistoryEntry>,
    pub malformed: Vec<MalformedLine>,
    /// Non-blank lines seen.
    pub lines: usize,
}
