//! JSON Lines history log parsing.
//!
//! Each non-blank line is decoded on its own. A line that fails to decode is
//! recorded as malformed and skipped; it never aborts the parse. Lines that
//! carry the same `id` are annotations of one history item and are merged in
//! file order.

use crate::model::{HistoryEntry, MalformedLine, ParsedLog, RawRecord};
use std::collections::HashMap;

/// Longest prefix of a bad line quoted in a malformed-line reason.
const QUOTE_LIMIT: usize = 80;

/// Parse a complete log.
pub fn parse_log(text: &str) -> ParsedLog {
    let mut builder = LogBuilder::default();
    for (index, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        builder.push_line(index + 1, trimmed);
    }
    builder.finish()
}

/// Decode a single line.
pub fn parse_record(line: &str) -> Result<RawRecord, serde_json::Error> {
    serde_json::from_str(line)
}

/// An entry under construction; `cmd` may still be missing.
#[derive(Debug)]
struct PendingEntry {
    line: usize,
    id: Option<String>,
    cmd: Option<String>,
    exit: Option<i32>,
    dur: Option<f64>,
    paths: Vec<String>,
    cwd: Option<String>,
    sid: Option<String>,
    extra_fields: usize,
}

impl PendingEntry {
    fn new(line: usize, id: Option<String>) -> Self {
        Self {
            line,
            id,
            cmd: None,
            exit: None,
            dur: None,
            paths: Vec::new(),
            cwd: None,
            sid: None,
            extra_fields: 0,
        }
    }

    /// Later lines fill in or override earlier fields.
    fn annotate(&mut self, record: RawRecord) {
        if record.cmd.is_some() {
            self.cmd = record.cmd;
        }
        if record.exit.is_some() {
            self.exit = record.exit;
        }
        if record.dur.is_some() {
            self.dur = record.dur;
        }
        if let Some(paths) = record.paths {
            self.paths = paths;
        }
        if record.cwd.is_some() {
            self.cwd = record.cwd;
        }
        if record.sid.is_some() {
            self.sid = record.sid;
        }
        self.extra_fields += record.extra.len();
    }

    fn into_entry(self) -> Result<HistoryEntry, MalformedLine> {
        let Some(cmd) = self.cmd else {
            let reason = match &self.id {
                Some(id) => format!("history item {id} has no \"cmd\" field"),
                None => "record has no \"cmd\" field".to_string(),
            };
            return Err(MalformedLine::new(self.line, reason));
        };
        Ok(HistoryEntry {
            line: self.line,
            id: self.id,
            cmd,
            exit: self.exit,
            dur: self.dur,
            paths: self.paths,
            cwd: self.cwd,
            sid: self.sid,
            extra_fields: self.extra_fields,
        })
    }
}

#[derive(Default)]
struct LogBuilder {
    pending: Vec<PendingEntry>,
    by_id: HashMap<String, usize>,
    malformed: Vec<MalformedLine>,
    lines: usize,
}

impl LogBuilder {
    fn push_line(&mut self, line_no: usize, line: &str) {
        self.lines += 1;
        let record = match parse_record(line) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(line = line_no, error = %err, "malformed history record");
                self.malformed
                    .push(MalformedLine::new(line_no, format!("{err}: {}", quote(line))));
                return;
            }
        };

        let slot = match record.id.clone() {
            Some(id) => *self.by_id.entry(id.clone()).or_insert_with(|| {
                self.pending.push(PendingEntry::new(line_no, Some(id)));
                self.pending.len() - 1
            }),
            None => {
                self.pending.push(PendingEntry::new(line_no, None));
                self.pending.len() - 1
            }
        };
        if let Some(entry) = self.pending.get_mut(slot) {
            entry.annotate(record);
        }
    }

    fn finish(self) -> ParsedLog {
        let mut malformed = self.malformed;
        let mut entries = Vec::with_capacity(self.pending.len());
        for pending in self.pending {
            match pending.into_entry() {
                Ok(entry) => entries.push(entry),
                Err(bad) => {
                    tracing::warn!(line = bad.line, reason = %bad.reason, "incomplete history record");
                    malformed.push(bad);
                }
            }
        }
        malformed.sort_by_key(|bad| bad.line);
        ParsedLog {
            entries,
            malformed,
            lines: self.lines,
        }
    }
}

fn quote(line: &str) -> String {
    if line.chars().count() <= QUOTE_LIMIT {
        return format!("{line:?}");
    }
    let prefix: String = line.chars().take(QUOTE_LIMIT).collect();
    format!("{prefix:?}...")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const MINIMAL_LOG: &str = concat!(
        "{\"cmd\":\"true\",\"exit\":0,\"dur\":1}\n",
        "{\"cmd\":\"false\",\"exit\":1,\"dur\":1}\n",
        "{\"cmd\":\"begin; end\",\"dur\":0}\n",
    );

    #[test]
    fn parses_minimal_log() {
        let log = parse_log(MINIMAL_LOG);
        assert_eq!(log.entries.len(), 3);
        assert!(log.malformed.is_empty());
        assert_eq!(log.entries[0].exit, Some(0));
        assert_eq!(log.entries[1].exit, Some(1));
        assert_eq!(log.entries[2].exit, None);
        assert_eq!(log.entries[2].dur, Some(0.0));
        assert_eq!(log.entries[2].line, 3);
    }

    #[test]
    fn blank_lines_are_skipped_but_numbering_is_physical() {
        let log = parse_log("\n   \n{\"cmd\":\"ls\",\"dur\":2}\n\n");
        assert_eq!(log.lines, 1);
        assert_eq!(log.entries.len(), 1);
        assert_eq!(log.entries[0].line, 3);
    }

    #[test]
    fn malformed_lines_do_not_abort_parsing() {
        let text = "{\"cmd\":\"ls\",\"dur\":1}\nnot json at all\n{\"cmd\":\"pwd\",\"dur\":1}\n";
        let log = parse_log(text);
        assert_eq!(log.entries.len(), 2);
        assert_eq!(log.malformed.len(), 1);
        assert_eq!(log.malformed[0].line, 2);
        assert!(log.malformed[0].reason.contains("not json at all"));
    }

    #[test]
    fn wrong_typed_fields_are_malformed() {
        let text = concat!(
            "{\"cmd\":\"a\",\"exit\":\"zero\",\"dur\":1}\n",
            "{\"cmd\":\"b\",\"exit\":1.5,\"dur\":1}\n",
            "{\"cmd\":\"c\",\"dur\":\"fast\"}\n",
            "[\"cmd\",\"d\"]\n",
        );
        let log = parse_log(text);
        assert!(log.entries.is_empty());
        assert_eq!(log.malformed.len(), 4);
    }

    #[test]
    fn null_exit_is_absent_and_missing_dur_is_not_an_error() {
        let log = parse_log("{\"cmd\":\"begin; end\",\"exit\":null}\n");
        assert_eq!(log.entries.len(), 1);
        assert_eq!(log.entries[0].exit, None);
        assert_eq!(log.entries[0].dur, None);
    }

    #[test]
    fn missing_cmd_is_malformed() {
        let log = parse_log("{\"exit\":0,\"dur\":1}\n");
        assert!(log.entries.is_empty());
        assert_eq!(log.malformed.len(), 1);
        assert!(log.malformed[0].reason.contains("cmd"));
    }

    #[test]
    fn unknown_and_known_optional_fields_are_decoded() {
        let log = parse_log(
            "{\"id\":\"AAAAAAAAAGQ\",\"cmd\":\"ls /tmp\",\"exit\":0,\"dur\":3,\"paths\":[\"/tmp\"],\"cwd\":\"/home\",\"sid\":\"AAAAAAAAAAE\",\"future\":true}\n",
        );
        let entry = &log.entries[0];
        assert_eq!(entry.paths, vec!["/tmp".to_string()]);
        assert_eq!(entry.cwd.as_deref(), Some("/home"));
        assert_eq!(entry.sid.as_deref(), Some("AAAAAAAAAAE"));
        assert_eq!(entry.extra_fields, 1);
    }

    #[test]
    fn annotation_lines_sharing_an_id_are_coalesced() {
        let text = concat!(
            "{\"id\":\"a\",\"cmd\":\"ls\"}\n",
            "{\"id\":\"b\",\"cmd\":\"pwd\",\"exit\":0,\"dur\":1}\n",
            "{\"id\":\"a\",\"exit\":0}\n",
            "{\"id\":\"a\",\"dur\":5}\n",
        );
        let log = parse_log(text);
        assert_eq!(log.lines, 4);
        assert_eq!(log.entries.len(), 2);
        assert_eq!(log.entries[0].cmd, "ls");
        assert_eq!(log.entries[0].exit, Some(0));
        assert_eq!(log.entries[0].dur, Some(5.0));
        assert_eq!(log.entries[0].line, 1);
        assert_eq!(log.entries[1].cmd, "pwd");
    }

    #[test]
    fn annotation_without_any_cmd_is_reported() {
        let log = parse_log("{\"id\":\"z\",\"exit\":127}\n{\"id\":\"z\",\"dur\":4}\n");
        assert!(log.entries.is_empty());
        assert_eq!(log.malformed.len(), 1);
        assert!(log.malformed[0].reason.contains("history item z"));
    }

    #[test]
    fn long_malformed_lines_are_truncated_in_reasons() {
        let line = format!("{{{}", "x".repeat(500));
        let log = parse_log(&line);
        assert!(log.malformed[0].reason.len() < 300);
        assert!(log.malformed[0].reason.ends_with("..."));
    }
}
