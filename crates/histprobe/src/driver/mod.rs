//! Send/expect driver over a [`Session`].
//!
//! Every `expect*` call is a synchronous checkpoint: it returns only once the
//! pattern has appeared in the shell's output, or once the timeout elapses.
//! Matched output is consumed, so the next checkpoint only sees output
//! produced after the previous match.
//!
//! ```no_run
//! use histprobe::driver::Driver;
//! use histprobe::model::HarnessConfig;
//!
//! # fn example() -> Result<(), histprobe::runner::HarnessError> {
//! let config = HarnessConfig::from_env();
//! let mut driver = Driver::spawn(&config)?;
//! driver.expect_prompt()?;
//! driver.send_line("true")?;
//! driver.expect_prompt()?;
//! # Ok(())
//! # }
//! ```

use crate::model::{
    Checkpoint, HarnessConfig, ScreenSnapshot, MAX_REGEX_PATTERN_LEN, PROMPT_COUNTER,
};
use crate::runner::{HarnessError, HarnessResult};
use crate::session::{ReadChunk, Session, SessionConfig};
use regex::bytes::{Regex, RegexBuilder};
use std::time::{Duration, Instant};

/// Line terminator appended by [`Driver::send_line`].
pub const LINE_TERMINATOR: &str = "\n";

/// Compiled regex size limit.
const REGEX_SIZE_LIMIT: usize = 1 << 20;
/// How much unconsumed output to include in timeout diagnostics.
const DIAGNOSTIC_TAIL_BYTES: usize = 512;
/// Upper bound on a single read while waiting.
const READ_SLICE: Duration = Duration::from_millis(50);

/// Compile a user-supplied pattern with length and size limits.
pub fn compile_safe_regex(pattern: &str) -> HarnessResult<Regex> {
    if pattern.len() > MAX_REGEX_PATTERN_LEN {
        return Err(HarnessError::protocol(
            "regex pattern too long",
            serde_json::json!({
                "length": pattern.len(),
                "max": MAX_REGEX_PATTERN_LEN,
            }),
        ));
    }
    RegexBuilder::new(pattern)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|err| {
            HarnessError::protocol(
                "invalid regex pattern",
                serde_json::json!({
                    "pattern": pattern,
                    "parse_error": err.to_string(),
                }),
            )
        })
}

/// What the driver is waiting for.
#[derive(Clone, Debug)]
pub enum Pattern {
    Literal(String),
    Regex(Regex),
    /// A numbered prompt; only numbers at or above `min` match.
    CountedPrompt { regex: Regex, min: u64 },
}

impl Pattern {
    /// Resolve a scenario checkpoint against the configured prompt.
    pub fn from_checkpoint(checkpoint: &Checkpoint, prompt: &str) -> HarnessResult<Self> {
        Ok(match checkpoint {
            Checkpoint::Prompt => Pattern::Literal(prompt.to_string()),
            Checkpoint::Literal { text } => Pattern::Literal(text.clone()),
            Checkpoint::Regex { pattern } => Pattern::Regex(compile_safe_regex(pattern)?),
        })
    }

    /// Pattern for the `min`-th prompt of a template containing
    /// [`PROMPT_COUNTER`]. Templates without the placeholder match literally.
    pub fn counted_prompt(template: &str, min: u64) -> HarnessResult<Self> {
        let Some((prefix, suffix)) = template.split_once(PROMPT_COUNTER) else {
            return Ok(Pattern::Literal(template.to_string()));
        };
        let regex = compile_safe_regex(&format!(
            "{}([0-9]+){}",
            regex::escape(prefix),
            regex::escape(suffix)
        ))?;
        Ok(Pattern::CountedPrompt { regex, min })
    }

    /// Prompt number carried by `matched`, for counted prompts.
    fn prompt_number(&self, matched: &[u8]) -> Option<u64> {
        match self {
            Pattern::CountedPrompt { regex, .. } => regex
                .captures(matched)
                .and_then(|caps| parse_counter(caps.get(1)?.as_bytes())),
            Pattern::Literal(_) | Pattern::Regex(_) => None,
        }
    }

    /// Byte range of the first match in `haystack`.
    fn find(&self, haystack: &[u8]) -> Option<(usize, usize)> {
        match self {
            Pattern::Literal(text) => {
                let needle = text.as_bytes();
                if needle.is_empty() {
                    return Some((0, 0));
                }
                haystack
                    .windows(needle.len())
                    .position(|window| window == needle)
                    .map(|start| (start, start + needle.len()))
            }
            Pattern::Regex(re) => re.find(haystack).map(|m| (m.start(), m.end())),
            Pattern::CountedPrompt { regex, min } => regex
                .captures_iter(haystack)
                .filter(|caps| {
                    caps.get(1)
                        .and_then(|n| parse_counter(n.as_bytes()))
                        .is_some_and(|n| n >= *min)
                })
                .find_map(|caps| caps.get(0))
                .map(|m| (m.start(), m.end())),
        }
    }

    fn describe(&self) -> String {
        match self {
            Pattern::Literal(text) => format!("literal {text:?}"),
            Pattern::Regex(re) => format!("regex /{}/", re.as_str()),
            Pattern::CountedPrompt { regex, min } => {
                format!("prompt /{}/ numbered {min} or later", regex.as_str())
            }
        }
    }
}

fn parse_counter(digits: &[u8]) -> Option<u64> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Output consumed by a successful checkpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Match {
    /// Output between the previous checkpoint and this match.
    pub before: String,
    /// The matched text.
    pub matched: String,
}

/// Tagged result of an expect call.
#[derive(Clone, Debug, PartialEq)]
pub enum ExpectOutcome {
    Matched(Match),
    /// The timeout elapsed without a match.
    TimedOut {
        waited: Duration,
        /// Tail of the unconsumed output.
        pending: String,
        screen: ScreenSnapshot,
    },
    /// The shell closed its terminal before the pattern appeared.
    ProcessExited { pending: String },
}

/// Drives a shell session with send/expect primitives.
pub struct Driver {
    session: Session,
    buffer: Vec<u8>,
    prompt: String,
    /// Highest prompt number matched so far.
    prompts_seen: Option<u64>,
    timeout: Duration,
    exited: bool,
}

impl Driver {
    pub fn new(session: Session, prompt: impl Into<String>, timeout: Duration) -> Self {
        Self {
            session,
            buffer: Vec::new(),
            prompt: prompt.into(),
            prompts_seen: None,
            timeout,
            exited: false,
        }
    }

    /// Spawn the configured shell with the history environment applied.
    pub fn spawn(config: &HarnessConfig) -> HarnessResult<Self> {
        let session = Session::spawn(SessionConfig {
            command: config.shell.command.clone(),
            args: config.shell.args.clone(),
            cwd: config.shell.cwd.clone(),
            size: config.size,
            env: config.shell_env(),
        })?;
        Ok(Self::new(
            session,
            config.shell.prompt.clone(),
            Duration::from_millis(config.expect_timeout_ms),
        ))
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Write `text` without a line terminator.
    pub fn send(&mut self, text: &str) -> HarnessResult<()> {
        tracing::debug!(input = %text.escape_debug(), "send");
        self.session.write_bytes(text.as_bytes())
    }

    /// Write `text` followed by [`LINE_TERMINATOR`].
    pub fn send_line(&mut self, text: &str) -> HarnessResult<()> {
        self.send(&format!("{text}{LINE_TERMINATOR}"))
    }

    /// Wait for `pattern` with the driver's default timeout.
    pub fn expect(&mut self, pattern: &Pattern) -> HarnessResult<ExpectOutcome> {
        self.expect_within(pattern, self.timeout)
    }

    /// Wait up to `timeout` for `pattern` to appear in the output.
    ///
    /// Only I/O failures are returned as errors; timeouts and shell exit are
    /// reported through [`ExpectOutcome`].
    pub fn expect_within(
        &mut self,
        pattern: &Pattern,
        timeout: Duration,
    ) -> HarnessResult<ExpectOutcome> {
        let started = Instant::now();
        let deadline = started + timeout;
        loop {
            if let Some(found) = self.consume_match(pattern) {
                tracing::debug!(pattern = %pattern.describe(), "checkpoint matched");
                return Ok(ExpectOutcome::Matched(found));
            }
            if self.exited {
                return Ok(ExpectOutcome::ProcessExited {
                    pending: self.pending_tail(),
                });
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(ExpectOutcome::TimedOut {
                    waited: now.saturating_duration_since(started),
                    pending: self.pending_tail(),
                    screen: self.session.snapshot(),
                });
            }
            let slice = deadline.saturating_duration_since(now).min(READ_SLICE);
            match self.session.read_chunk(slice)? {
                ReadChunk::Data(bytes) => self.buffer.extend_from_slice(&bytes),
                ReadChunk::Idle => {}
                ReadChunk::Eof => self.exited = true,
            }
        }
    }

    /// Checkpoint on `pattern`, converting non-matches into errors.
    pub fn expect_checkpoint(&mut self, pattern: &Pattern) -> HarnessResult<Match> {
        match self.expect(pattern)? {
            ExpectOutcome::Matched(found) => Ok(found),
            ExpectOutcome::TimedOut {
                waited,
                pending,
                screen,
            } => Err(HarnessError::timeout(
                format!("timed out waiting for {}", pattern.describe()),
                serde_json::json!({
                    "waited_ms": u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                    "pending_output": pending,
                    "screen": screen.non_empty_lines(),
                }),
            )),
            ExpectOutcome::ProcessExited { pending } => Err(HarnessError::process_exit(
                format!("shell exited while waiting for {}", pattern.describe()),
                serde_json::json!({ "pending_output": pending }),
            )),
        }
    }

    /// Wait for the configured prompt marker.
    ///
    /// A prompt containing [`PROMPT_COUNTER`] only matches a number above the
    /// last one seen, so a repainted earlier prompt never satisfies a later
    /// checkpoint. The first prompt may carry any number, and numbers may
    /// skip when steps waited on other patterns.
    pub fn expect_prompt(&mut self) -> HarnessResult<Match> {
        let min = self.prompts_seen.map_or(0, |seen| seen.saturating_add(1));
        let pattern = Pattern::counted_prompt(&self.prompt, min)?;
        let found = self.expect_checkpoint(&pattern)?;
        if let Some(number) = pattern.prompt_number(found.matched.as_bytes()) {
            self.prompts_seen = Some(number);
        }
        Ok(found)
    }

    /// Wait for a literal substring.
    pub fn expect_literal(&mut self, text: &str) -> HarnessResult<Match> {
        self.expect_checkpoint(&Pattern::Literal(text.to_string()))
    }

    /// Wait for a regular expression match.
    pub fn expect_regex(&mut self, pattern: &str) -> HarnessResult<Match> {
        let pattern = Pattern::Regex(compile_safe_regex(pattern)?);
        self.expect_checkpoint(&pattern)
    }

    /// Cooperative wait. Not a synchronization primitive.
    pub fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    /// Shut down the shell.
    pub fn close(self, grace: Duration) -> HarnessResult<Option<portable_pty::ExitStatus>> {
        self.session.close(grace)
    }

    fn consume_match(&mut self, pattern: &Pattern) -> Option<Match> {
        let (start, end) = pattern.find(&self.buffer)?;
        let consumed: Vec<u8> = self.buffer.drain(..end).collect();
        let (before, matched) = consumed.split_at(start);
        Some(Match {
            before: String::from_utf8_lossy(before).into_owned(),
            matched: String::from_utf8_lossy(matched).into_owned(),
        })
    }

    fn pending_tail(&self) -> String {
        let skip = self.buffer.len().saturating_sub(DIAGNOSTIC_TAIL_BYTES);
        String::from_utf8_lossy(self.buffer.get(skip..).unwrap_or_default()).into_owned()
    }
}
