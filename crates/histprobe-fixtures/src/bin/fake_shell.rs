//! Fake shell fixture: a line-oriented interpreter that keeps a JSON Lines
//! history log in the same place and format as the real shell.
//!
//! Supported input:
//! - `builtin history clear` / `builtin history save`
//! - `true`, `false`, `begin; ...; end`, `echo ARGS`, `exit [N]`
//! - anything else fails with status 127
//!
//! The history mode comes from `--mode NAME` or `HISTPROBE_FAKE_MODE`. A
//! `{n}` in the prompt is replaced by the prompt's sequence number.

// Test fixtures require special allowances - they are not production code
#![allow(clippy::print_stdout)] // Fixture must print to the terminal
#![allow(clippy::print_stderr)]
#![allow(clippy::exit)] // Mirrors `exit N` as the process status

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

use histprobe::model::{HarnessConfig, PROMPT_COUNTER};
use histprobe_fixtures::{FakeMode, FAKE_SHELL_PROMPT, MODE_VAR, PROMPT_VAR};

/// One executed command.
struct Item {
    cmd: String,
    exit: Option<i32>,
    dur_ms: u64,
}

struct FakeShell {
    mode: FakeMode,
    log_path: Option<PathBuf>,
    items: Vec<Item>,
}

enum Flow {
    Continue,
    Exit(i32),
}

impl FakeShell {
    fn run_line(&mut self, line: &str, out: &mut impl Write) -> io::Result<Flow> {
        let started = Instant::now();
        let (exit, flow) = match line {
            "" => return Ok(Flow::Continue),
            "builtin history clear" | "history clear" => {
                self.items.clear();
                if let Some(path) = &self.log_path {
                    let _ = fs::remove_file(path);
                }
                return Ok(Flow::Continue);
            }
            "builtin history save" | "history save" => {
                self.save()?;
                return Ok(Flow::Continue);
            }
            "true" => (Some(0), Flow::Continue),
            "false" => (Some(1), Flow::Continue),
            _ if is_block(line) => {
                let exit = (self.mode == FakeMode::BlockExit).then_some(0);
                (exit, Flow::Continue)
            }
            _ if line == "echo" || line.starts_with("echo ") => {
                writeln!(out, "{}", line.trim_start_matches("echo").trim_start())?;
                (Some(0), Flow::Continue)
            }
            _ if line == "exit" || line.starts_with("exit ") => {
                let code = line
                    .trim_start_matches("exit")
                    .trim()
                    .parse()
                    .unwrap_or(0);
                return Ok(Flow::Exit(code));
            }
            _ => {
                let name = line.split_whitespace().next().unwrap_or(line);
                writeln!(out, "fake-shell: Unknown command: {name}")?;
                (Some(127), Flow::Continue)
            }
        };
        self.items.push(Item {
            cmd: line.to_string(),
            exit,
            dur_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        });
        Ok(flow)
    }

    fn save(&self) -> io::Result<()> {
        if self.mode == FakeMode::NoSave {
            return Ok(());
        }
        let Some(path) = &self.log_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut text = String::new();
        for (index, item) in self.items.iter().enumerate() {
            for record in self.records(index, item) {
                text.push_str(&record.to_string());
                text.push('\n');
            }
        }
        fs::write(path, text)
    }

    fn records(&self, index: usize, item: &Item) -> Vec<serde_json::Value> {
        let with_dur = self.mode != FakeMode::NoDuration;
        if self.mode == FakeMode::Split {
            let id = format!("item{index}");
            let mut records = vec![serde_json::json!({ "id": id, "cmd": item.cmd })];
            if let Some(exit) = item.exit {
                records.push(serde_json::json!({ "id": id, "exit": exit }));
            }
            records.push(serde_json::json!({ "id": id, "dur": item.dur_ms }));
            return records;
        }
        let mut record = serde_json::json!({ "cmd": item.cmd });
        if let Some(exit) = item.exit {
            record["exit"] = exit.into();
        }
        if with_dur {
            record["dur"] = item.dur_ms.into();
        }
        vec![record]
    }
}

fn is_block(line: &str) -> bool {
    line.starts_with("begin") && line.trim_end().ends_with("end")
}

/// `--mode NAME` on the command line wins over [`MODE_VAR`].
fn mode_from_args() -> Option<FakeMode> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--mode" {
            return args.next().map(|name| FakeMode::parse(&name));
        }
    }
    None
}

fn main() -> io::Result<()> {
    let mode = mode_from_args().unwrap_or_else(|| {
        FakeMode::parse(&std::env::var(MODE_VAR).unwrap_or_default())
    });
    let prompt = std::env::var(PROMPT_VAR).unwrap_or_else(|_| FAKE_SHELL_PROMPT.to_string());
    let mut shell = FakeShell {
        mode,
        log_path: HarnessConfig::from_env().history.log_path(),
        items: Vec::new(),
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut shown: u64 = 1;
    write!(stdout, "{}", prompt.replace(PROMPT_COUNTER, &shown.to_string()))?;
    stdout.flush()?;

    for line in stdin.lock().lines() {
        let line = line?;
        match shell.run_line(line.trim(), &mut stdout)? {
            Flow::Continue => {}
            Flow::Exit(code) => {
                stdout.flush()?;
                std::process::exit(code);
            }
        }
        shown += 1;
        write!(stdout, "{}", prompt.replace(PROMPT_COUNTER, &shown.to_string()))?;
        stdout.flush()?;
    }
    Ok(())
}
