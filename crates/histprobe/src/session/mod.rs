//! PTY session management for the shell under test.
//!
//! [`Session`] owns the child process, the PTY master and a terminal
//! emulator. It exposes raw byte I/O only; pattern matching lives in
//! [`crate::driver`].
//!
//! # Key Operations
//!
//! - [`Session::spawn`] - Start the shell attached to a new PTY
//! - [`Session::write_bytes`] - Write raw input to the shell
//! - [`Session::read_chunk`] - Bounded-wait read of whatever output is available
//! - [`Session::terminate_process_group`] - SIGTERM, then SIGKILL after a grace period
//! - [`Session::close`] - Explicit shutdown with error propagation
//!
//! # Process Management
//!
//! Sessions clean up their child when dropped, but [`Session::close`] should be
//! used when the exit status or shutdown errors matter.

use crate::model::{EnvPolicy, ScreenSnapshot, SessionId, TerminalSize};
use crate::policy::apply_env_policy;
use crate::runner::HarnessError;
use crate::terminal::Terminal;
#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::fcntl::{fcntl, FcntlArg, OFlag};
#[cfg(unix)]
use nix::sys::signal::{killpg, Signal};
#[cfg(unix)]
use nix::unistd::Pid;
use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use std::io::{Read, Write};
use std::time::{Duration, Instant};

const READ_BUFFER_BYTES: usize = 4096;
const IDLE_POLL: Duration = Duration::from_millis(5);

/// Configuration for spawning a session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Command to execute.
    pub command: String,
    /// Command arguments.
    pub args: Vec<String>,
    /// Working directory.
    pub cwd: Option<String>,
    /// Terminal size.
    pub size: TerminalSize,
    /// Environment applied to the child after clearing the inherited one.
    pub env: EnvPolicy,
}

/// Result of one bounded read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadChunk {
    /// Output arrived.
    Data(Vec<u8>),
    /// Nothing arrived before the timeout.
    Idle,
    /// The PTY is closed; the shell is gone.
    Eof,
}

/// A PTY-backed shell session.
pub struct Session {
    session_id: SessionId,
    terminal: Terminal,
    writer: Box<dyn Write + Send>,
    reader: Box<dyn Read + Send>,
    child: Box<dyn portable_pty::Child + Send + Sync>,
    // Kept alive so the PTY stays open for the child.
    _master: Box<dyn portable_pty::MasterPty + Send>,
    started_at: Instant,
}

impl Session {
    /// Spawn the configured command attached to a new PTY.
    ///
    /// # Errors
    /// Returns `E_IO` if PTY creation or command spawn fails, `E_PROTOCOL` if
    /// the environment policy is rejected.
    pub fn spawn(config: SessionConfig) -> Result<Self, HarnessError> {
        let system = native_pty_system();
        let pair = system
            .openpty(PtySize {
                rows: config.size.rows,
                cols: config.size.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|err| HarnessError::io("failed to open pty", err))?;

        let mut cmd = CommandBuilder::new(&config.command);
        cmd.args(&config.args);
        if let Some(cwd) = &config.cwd {
            cmd.cwd(cwd);
        }
        apply_env_policy(&config.env, &mut cmd)?;

        let child = pair.slave.spawn_command(cmd).map_err(|err| {
            HarnessError::new(
                crate::model::ErrorCode::Io,
                "failed to spawn shell",
                Some(serde_json::json!({
                    "command": config.command,
                    "source": err.to_string(),
                })),
            )
        })?;

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|err| HarnessError::io("failed to clone pty reader", err))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|err| HarnessError::io("failed to take pty writer", err))?;

        #[cfg(unix)]
        {
            if let Some(fd) = pair.master.as_raw_fd() {
                let flags = OFlag::from_bits_truncate(
                    fcntl(fd, FcntlArg::F_GETFL)
                        .map_err(|err| HarnessError::io("failed to get fd flags", err))?,
                );
                fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))
                    .map_err(|err| HarnessError::io("failed to set nonblocking", err))?;
            }
        }

        let session_id = SessionId::new();
        tracing::debug!(
            %session_id,
            command = %config.command,
            args = ?config.args,
            pid = ?child.process_id(),
            "spawned shell"
        );

        Ok(Self {
            session_id,
            terminal: Terminal::new(config.size),
            writer,
            reader,
            child,
            _master: pair.master,
            started_at: Instant::now(),
        })
    }

    /// Write raw bytes to the shell's input.
    ///
    /// # Errors
    /// - `E_IO`: Failed to write to PTY
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), HarnessError> {
        self.writer
            .write_all(bytes)
            .map_err(|err| HarnessError::io("failed to write to pty", err))?;
        self.writer
            .flush()
            .map_err(|err| HarnessError::io("failed to flush pty writer", err))
    }

    /// Read whatever output is available, waiting at most `timeout` for the
    /// first byte.
    ///
    /// Once output starts arriving the PTY is drained without further waiting.
    /// All bytes are also fed to the terminal emulator.
    ///
    /// # Errors
    /// - `E_IO`: Failed to read from PTY
    pub fn read_chunk(&mut self, timeout: Duration) -> Result<ReadChunk, HarnessError> {
        let mut total = Vec::new();
        let deadline = Instant::now() + timeout;
        let mut read_buffer = [0u8; READ_BUFFER_BYTES];
        let eof = loop {
            match self.reader.read(&mut read_buffer) {
                Ok(0) => break true,
                Ok(count) => {
                    total.extend_from_slice(read_buffer.get(..count).unwrap_or_default());
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    if !total.is_empty() || Instant::now() >= deadline {
                        break false;
                    }
                    std::thread::sleep(IDLE_POLL);
                }
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
                Err(err) if is_closed_pty(&err) => break true,
                Err(err) => return Err(HarnessError::io("failed to read pty", err)),
            }
        };

        if !total.is_empty() {
            self.terminal.process_bytes(&total);
            return Ok(ReadChunk::Data(total));
        }
        Ok(if eof { ReadChunk::Eof } else { ReadChunk::Idle })
    }

    /// Current screen contents.
    pub fn snapshot(&self) -> ScreenSnapshot {
        self.terminal.snapshot()
    }

    /// Wait for the child process to exit.
    ///
    /// Returns `Some(ExitStatus)` if the process exits within `timeout`,
    /// or `None` if the timeout expires.
    ///
    /// # Errors
    /// - `E_IO`: Failed to check process status
    pub fn wait_for_exit(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<portable_pty::ExitStatus>, HarnessError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => return Ok(Some(status)),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        return Ok(None);
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(err) => return Err(HarnessError::io("failed to wait for child", err)),
            }
        }
    }

    /// Gracefully terminate the process group with SIGTERM, falling back to SIGKILL.
    ///
    /// # Errors
    /// - `E_IO`: Failed to signal or wait for process
    pub fn terminate_process_group(
        &mut self,
        grace: Duration,
    ) -> Result<Option<portable_pty::ExitStatus>, HarnessError> {
        if let Some(status) = self.wait_for_exit(Duration::ZERO)? {
            return Ok(Some(status));
        }

        #[cfg(unix)]
        if let Some(pid) = self.child.process_id() {
            // Process IDs are always positive and fit in i32
            #[allow(clippy::cast_possible_wrap)]
            let pgid = Pid::from_raw(pid as i32);
            signal_process_group(pgid, Signal::SIGTERM)?;
            if let Some(status) = self.wait_for_exit(grace)? {
                return Ok(Some(status));
            }
            signal_process_group(pgid, Signal::SIGKILL)?;
            return self.wait_for_exit(Duration::from_millis(200));
        }

        self.child
            .kill()
            .map_err(|err| HarnessError::io("failed to terminate child", err))?;
        self.wait_for_exit(grace)
    }

    /// Shut the session down, returning the shell's exit status if observed.
    ///
    /// # Errors
    /// - `E_IO`: Failed to flush writer, signal process, or wait for exit
    pub fn close(mut self, grace: Duration) -> Result<Option<portable_pty::ExitStatus>, HarnessError> {
        self.writer
            .flush()
            .map_err(|err| HarnessError::io("failed to flush pty writer during close", err))?;
        let status = self.terminate_process_group(grace)?;
        tracing::debug!(
            session_id = %self.session_id,
            elapsed_ms = self.elapsed_ms(),
            exit_code = ?status.as_ref().map(portable_pty::ExitStatus::exit_code),
            "closed shell session"
        );
        Ok(status)
    }

    /// Get the session identifier.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Milliseconds since spawn.
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started_at.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Best-effort cleanup of the child process. Used by Drop.
    fn cleanup_process_best_effort(&mut self) {
        let _ = self.writer.flush();
        if self.child.try_wait().ok().flatten().is_some() {
            return;
        }

        #[cfg(unix)]
        if let Some(pid) = self.child.process_id() {
            // Process IDs are always positive and fit in i32
            #[allow(clippy::cast_possible_wrap)]
            let pgid = Pid::from_raw(pid as i32);
            let _ = signal_process_group(pgid, Signal::SIGTERM);

            // Wait briefly for graceful exit (100ms max to keep Drop fast)
            let deadline = Instant::now() + Duration::from_millis(100);
            while Instant::now() < deadline {
                if self.child.try_wait().ok().flatten().is_some() {
                    return;
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            let _ = signal_process_group(pgid, Signal::SIGKILL);
        }

        #[cfg(not(unix))]
        {
            let _ = self.child.kill();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cleanup_process_best_effort();
    }
}

/// Linux reports a PTY whose slave side has closed as `EIO`.
fn is_closed_pty(err: &std::io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(Errno::EIO as i32)
    }
    #[cfg(not(unix))]
    {
        err.kind() == std::io::ErrorKind::BrokenPipe
    }
}

#[cfg(unix)]
fn signal_process_group(pgid: Pid, signal: Signal) -> Result<(), HarnessError> {
    match killpg(pgid, signal) {
        // ESRCH means process already gone, which is fine
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(err) => Err(HarnessError::io("failed to signal process group", err)),
    }
}
