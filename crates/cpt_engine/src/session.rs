//! The engine driver.
//!
//! A [`Session`] owns one engine process and one workspace. Commands go in on
//! stdin one line at a time; each response is read up to the sentinel. Any
//! `ERROR:` in a response, a timeout, or a cancellation kills the process and
//! leaves the session [`SessionState::Dead`].

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

use crate::error::{Diagnostics, EngineError};
use crate::framing::{ReadError, ResponseReader};
use crate::open_files::{OpenFileProbe, ProbeOutcome};
use crate::options::SessionOptions;
use crate::outputs::OutputRegistry;
use crate::signals::{is_cancelled, CancelSignal};
use crate::workspace::Workspace;

#[cfg(windows)]
pub const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
pub const LINE_ENDING: &str = "\n";

/// Marks a response that pages its listing; reading continues to [`LISTING_END`].
pub const LISTING_MARKER: &str = "Output Results\n  \n";
pub const LISTING_END: &str = "0. Exit";
pub const ERROR_MARKER: &str = "ERROR:";

const KILL_REAP_TIMEOUT: Duration = Duration::from_secs(5);
const CLOSE_REAP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Ready,
    Busy,
    Dead,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Busy => "busy",
            Self::Dead => "dead",
        })
    }
}

pub struct Session {
    child: Child,
    pid: u32,
    stdin: Option<ChildStdin>,
    reader: ResponseReader,
    executable: PathBuf,
    workspace: Workspace,
    outputs: OutputRegistry,
    transcript: Option<PathBuf>,
    project_file: Option<PathBuf>,
    state: SessionState,
    last_command: String,
    last_message: String,
    read_timeout: Duration,
    wait_timeout: Duration,
    poll_interval: Duration,
    cancel: CancelSignal,
    probe: Arc<dyn OpenFileProbe>,
    closed: bool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("pid", &self.pid)
            .field("state", &self.state)
            .field("executable", &self.executable)
            .field("workspace", &self.workspace)
            .field("last_command", &self.last_command)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Launches the engine and completes the start-up handshake.
    pub fn spawn(executable: impl AsRef<Path>, options: SessionOptions) -> Result<Self, EngineError> {
        let requested = executable.as_ref();
        if !requested.is_file() {
            return Err(EngineError::ExecutableNotFound {
                path: requested.to_path_buf(),
            });
        }
        let executable = requested
            .canonicalize()
            .map_err(|source| EngineError::io("resolving engine executable", requested, source))?;

        let workspace = match &options.workspace {
            Some(dir) => Workspace::persistent(dir)?,
            None => Workspace::ephemeral(options.workspace_root.as_deref())?,
        };
        let outputs = OutputRegistry::new(
            workspace.path(),
            options
                .output_files
                .iter()
                .map(|(name, stem)| (name.as_str(), stem.as_str())),
        );

        let spawned = Command::new(&executable)
            .current_dir(workspace.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(source) => {
                if let Err(err) = workspace.remove() {
                    warn!(error = %err, "failed to remove workspace after spawn failure");
                }
                return Err(EngineError::Spawn {
                    path: executable,
                    source,
                });
            }
        };

        let pid = child.id();
        let stdin = child.stdin.take();
        let reader = match child.stdout.take() {
            Some(stdout) => ResponseReader::spawn(stdout, options.sentinel.clone()),
            None => ResponseReader::spawn(io::empty(), options.sentinel.clone()),
        };
        if let Some(stderr) = child.stderr.take() {
            drain_stderr(stderr, pid);
        }
        info!(pid, executable = %executable.display(), workspace = %workspace.path().display(), "spawned engine");

        let mut session = Self {
            child,
            pid,
            stdin,
            reader,
            last_command: executable.display().to_string(),
            last_message: "has not started yet".to_string(),
            executable,
            workspace,
            outputs,
            transcript: options.transcript,
            project_file: options.project_file,
            state: SessionState::Starting,
            read_timeout: options.read_timeout,
            wait_timeout: options.wait_timeout,
            poll_interval: options.poll_interval,
            cancel: options.cancel,
            probe: options.probe,
            closed: false,
        };

        if let Err(err) = session.start(&options.handshake) {
            session.abandon();
            return Err(err);
        }
        Ok(session)
    }

    fn start(&mut self, handshake: &[String]) -> Result<(), EngineError> {
        let banner = self.read()?;
        self.last_message = banner;
        for command in handshake {
            self.exchange(command)?;
        }
        if !self.is_alive() {
            let diagnostics = self.diagnostics();
            self.state = SessionState::Dead;
            return Err(EngineError::EngineExited { diagnostics });
        }
        self.state = SessionState::Ready;
        Ok(())
    }

    /// Sends one command and reads its response. Returns whether the engine
    /// is still running afterwards.
    pub fn write(&mut self, command: impl fmt::Display) -> Result<bool, EngineError> {
        if self.state == SessionState::Dead {
            return Err(EngineError::SessionDead {
                diagnostics: self.diagnostics(),
            });
        }

        self.state = SessionState::Busy;
        let alive = match self.exchange(&command.to_string()) {
            Ok(alive) => alive,
            Err(err) => {
                // A half-finished exchange leaves stdout out of step with stdin.
                if self.state == SessionState::Busy {
                    self.kill();
                }
                return Err(err);
            }
        };
        self.state = if alive {
            SessionState::Ready
        } else {
            SessionState::Dead
        };
        Ok(alive)
    }

    fn exchange(&mut self, command: &str) -> Result<bool, EngineError> {
        let mut line = command.to_string();
        if !line.ends_with(LINE_ENDING) {
            line.push_str(LINE_ENDING);
        }

        if let Some(project_file) = &self.project_file {
            append_to(project_file, &line, "recording project file")?;
        }
        if let Err(source) = self.send(&line) {
            return Err(self.fail(|diagnostics| EngineError::Pipe {
                operation: "sending command",
                source,
                diagnostics,
            }));
        }
        if let Some(transcript) = &self.transcript {
            append_to(transcript, &format!("{line}\n"), "writing transcript")?;
        }
        debug!(pid = self.pid, command = line.trim_end(), "sent engine command");

        let mut response = self.read()?;
        if response.contains(LISTING_MARKER) {
            while !response.contains(LISTING_END) && !self.reader.is_closed() {
                let page = self.read()?;
                response.push_str(&page);
            }
        }

        if response.contains(ERROR_MARKER) {
            let command = line.trim_end().to_string();
            let alive = self.is_alive();
            self.kill();
            warn!(pid = self.pid, command = %command, "engine reported an error");
            return Err(EngineError::EngineReported {
                diagnostics: Diagnostics {
                    last_command: command.clone(),
                    last_message: response.clone(),
                    alive,
                },
                command,
                response,
            });
        }

        if let Some(transcript) = &self.transcript {
            append_to(transcript, &format!("{response}\n"), "writing transcript")?;
        }
        debug!(pid = self.pid, bytes = response.len(), "received engine response");
        self.last_message = response;
        self.last_command = line;
        Ok(self.is_alive())
    }

    fn send(&mut self, line: &str) -> io::Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "engine stdin is closed"))?;
        stdin.write_all(line.as_bytes())?;
        stdin.flush()
    }

    /// Reads up to the next sentinel, or until the engine's output ends.
    pub fn read(&mut self) -> Result<String, EngineError> {
        match self.reader.read(Some(self.read_timeout), &self.cancel) {
            Ok(outcome) => {
                let closed = outcome.is_closed();
                let text = outcome.into_text();
                if closed {
                    self.reap_closed();
                }
                Ok(text)
            }
            Err(ReadError::Timeout) => {
                let timeout = self.read_timeout;
                Err(self.fail(|diagnostics| EngineError::Timeout {
                    timeout,
                    diagnostics,
                }))
            }
            Err(ReadError::Cancelled) => {
                Err(self.fail(|diagnostics| EngineError::Cancelled { diagnostics }))
            }
            Err(ReadError::Pipe(source)) => Err(self.fail(|diagnostics| EngineError::Pipe {
                operation: "reading response",
                source,
                diagnostics,
            })),
        }
    }

    /// Sends every line of a recorded project file, stopping at the first error.
    pub fn execute_script(&mut self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        let path = path.as_ref();
        let script = fs::read_to_string(path)
            .map_err(|source| EngineError::io("reading script", path, source))?;
        for command in script.lines() {
            self.write(command)?;
        }
        Ok(())
    }

    /// Blocks until the engine holds no regular files open.
    pub fn wait_for_files(&mut self) -> Result<(), EngineError> {
        self.wait_for_files_inner(false)
    }

    fn wait_for_files_inner(&mut self, teardown: bool) -> Result<(), EngineError> {
        let started = Instant::now();
        loop {
            let outcome = if self.has_exited() {
                ProbeOutcome::Gone
            } else {
                self.probe.open_files(self.pid).map_err(|source| {
                    EngineError::io(
                        "listing engine open files",
                        format!("/proc/{}/fd", self.pid),
                        source,
                    )
                })?
            };

            match outcome {
                ProbeOutcome::Gone => {
                    self.state = SessionState::Dead;
                    let cleaned = self.clean();
                    if teardown {
                        return cleaned;
                    }
                    warn!(
                        pid = self.pid,
                        workspace = %self.workspace.path().display(),
                        "engine process no longer exists; cleaned its workspace"
                    );
                    cleaned?;
                    return Err(EngineError::EngineDied {
                        pid: self.pid,
                        workspace: self.workspace.path().to_path_buf(),
                    });
                }
                ProbeOutcome::Open(files) => {
                    let pending = files
                        .iter()
                        .filter(|path| **path != self.executable)
                        .count();
                    if pending == 0 {
                        return Ok(());
                    }
                }
            }

            if is_cancelled(&self.cancel) {
                return Err(self.fail(|diagnostics| EngineError::Cancelled { diagnostics }));
            }
            if started.elapsed() >= self.wait_timeout {
                let timeout = self.wait_timeout;
                return Err(self.fail(|diagnostics| EngineError::Timeout {
                    timeout,
                    diagnostics,
                }));
            }
            thread::sleep(self.poll_interval);
        }
    }

    /// Removes an ephemeral workspace and kills the engine if it still runs.
    pub fn clean(&mut self) -> Result<(), EngineError> {
        let removed = self.workspace.remove();
        self.kill();
        removed
    }

    /// Waits for outstanding files, then cleans up. Errors from waiting are
    /// logged; only cleanup failures are returned.
    pub fn close(mut self) -> Result<(), EngineError> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<(), EngineError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Err(err) = self.wait_for_files_inner(true) {
            warn!(pid = self.pid, error = %err, "engine did not release its files before teardown");
        }
        let cleaned = self.clean();
        info!(pid = self.pid, "engine session closed");
        cleaned
    }

    /// Tears down without waiting; used when start-up fails.
    fn abandon(&mut self) {
        self.closed = true;
        if let Err(err) = self.clean() {
            warn!(pid = self.pid, error = %err, "failed to clean up after start-up failure");
        }
    }

    /// The engine's stdout only ends when it exits, so the session is over
    /// either way.
    fn reap_closed(&mut self) {
        match self.child.wait_timeout(CLOSE_REAP_TIMEOUT) {
            Ok(Some(status)) => debug!(pid = self.pid, %status, "engine exited"),
            Ok(None) => warn!(pid = self.pid, "engine closed its output but kept running"),
            Err(err) => warn!(pid = self.pid, error = %err, "failed to reap engine"),
        }
        self.kill();
    }

    pub fn kill(&mut self) {
        self.state = SessionState::Dead;
        self.stdin.take();
        if self.has_exited() {
            return;
        }
        if let Err(err) = self.child.kill() {
            warn!(pid = self.pid, error = %err, "failed to kill engine");
        }
        match self.child.wait_timeout(KILL_REAP_TIMEOUT) {
            Ok(Some(_)) => {}
            Ok(None) => warn!(pid = self.pid, "engine did not exit after kill"),
            Err(err) => warn!(pid = self.pid, error = %err, "failed to reap engine"),
        }
    }

    pub fn is_alive(&mut self) -> bool {
        !self.has_exited()
    }

    fn has_exited(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }

    /// Kills the engine and builds an error carrying the pre-kill snapshot.
    fn fail(&mut self, make: impl FnOnce(Diagnostics) -> EngineError) -> EngineError {
        let diagnostics = self.diagnostics();
        self.kill();
        make(diagnostics)
    }

    fn diagnostics(&mut self) -> Diagnostics {
        Diagnostics {
            last_command: self.last_command.clone(),
            last_message: self.last_message.clone(),
            alive: self.is_alive(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn outputs(&self) -> &OutputRegistry {
        &self.outputs
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn last_command(&self) -> &str {
        &self.last_command
    }

    pub fn last_message(&self) -> &str {
        &self.last_message
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(err) = self.teardown() {
            warn!(pid = self.pid, error = %err, "engine teardown failed");
        }
    }
}

fn append_to(path: &Path, text: &str, operation: &'static str) -> Result<(), EngineError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| EngineError::io(operation, path, source))?;
    file.write_all(text.as_bytes())
        .map_err(|source| EngineError::io(operation, path, source))
}

fn drain_stderr<R: io::Read + Send + 'static>(stderr: R, pid: u32) {
    thread::spawn(move || {
        for line in BufReader::new(stderr).lines() {
            match line {
                Ok(line) if line.trim().is_empty() => {}
                Ok(line) => warn!(pid, stderr = %line, "engine wrote to stderr"),
                Err(_) => break,
            }
        }
    });
}
