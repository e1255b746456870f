use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::framing::DEFAULT_SENTINEL;
use crate::open_files::{OpenFileProbe, ProcFsProbe};
use crate::outputs::DEFAULT_OUTPUT_FILES;
use crate::signals::{cancel_signal, CancelSignal};

/// Commands sent right after the banner: no repeated option listing (572),
/// no progress meter (574), error-handling mode (571) set to stop (3).
pub const DEFAULT_HANDSHAKE: [&str; 4] = ["572", "574", "571", "3"];

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Caller-owned output directory; never removed.
    pub workspace: Option<PathBuf>,
    /// Parent of ephemeral workspaces; defaults to `~/.cptkit_workspace`.
    pub workspace_root: Option<PathBuf>,
    /// Receives every command and response.
    pub transcript: Option<PathBuf>,
    /// Receives every command, replayable with `Session::execute_script`.
    pub project_file: Option<PathBuf>,
    pub output_files: Vec<(String, String)>,
    pub sentinel: Vec<u8>,
    pub read_timeout: Duration,
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
    pub handshake: Vec<String>,
    pub cancel: CancelSignal,
    pub probe: Arc<dyn OpenFileProbe>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            workspace: None,
            workspace_root: None,
            transcript: None,
            project_file: None,
            output_files: DEFAULT_OUTPUT_FILES
                .iter()
                .map(|(name, stem)| ((*name).to_string(), (*stem).to_string()))
                .collect(),
            sentinel: DEFAULT_SENTINEL.to_vec(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            handshake: DEFAULT_HANDSHAKE.iter().map(|cmd| (*cmd).to_string()).collect(),
            cancel: cancel_signal(),
            probe: Arc::new(ProcFsProbe),
        }
    }
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workspace(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workspace = Some(dir.into());
        self
    }

    pub fn with_workspace_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(dir.into());
        self
    }

    pub fn with_transcript(mut self, path: impl Into<PathBuf>) -> Self {
        self.transcript = Some(path.into());
        self
    }

    pub fn with_project_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_file = Some(path.into());
        self
    }

    /// Adds or replaces one registry entry.
    pub fn with_output_file(mut self, name: impl Into<String>, stem: impl Into<String>) -> Self {
        let name = name.into();
        let stem = stem.into();
        match self.output_files.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = stem,
            None => self.output_files.push((name, stem)),
        }
        self
    }

    pub fn with_sentinel(mut self, sentinel: impl Into<Vec<u8>>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_handshake<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.handshake = commands.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn OpenFileProbe>) -> Self {
        self.probe = probe;
        self
    }
}
