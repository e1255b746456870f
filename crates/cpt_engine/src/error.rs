use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Coarse classification used by callers deciding whether to retry setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The engine could not be located, launched, or given a workspace.
    Resource,
    /// The engine misbehaved or the exchange was aborted.
    Protocol,
}

/// Snapshot of the session at the time a protocol error was raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub last_command: String,
    pub last_message: String,
    pub alive: bool,
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.alive {
            "ALIVE (WILL BE STOPPED)"
        } else {
            "DEAD"
        };
        writeln!(f, "PROCESS STATUS: {status}")?;
        writeln!(f, "  last command: '{}'", self.last_command.trim())?;
        write!(f, "  last message: '{}'", self.last_message.trim())
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine executable not found at {path}")]
    ExecutableNotFound { path: PathBuf },

    #[error("failed to launch engine {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("home directory is unavailable; set a workspace root explicitly")]
    HomeDirUnavailable,

    #[error("failed to install signal handlers: {source}")]
    SignalHandlers {
        #[source]
        source: std::io::Error,
    },

    #[error("engine reported an error for command '{command}'\n{diagnostics}")]
    EngineReported {
        command: String,
        response: String,
        diagnostics: Diagnostics,
    },

    #[error("engine exited during start-up\n{diagnostics}")]
    EngineExited { diagnostics: Diagnostics },

    #[error("engine did not respond within {timeout:?}\n{diagnostics}")]
    Timeout {
        timeout: Duration,
        diagnostics: Diagnostics,
    },

    #[error("engine exchange cancelled\n{diagnostics}")]
    Cancelled { diagnostics: Diagnostics },

    #[error("session is dead and accepts no further commands\n{diagnostics}")]
    SessionDead { diagnostics: Diagnostics },

    #[error("engine process #{pid} no longer exists; cleaned workspace {workspace}")]
    EngineDied { pid: u32, workspace: PathBuf },

    #[error("engine pipe failed while {operation}: {source}\n{diagnostics}")]
    Pipe {
        operation: &'static str,
        #[source]
        source: std::io::Error,
        diagnostics: Diagnostics,
    },
}

impl EngineError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ExecutableNotFound { .. }
            | Self::Spawn { .. }
            | Self::Io { .. }
            | Self::HomeDirUnavailable
            | Self::SignalHandlers { .. } => ErrorKind::Resource,
            Self::EngineReported { .. }
            | Self::EngineExited { .. }
            | Self::Timeout { .. }
            | Self::Cancelled { .. }
            | Self::SessionDead { .. }
            | Self::EngineDied { .. }
            | Self::Pipe { .. } => ErrorKind::Protocol,
        }
    }

    /// Session snapshot carried by protocol errors.
    #[must_use]
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            Self::EngineReported { diagnostics, .. }
            | Self::EngineExited { diagnostics }
            | Self::Timeout { diagnostics, .. }
            | Self::Cancelled { diagnostics }
            | Self::SessionDead { diagnostics }
            | Self::Pipe { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }
}
