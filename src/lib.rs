//! Automation toolkit for the Climate Predictability Tool.
//!
//! # Public API Overview
//! - Drive the engine through [`Session`]: spawn, send menu commands, wait for
//!   result files, tear down.
//! - Exchange data through CPTv10 files with [`read`] and [`write`], which
//!   convert to and from [`LabeledArray`].
//! - Configure sessions from the environment with [`EnvConfig`] and install
//!   log output with [`init_tracing`].

pub mod config;
pub mod error;
pub mod logging;

use tracing::debug;

pub use cpt_engine;
pub use cpt_format;

/// Engine driver.
pub use cpt_engine::{
    cancel_signal, CancelSignal, Diagnostics, EngineError, ErrorKind, OutputRegistry, Session,
    SessionOptions, SessionState, Workspace, DEFAULT_OUTPUT_FILES,
};
#[cfg(unix)]
pub use cpt_engine::{cancel_on_signals, SignalCancelGuard};

/// CPTv10 codec and array model.
pub use cpt_format::{
    guess_roles, read, validate, write, Attributes, CoordValues, Coordinate, Dataset, DateToken,
    FormatError, LabeledArray, LabeledArrayBuilder, Role, RoleAssignment, RoleHints, WriteOptions,
};

pub use config::EnvConfig;
pub use error::{Error, Result};
pub use logging::init_tracing;

/// Spawns the engine found under `CPT_BIN_DIR` with options from the environment.
pub fn spawn_from_env() -> Result<Session> {
    let config = EnvConfig::from_env();
    let executable = config.engine_executable()?;
    debug!(executable = %executable.display(), "spawning engine from environment");
    Ok(Session::spawn(executable, config.session_options())?)
}
