//! Drives the Climate Predictability Tool as a child process.
//!
//! The engine is a menu-driven program: it reads one numbered choice or path
//! per line on stdin and answers on stdout, ending each answer with a short
//! sentinel byte sequence. [`Session`] wraps that exchange, detects errors and
//! exits, and owns the workspace the engine writes its results into.

pub mod error;
pub mod framing;
pub mod open_files;
pub mod options;
pub mod outputs;
pub mod session;
pub mod signals;
pub mod workspace;

pub use error::{Diagnostics, EngineError, ErrorKind};
pub use framing::{Feed, ReadOutcome, ResponseReader, SentinelFramer, DEFAULT_SENTINEL};
pub use open_files::{OpenFileProbe, ProbeOutcome, ProcFsProbe};
pub use options::{SessionOptions, DEFAULT_HANDSHAKE};
pub use outputs::{OutputRegistry, DATA_SUFFIX, DEFAULT_OUTPUT_FILES};
pub use session::{Session, SessionState, LINE_ENDING};
#[cfg(unix)]
pub use signals::{cancel_on_signals, SignalCancelGuard};
pub use signals::{cancel_signal, is_cancelled, CancelSignal};
pub use workspace::Workspace;
