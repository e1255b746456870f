use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use crate::error::EngineError;

/// Directory under the home directory that holds ephemeral workspaces.
pub const DEFAULT_ROOT_DIR: &str = ".cptkit_workspace";

/// A session's working directory.
///
/// Ephemeral workspaces are `<root>/<uuid>` and are removed on cleanup.
/// Persistent ones belong to the caller and are never removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    path: PathBuf,
    ephemeral: bool,
}

impl Workspace {
    pub fn ephemeral(root: Option<&Path>) -> Result<Self, EngineError> {
        let root = match root {
            Some(root) => root.to_path_buf(),
            None => default_root()?,
        };
        let path = root.join(Uuid::new_v4().to_string());
        fs::create_dir_all(&path)
            .map_err(|source| EngineError::io("creating workspace", &path, source))?;
        let path = absolute(&path)?;
        debug!(path = %path.display(), "created ephemeral workspace");
        Ok(Self {
            path,
            ephemeral: true,
        })
    }

    pub fn persistent(path: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let path = path.into();
        fs::create_dir_all(&path)
            .map_err(|source| EngineError::io("creating workspace", &path, source))?;
        let path = absolute(&path)?;
        Ok(Self {
            path,
            ephemeral: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    /// Removes an ephemeral workspace; a no-op for persistent ones.
    pub fn remove(&self) -> Result<(), EngineError> {
        if !self.ephemeral || !self.path.is_dir() {
            return Ok(());
        }
        fs::remove_dir_all(&self.path)
            .map_err(|source| EngineError::io("removing workspace", &self.path, source))?;
        debug!(path = %self.path.display(), "removed ephemeral workspace");
        Ok(())
    }
}

/// The engine runs inside the workspace, so every path handed to it must
/// be absolute.
fn absolute(path: &Path) -> Result<PathBuf, EngineError> {
    std::path::absolute(path)
        .map_err(|source| EngineError::io("resolving workspace path", path, source))
}

pub fn default_root() -> Result<PathBuf, EngineError> {
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_ROOT_DIR))
        .ok_or(EngineError::HomeDirUnavailable)
}
