#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use cpt_engine::{EngineError, Session, SessionOptions};
use tempfile::TempDir;

/// A stand-in engine: prints a banner, answers each line with `ok <line>`,
/// and logs every received line next to itself in `received.log`.
pub const MOCK_ENGINE: &str = r#"#!/bin/sh
here=$(dirname "$0")
printf 'CLIMATE PREDICTABILITY TOOL (mock)\n\004\004\004'
while IFS= read -r line; do
  printf '%s\n' "$line" >> "$here/received.log"
  case "$line" in
    113) printf 'ERROR: invalid option\n\004\004\004' ;;
    list)
      printf 'Output Results\n  \n1. Pearson\n\004\004\004'
      printf '2. Spearman\n0. Exit\n\004\004\004'
      ;;
    burst) printf 'first\n\004\004\004second\n\004\004\004' ;;
    crash) printf 'bye\n'; exit 3 ;;
    hang) exec sleep 30 ;;
    hold) exec 3>"$here/held.txt"; printf 'holding\n\004\004\004' ;;
    release) exec 3>&-; printf 'released\n\004\004\004' ;;
    *) printf 'ok %s\n\004\004\004' "$line" ;;
  esac
done
"#;

/// Exits right after the banner.
pub const SHORT_LIVED_ENGINE: &str = "#!/bin/sh\nprintf 'banner\\004\\004\\004'\nexit 0\n";

pub struct MockEngine {
    dir: TempDir,
    path: PathBuf,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::with_script(MOCK_ENGINE)
    }

    pub fn with_script(script: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("CPT.x");
        fs::write(&path, script).expect("write mock engine");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod mock engine");
        Self { dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn workspace_root(&self) -> PathBuf {
        self.dir.path().join("workspaces")
    }

    /// Options with short bounds and a scratch workspace root.
    pub fn options(&self) -> SessionOptions {
        SessionOptions::new()
            .with_workspace_root(self.workspace_root())
            .with_read_timeout(Duration::from_secs(10))
            .with_wait_timeout(Duration::from_secs(10))
            .with_poll_interval(Duration::from_millis(20))
    }

    pub fn spawn(&self) -> Session {
        self.spawn_with(self.options()).expect("spawn mock engine")
    }

    /// Retries `ETXTBSY`, which a concurrent fork in another test can cause
    /// right after the script is written.
    pub fn spawn_with(&self, options: SessionOptions) -> Result<Session, EngineError> {
        let mut attempts = 0;
        loop {
            match Session::spawn(&self.path, options.clone()) {
                Err(EngineError::Spawn { source, .. })
                    if source.raw_os_error() == Some(26) && attempts < 20 =>
                {
                    attempts += 1;
                    thread::sleep(Duration::from_millis(25));
                }
                other => return other,
            }
        }
    }

    /// Lines the mock has received so far, handshake included.
    pub fn received(&self) -> Vec<String> {
        fs::read_to_string(self.dir.path().join("received.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}
