//! Environment configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use cpt_engine::SessionOptions;

use crate::error::Error;

#[cfg(windows)]
pub const ENGINE_BINARY: &str = "CPT_batch.exe";
#[cfg(not(windows))]
pub const ENGINE_BINARY: &str = "CPT.x";

#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub bin_dir: Option<PathBuf>,
    pub workspace: Option<PathBuf>,
    pub workspace_root: Option<PathBuf>,
    pub transcript: Option<PathBuf>,
    pub project_file: Option<PathBuf>,
    pub read_timeout: Option<Duration>,
    pub wait_timeout: Option<Duration>,
    pub poll_interval: Option<Duration>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            bin_dir: env_path_opt("CPT_BIN_DIR"),
            workspace: env_path_opt("CPT_WORKSPACE"),
            workspace_root: env_path_opt("CPT_WORKSPACE_ROOT"),
            transcript: env_path_opt("CPT_TRANSCRIPT"),
            project_file: env_path_opt("CPT_PROJECT_FILE"),
            read_timeout: env_u64_opt("CPT_READ_TIMEOUT_SEC").map(Duration::from_secs),
            wait_timeout: env_u64_opt("CPT_WAIT_TIMEOUT_SEC").map(Duration::from_secs),
            poll_interval: env_u64_opt("CPT_POLL_INTERVAL_MS").map(Duration::from_millis),
        }
    }

    /// Full path of the engine binary inside `CPT_BIN_DIR`.
    pub fn engine_executable(&self) -> Result<PathBuf, Error> {
        self.bin_dir
            .as_ref()
            .map(|dir| dir.join(ENGINE_BINARY))
            .ok_or(Error::MissingBinDir)
    }

    /// Session options with every configured value applied over the defaults.
    pub fn session_options(&self) -> SessionOptions {
        let mut options = SessionOptions::new();
        if let Some(dir) = &self.workspace {
            options = options.with_workspace(dir);
        }
        if let Some(dir) = &self.workspace_root {
            options = options.with_workspace_root(dir);
        }
        if let Some(path) = &self.transcript {
            options = options.with_transcript(path);
        }
        if let Some(path) = &self.project_file {
            options = options.with_project_file(path);
        }
        if let Some(timeout) = self.read_timeout {
            options = options.with_read_timeout(timeout);
        }
        if let Some(timeout) = self.wait_timeout {
            options = options.with_wait_timeout(timeout);
        }
        if let Some(interval) = self.poll_interval {
            options = options.with_poll_interval(interval);
        }
        options
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

fn env_path_opt(key: &str) -> Option<PathBuf> {
    env_string_opt(key).map(PathBuf::from)
}

fn env_u64_opt(key: &str) -> Option<u64> {
    env_string_opt(key).and_then(|value| value.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::{EnvConfig, ENGINE_BINARY};
    use crate::error::Error;
    use cpt_engine::options::{DEFAULT_POLL_INTERVAL, DEFAULT_READ_TIMEOUT};
    use std::env;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    const KEYS: [&str; 8] = [
        "CPT_BIN_DIR",
        "CPT_WORKSPACE",
        "CPT_WORKSPACE_ROOT",
        "CPT_TRANSCRIPT",
        "CPT_PROJECT_FILE",
        "CPT_READ_TIMEOUT_SEC",
        "CPT_WAIT_TIMEOUT_SEC",
        "CPT_POLL_INTERVAL_MS",
    ];

    struct EnvGuard {
        key: &'static str,
        previous: Option<String>,
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = &self.previous {
                env::set_var(self.key, value);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
            .lock()
            .expect("env lock poisoned")
    }

    fn set_env_guard(key: &'static str, value: Option<&str>) -> EnvGuard {
        let previous = env::var(key).ok();
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
        EnvGuard { key, previous }
    }

    fn clear_all() -> Vec<EnvGuard> {
        KEYS.iter().map(|key| set_env_guard(key, None)).collect()
    }

    #[test]
    fn unset_environment_keeps_defaults() {
        let _lock = env_lock();
        let _guards = clear_all();

        let config = EnvConfig::from_env();
        assert!(config.bin_dir.is_none());
        assert!(config.read_timeout.is_none());
        assert!(matches!(config.engine_executable(), Err(Error::MissingBinDir)));

        let options = config.session_options();
        assert_eq!(options.read_timeout, DEFAULT_READ_TIMEOUT);
        assert_eq!(options.poll_interval, DEFAULT_POLL_INTERVAL);
        assert!(options.workspace.is_none());
    }

    #[test]
    fn configured_values_reach_session_options() {
        let _lock = env_lock();
        let _guards = clear_all();
        let _g1 = set_env_guard("CPT_BIN_DIR", Some("/opt/cpt/bin"));
        let _g2 = set_env_guard("CPT_WORKSPACE", Some("/data/run"));
        let _g3 = set_env_guard("CPT_READ_TIMEOUT_SEC", Some("30"));
        let _g4 = set_env_guard("CPT_POLL_INTERVAL_MS", Some(" 250 "));
        let _g5 = set_env_guard("CPT_PROJECT_FILE", Some("/data/run/session.cpt"));

        let config = EnvConfig::from_env();
        assert_eq!(
            config.engine_executable().expect("executable"),
            PathBuf::from("/opt/cpt/bin").join(ENGINE_BINARY)
        );

        let options = config.session_options();
        assert_eq!(options.workspace, Some(PathBuf::from("/data/run")));
        assert_eq!(options.read_timeout, Duration::from_secs(30));
        assert_eq!(options.poll_interval, Duration::from_millis(250));
        assert_eq!(
            options.project_file,
            Some(PathBuf::from("/data/run/session.cpt"))
        );
    }

    #[test]
    fn empty_and_unparsable_values_are_ignored() {
        let _lock = env_lock();
        let _guards = clear_all();
        let _g1 = set_env_guard("CPT_TRANSCRIPT", Some("  "));
        let _g2 = set_env_guard("CPT_WAIT_TIMEOUT_SEC", Some("soon"));

        let config = EnvConfig::from_env();
        assert!(config.transcript.is_none());
        assert!(config.wait_timeout.is_none());
    }
}
