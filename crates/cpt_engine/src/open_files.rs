//! Inspection of the files a process currently holds open.

use std::fmt;
use std::io;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Regular files the process has open.
    Open(Vec<PathBuf>),
    /// The process no longer exists.
    Gone,
}

pub trait OpenFileProbe: fmt::Debug + Send + Sync {
    fn open_files(&self, pid: u32) -> io::Result<ProbeOutcome>;
}

/// Reads `/proc/<pid>/fd` on Linux. Other unix systems only learn whether the
/// process is alive, so the open-file set is always reported empty there.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcFsProbe;

#[cfg(target_os = "linux")]
impl OpenFileProbe for ProcFsProbe {
    fn open_files(&self, pid: u32) -> io::Result<ProbeOutcome> {
        use std::fs;

        if is_zombie(pid)? {
            return Ok(ProbeOutcome::Gone);
        }

        let entries = match fs::read_dir(format!("/proc/{pid}/fd")) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(ProbeOutcome::Gone),
            Err(err) => return Err(err),
        };

        let mut files = Vec::new();
        for entry in entries {
            // Descriptors can close between listing and readlink.
            let Ok(entry) = entry else { continue };
            let Ok(target) = fs::read_link(entry.path()) else {
                continue;
            };
            if target.is_absolute() && fs::metadata(&target).is_ok_and(|meta| meta.is_file()) {
                files.push(target);
            }
        }
        files.sort();
        files.dedup();
        Ok(ProbeOutcome::Open(files))
    }
}

#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> io::Result<bool> {
    let stat = match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(err) => return Err(err),
    };
    // The state follows the parenthesised command name, which may itself contain ')'.
    let state = stat
        .rfind(')')
        .and_then(|index| stat[index + 1..].split_whitespace().next());
    Ok(matches!(state, Some("Z") | Some("X")))
}

#[cfg(all(unix, not(target_os = "linux")))]
impl OpenFileProbe for ProcFsProbe {
    fn open_files(&self, pid: u32) -> io::Result<ProbeOutcome> {
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return Ok(ProbeOutcome::Gone);
        };
        // SAFETY: signal 0 performs only the existence and permission check.
        let result = unsafe { libc::kill(pid, 0) };
        if result == 0 {
            return Ok(ProbeOutcome::Open(Vec::new()));
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            Ok(ProbeOutcome::Gone)
        } else {
            Err(err)
        }
    }
}

#[cfg(not(unix))]
impl OpenFileProbe for ProcFsProbe {
    fn open_files(&self, _pid: u32) -> io::Result<ProbeOutcome> {
        Ok(ProbeOutcome::Open(Vec::new()))
    }
}
