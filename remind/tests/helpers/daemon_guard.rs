use super::polling::{wait_for_file_content, wait_for_file_removed, WaitError};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const READY_TIMEOUT: Duration = Duration::from_secs(5);

/// RAII wrapper that ensures the daemon process is cleaned up.
pub struct DaemonGuard {
    child: Option<Child>,
    pid: u32,
    data_dir: PathBuf,
    stderr: Option<JoinHandle<String>>,
}

impl DaemonGuard {
    /// Start `remind-daemon` with its state in `data_dir`, polling every second.
    pub fn start(data_dir: &Path) -> Result<Self, DaemonError> {
        let mut child = Command::new(daemon_binary())
            .env("REMIND_DIR", data_dir)
            .env_remove("REMIND_FILE")
            .env("REMIND_POLL_INTERVAL_SECS", "1")
            .env("REMIND_NOTIFIER", "log")
            .env("RUST_LOG", "remind=info,remind_lib=debug")
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(DaemonError::SpawnFailed)?;

        // Drain stderr while the daemon runs so a full pipe never blocks it
        let stderr = child.stderr.take().map(drain);

        let guard = Self {
            pid: child.id(),
            child: Some(child),
            data_dir: data_dir.to_path_buf(),
            stderr,
        };

        guard.wait_for_ready().map_err(DaemonError::ReadyTimeout)?;

        Ok(guard)
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn pid_file(&self) -> PathBuf {
        self.data_dir.join("daemon.pid")
    }

    fn wait_for_ready(&self) -> Result<(), WaitError> {
        let pid = self.pid().to_string();
        wait_for_file_content(self.pid_file(), |content| content.trim() == pid, READY_TIMEOUT)
            .map(|_| ())
    }

    /// Send SIGTERM and wait for the process to exit, returning its stderr.
    #[cfg(unix)]
    pub fn terminate(mut self) -> Result<String, DaemonError> {
        unsafe {
            libc::kill(self.pid() as i32, libc::SIGTERM);
        }
        wait_for_file_removed(self.pid_file(), READY_TIMEOUT).map_err(DaemonError::ReadyTimeout)?;

        if let Some(mut child) = self.child.take() {
            child.wait().map_err(DaemonError::SpawnFailed)?;
        }
        Ok(self
            .stderr
            .take()
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default())
    }
}

fn drain(mut stderr: ChildStderr) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stderr.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

impl Drop for DaemonGuard {
    fn drop(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }

        if let Err(err) = child.kill() {
            eprintln!("Failed to terminate remind-daemon pid {}: {}", self.pid, err);
            return;
        }

        let _ = child.wait();
    }
}

/// Path of the daemon binary built for this test run.
pub fn daemon_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_remind-daemon"))
}

/// Path of the CLI binary built for this test run.
pub fn cli_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_remind"))
}

/// Errors that can occur when starting the daemon for tests.
#[derive(Debug)]
pub enum DaemonError {
    SpawnFailed(std::io::Error),
    ReadyTimeout(WaitError),
}

impl fmt::Display for DaemonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpawnFailed(err) => write!(f, "failed to spawn daemon: {}", err),
            Self::ReadyTimeout(err) => write!(f, "daemon never became ready: {}", err),
        }
    }
}

impl std::error::Error for DaemonError {}
