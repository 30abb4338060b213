// Environment configuration for the CLI and daemon
// Resolves the alert file, PID file, poll interval and notifier backend

use std::path::PathBuf;
use std::time::Duration;

/// Default poll interval in seconds
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// File name of the alert list inside the state directory
pub const ALERTS_FILE_NAME: &str = "alerts";

/// Which notification backend the daemon uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifierKind {
    /// notify-send / osascript desktop notification
    #[default]
    Desktop,
    /// Terminal bell and OSC escape sequences on stdout
    Terminal,
    /// Log line only
    Log,
}

impl std::fmt::Display for NotifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifierKind::Desktop => write!(f, "desktop"),
            NotifierKind::Terminal => write!(f, "terminal"),
            NotifierKind::Log => write!(f, "log"),
        }
    }
}

impl std::str::FromStr for NotifierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "desktop" => Ok(NotifierKind::Desktop),
            "terminal" => Ok(NotifierKind::Terminal),
            "log" => Ok(NotifierKind::Log),
            _ => Err(format!("Unknown notifier: {}", s)),
        }
    }
}

/// Configuration for store and daemon paths and settings
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for persistent state (alert file, lock file)
    pub state_dir: PathBuf,
    /// The alert list
    pub alerts_file: PathBuf,
    /// Path to the daemon PID file
    pub pid_file: PathBuf,
    /// Time between poll cycles
    pub poll_interval: Duration,
    /// Notification backend for fired alerts
    pub notifier: NotifierKind,
}

impl Config {
    /// Create configuration using default paths
    pub fn default_paths() -> Self {
        Self::in_dir(Self::default_state_dir())
    }

    /// Configuration rooted at `state_dir`
    pub fn in_dir(state_dir: PathBuf) -> Self {
        Self {
            alerts_file: state_dir.join(ALERTS_FILE_NAME),
            pid_file: state_dir.join("daemon.pid"),
            state_dir,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            notifier: NotifierKind::default(),
        }
    }

    /// Create configuration from environment variables, falling back to defaults
    ///
    /// - `REMIND_DIR` replaces the state directory
    /// - `REMIND_FILE` points at a different alert file
    /// - `REMIND_POLL_INTERVAL_SECS` sets the poll interval
    /// - `REMIND_NOTIFIER` picks desktop, terminal or log
    pub fn from_env() -> Self {
        let mut config = match std::env::var("REMIND_DIR") {
            Ok(dir) if !dir.is_empty() => Self::in_dir(PathBuf::from(dir)),
            _ => Self::default_paths(),
        };

        if let Ok(file) = std::env::var("REMIND_FILE") {
            if !file.is_empty() {
                config.alerts_file = PathBuf::from(file);
            }
        }

        if let Some(secs) = std::env::var("REMIND_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
        {
            config.poll_interval = Duration::from_secs(secs);
        }

        if let Some(kind) = std::env::var("REMIND_NOTIFIER")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.notifier = kind;
        }

        config
    }

    /// Get the default state directory
    fn default_state_dir() -> PathBuf {
        // All platforms: ~/.remind/ (or /tmp/remind if home unavailable)
        dirs::home_dir()
            .map(|h| h.join(".remind"))
            .unwrap_or_else(|| PathBuf::from("/tmp/remind"))
    }

    /// Get the state directory
    pub fn state_dir(&self) -> &PathBuf {
        &self.state_dir
    }

    /// Ensure the state directory exists
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.state_dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.state_dir, std::fs::Permissions::from_mode(0o700))?;
        }

        Ok(())
    }

    /// Write the daemon PID to the PID file
    pub fn write_pid(&self) -> std::io::Result<()> {
        self.ensure_dirs()?;
        std::fs::write(&self.pid_file, std::process::id().to_string())
    }

    /// Read the daemon PID from the PID file
    pub fn read_pid(&self) -> Option<u32> {
        std::fs::read_to_string(&self.pid_file)
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    /// Remove the PID file
    pub fn remove_pid(&self) -> std::io::Result<()> {
        if self.pid_file.exists() {
            std::fs::remove_file(&self.pid_file)
        } else {
            Ok(())
        }
    }

    /// Check if a process with the stored PID is still running
    #[cfg(unix)]
    pub fn is_daemon_running(&self) -> bool {
        if let Some(pid) = self.read_pid() {
            // Check if process exists by sending signal 0
            unsafe { libc::kill(pid as i32, 0) == 0 }
        } else {
            false
        }
    }

    // TODO(windows): Implement Windows process check
    #[cfg(not(unix))]
    pub fn is_daemon_running(&self) -> bool {
        self.pid_file.exists()
    }
}
