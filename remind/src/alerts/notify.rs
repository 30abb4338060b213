//! Notification backends for fired alerts.
//!
//! The daemon only depends on the [`Notifier`] trait. Backends are best
//! effort: spawned helpers are reaped on a background thread instead of
//! blocking the poll, and a failure is reported to the caller (which logs
//! it).

use std::io::{self, Write};
use std::process::{Command, Stdio};

use crate::alerts::config::NotifierKind;
use crate::alerts::error::NotifyError;

/// Title shown on desktop and terminal notifications
pub const NOTIFICATION_TITLE: &str = "remind";

/// Something that can show a message to the user
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str) -> Result<(), NotifyError>;
}

/// Build the backend selected in configuration
pub fn from_kind(kind: NotifierKind) -> Box<dyn Notifier> {
    match kind {
        NotifierKind::Desktop => Box::new(DesktopNotifier::default()),
        NotifierKind::Terminal => Box::new(TerminalNotifier),
        NotifierKind::Log => Box::new(LogNotifier),
    }
}

/// Desktop notification via `notify-send` (Linux) or `osascript` (macOS)
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    /// Also play the platform alert sound
    pub sound: bool,
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self { sound: true }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, message: &str) -> Result<(), NotifyError> {
        let message = truncate_message(message, 200);
        show_desktop_notification(NOTIFICATION_TITLE, &message)?;
        if self.sound {
            play_alert_sound();
        }
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn show_desktop_notification(title: &str, message: &str) -> Result<(), NotifyError> {
    spawn_detached(
        "notify-send",
        Command::new("notify-send").args([
            "--app-name",
            NOTIFICATION_TITLE,
            "--urgency",
            "normal",
            title,
            message,
        ]),
    )
}

#[cfg(target_os = "macos")]
fn show_desktop_notification(title: &str, message: &str) -> Result<(), NotifyError> {
    let script = format!(
        "display notification \"{}\" with title \"{}\"",
        escape_applescript(message),
        escape_applescript(title)
    );
    spawn_detached("osascript", Command::new("osascript").arg("-e").arg(script))
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn show_desktop_notification(_title: &str, _message: &str) -> Result<(), NotifyError> {
    Err(NotifyError::Unsupported)
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
fn spawn_detached(program: &'static str, command: &mut Command) -> Result<(), NotifyError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|child| reap(program, child))
        .map_err(|source| NotifyError::Spawn { program, source })
}

/// Wait on `child` from a background thread so it never lingers as a zombie
#[cfg(any(target_os = "linux", target_os = "macos"))]
fn reap(program: &'static str, mut child: std::process::Child) {
    let spawned = std::thread::Builder::new()
        .name(format!("reap-{}", program))
        .spawn(move || {
            if let Err(e) = child.wait() {
                tracing::debug!(program, error = %e, "failed to wait on helper process");
            }
        });
    if let Err(e) = spawned {
        tracing::warn!(program, error = %e, "cannot reap helper process");
    }
}

#[cfg(any(target_os = "macos", test))]
fn escape_applescript(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Plays the platform alert sound in a detached process; errors are ignored
fn play_alert_sound() {
    #[cfg(target_os = "macos")]
    {
        if let Ok(child) = Command::new("afplay")
            .arg("/System/Library/Sounds/Glass.aiff")
            .arg("-v")
            .arg("0.5")
            .spawn()
        {
            reap("afplay", child);
        }
    }

    #[cfg(target_os = "linux")]
    {
        let sound_file = [
            "/usr/share/sounds/freedesktop/stereo/alarm-clock-elapsed.oga",
            "/usr/share/sounds/freedesktop/stereo/complete.oga",
        ]
        .into_iter()
        .find(|path| std::path::Path::new(path).exists());

        if let Some(path) = sound_file {
            // Try paplay (PulseAudio) first, then aplay (ALSA)
            match Command::new("paplay").arg(path).spawn() {
                Ok(child) => reap("paplay", child),
                Err(_) => {
                    if let Ok(child) = Command::new("aplay").arg("-q").arg(path).spawn() {
                        reap("aplay", child);
                    }
                }
            }
        }
    }
}

/// Terminal bell plus desktop-notification escape codes on stdout
///
/// - BEL (`\x07`) - universal terminal bell
/// - OSC 9 (iTerm2)
/// - OSC 777 (Konsole/VTE/Gnome Terminal)
/// - OSC 99 (kitty)
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, message: &str) -> Result<(), NotifyError> {
        let mut stdout = io::stdout();
        write_terminal_notification(&mut stdout, NOTIFICATION_TITLE, message)?;
        Ok(())
    }
}

fn write_terminal_notification<W: Write>(out: &mut W, title: &str, message: &str) -> io::Result<()> {
    let title = escape_osc(title);
    let message = escape_osc(message);

    out.write_all(b"\x07")?;
    write!(out, "\x1b]9;{}\x07", message)?;
    write!(out, "\x1b]777;notify;{};{}\x07", title, message)?;
    write!(
        out,
        "\x1b]99;i=1:d=0:p=title;{}\x1b\\\x1b]99;i=1:d=0:p=body;{}\x1b\\",
        title, message
    )?;
    // Plain line for terminals that ignore the escapes
    writeln!(out, "{}: {}", title, message)?;
    out.flush()
}

/// Escapes special characters for OSC sequences
fn escape_osc(s: &str) -> String {
    // OSC sequences are terminated by BEL or ST
    s.replace('\x07', "")
        .replace('\x1b', "")
        .replace('\n', " ")
        .replace('\r', "")
}

/// Writes the alert to the log only
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) -> Result<(), NotifyError> {
        tracing::info!(target: "remind::alert", "{}", message);
        Ok(())
    }
}

/// Truncates on a char boundary, appending "..." when shortened
fn truncate_message(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        return message.to_string();
    }
    let kept: String = message.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}
