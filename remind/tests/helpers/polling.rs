use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

const INITIAL_DELAY_MS: u64 = 50;
const MAX_DELAY_MS: u64 = 500;

/// Error returned when a file never reaches the expected state.
#[derive(Debug)]
pub struct WaitError {
    path: PathBuf,
    expectation: &'static str,
    attempts: u32,
    waited: Duration,
    last_content: Option<String>,
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Timed out after {} attempts over {:?} waiting for {} to {}. Last content: {}",
            self.attempts,
            self.waited,
            self.path.display(),
            self.expectation,
            self.last_content
                .as_deref()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .unwrap_or("<empty or missing>"),
        )
    }
}

impl std::error::Error for WaitError {}

/// Poll `path` with exponential backoff until `check` accepts its contents.
///
/// `check` receives `None` while the file does not exist.
fn wait_until<F>(
    path: &Path,
    expectation: &'static str,
    timeout: Duration,
    check: F,
) -> Result<Option<String>, WaitError>
where
    F: Fn(Option<&str>) -> bool,
{
    let start = Instant::now();
    let mut delay = Duration::from_millis(INITIAL_DELAY_MS);
    let mut attempts = 0;
    let mut last_content = None;

    loop {
        attempts += 1;
        let content = match fs::read_to_string(path) {
            Ok(content) => Some(content),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(_) => last_content.clone(),
        };

        if check(content.as_deref()) {
            return Ok(content);
        }
        last_content = content;

        let remaining = timeout.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            return Err(WaitError {
                path: path.to_path_buf(),
                expectation,
                attempts,
                waited: start.elapsed(),
                last_content,
            });
        }

        thread::sleep(delay.min(remaining));
        delay = (delay * 2).min(Duration::from_millis(MAX_DELAY_MS));
    }
}

/// Wait until the file exists and its content satisfies `predicate`.
pub fn wait_for_file_content<P, F>(
    path: P,
    predicate: F,
    timeout: Duration,
) -> Result<String, WaitError>
where
    P: AsRef<Path>,
    F: Fn(&str) -> bool,
{
    wait_until(path.as_ref(), "match", timeout, |content| {
        content.is_some_and(&predicate)
    })
    .map(|content| content.unwrap_or_default())
}

/// Wait until the file no longer exists.
pub fn wait_for_file_removed<P: AsRef<Path>>(path: P, timeout: Duration) -> Result<(), WaitError> {
    wait_until(path.as_ref(), "be removed", timeout, |content| content.is_none()).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn wait_for_file_content_returns_existing_content() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("value.txt");
        fs::write(&file, "ready").unwrap();

        let content =
            wait_for_file_content(&file, |text| text.contains("ready"), Duration::from_secs(1))
                .expect("should read file immediately");
        assert_eq!(content, "ready");
    }

    #[test]
    fn wait_for_file_content_times_out_with_context() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("missing.txt");

        let err = wait_for_file_content(
            &file,
            |text| text.contains("anything"),
            Duration::from_millis(1),
        )
        .expect_err("should time out");
        assert!(err.to_string().contains("missing.txt"));
    }

    #[test]
    fn wait_for_file_removed_accepts_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        wait_for_file_removed(temp_dir.path().join("gone"), Duration::from_millis(1))
            .expect("missing file counts as removed");
    }
}
