// Persistence for the alert list
// Alerts live in a plain text file, one record per line. Rewrites go through
// a temp file + rename, and every read-modify-write holds an exclusive lock on
// a sibling `.lock` file (the data file itself is replaced on each rewrite, so
// it cannot carry the lock).

use crate::alerts::error::StoreError;
use crate::alerts::record::{self, AlertId, AlertMode, AlertRecord};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Handle to an alert file on disk
#[derive(Debug, Clone)]
pub struct AlertStore {
    path: PathBuf,
}

impl AlertStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the alert file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the lock file guarding rewrites
    pub fn lock_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("alerts");
        self.path.with_file_name(format!(".{}.lock", name))
    }

    fn ensure_parent(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::io("failed to create store directory", parent, e))?;
        }
        Ok(())
    }

    /// Acquire the store lock; released when the returned file is dropped
    fn lock_exclusive(&self) -> Result<File, StoreError> {
        self.ensure_parent()?;
        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| StoreError::io("failed to open lock file", &lock_path, e))?;
        file.lock_exclusive()
            .map_err(|e| StoreError::io("failed to lock", &lock_path, e))?;
        Ok(file)
    }

    /// Take a shared lock for reading if the lock file can be created
    fn lock_shared(&self) -> Option<File> {
        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .ok()?;
        match FileExt::lock_shared(&file) {
            Ok(()) => Some(file),
            Err(e) => {
                tracing::debug!(path = %lock_path.display(), error = %e, "reading without lock");
                None
            }
        }
    }

    /// Load every decodable record, in file order
    ///
    /// A missing file is an empty store. Lines that fail to decode are
    /// skipped with a warning so one corrupt line never hides the rest.
    pub fn load(&self) -> Result<Vec<AlertRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let _guard = self.lock_shared();
        self.read_records()
    }

    /// Same as [`load`](Self::load); named for display callers
    pub fn list(&self) -> Result<Vec<AlertRecord>, StoreError> {
        self.load()
    }

    /// Find a single record by id
    pub fn get(&self, id: AlertId) -> Result<Option<AlertRecord>, StoreError> {
        Ok(self.load()?.into_iter().find(|r| r.id == id))
    }

    /// Next free id: 1 for an empty or unreadable store, otherwise max + 1
    pub fn next_id(&self) -> AlertId {
        match self.load() {
            Ok(records) => next_id_for(&records),
            Err(e) => {
                tracing::warn!(error = %e, "store unreadable while allocating id");
                1
            }
        }
    }

    fn read_records(&self) -> Result<Vec<AlertRecord>, StoreError> {
        Ok(self
            .read_lines()?
            .into_iter()
            .filter_map(|line| line.record)
            .collect())
    }

    /// Every line of the file with its original bytes
    ///
    /// Lines that do not decode (or are not valid UTF-8) keep their bytes so
    /// a rewrite puts them back exactly as they were.
    fn read_lines(&self) -> Result<Vec<StoredLine>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io("failed to read", &self.path, e)),
        };
        let body = bytes.strip_suffix(b"\n").unwrap_or(&bytes[..]);
        if body.is_empty() {
            return Ok(Vec::new());
        }

        let mut lines = Vec::new();
        for (idx, raw) in body.split(|b| *b == b'\n').enumerate() {
            let text = String::from_utf8_lossy(raw);
            let record = if text.trim().is_empty() {
                None
            } else {
                match record::decode(&text) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        tracing::warn!(
                            path = %self.path.display(),
                            line = idx + 1,
                            error = %e,
                            "skipping malformed alert line"
                        );
                        None
                    }
                }
            };
            lines.push(StoredLine {
                raw: raw.to_vec(),
                record,
            });
        }
        Ok(lines)
    }

    /// Append one record to the end of the file
    pub fn append(&self, record: &AlertRecord) -> Result<(), StoreError> {
        let line = record::encode(record)?;
        let _lock = self.lock_exclusive()?;

        if self.read_records()?.iter().any(|r| r.id == record.id) {
            return Err(StoreError::DuplicateId(record.id));
        }
        self.append_line(&line)
    }

    /// Allocate an id (or use `explicit_id`) and append atomically
    ///
    /// Id allocation and the write happen under one lock, so two writers
    /// cannot hand out the same id.
    pub fn insert(
        &self,
        mode: AlertMode,
        when: &str,
        message: &str,
        explicit_id: Option<AlertId>,
    ) -> Result<AlertRecord, StoreError> {
        let _lock = self.lock_exclusive()?;
        let existing = self.read_records()?;

        let id = match explicit_id {
            Some(id) if existing.iter().any(|r| r.id == id) => {
                return Err(StoreError::DuplicateId(id))
            }
            Some(id) => id,
            None => next_id_for(&existing),
        };

        let record = AlertRecord::new(id, mode, when, message);
        let line = record::encode(&record)?;
        self.append_line(&line)?;
        Ok(record)
    }

    fn append_line(&self, line: &str) -> Result<(), StoreError> {
        // Hand-edited files may lack a final newline
        let needs_newline = fs::read(&self.path)
            .map(|bytes| bytes.last().is_some_and(|b| *b != b'\n'))
            .unwrap_or(false);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io("failed to open for append", &self.path, e))?;

        let mut buf = String::with_capacity(line.len() + 2);
        if needs_newline {
            buf.push('\n');
        }
        buf.push_str(line);
        buf.push('\n');

        file.write_all(buf.as_bytes())
            .map_err(|e| StoreError::io("failed to append to", &self.path, e))
    }

    /// Remove every record with `id`; returns whether one was found
    pub fn remove_by_id(&self, id: AlertId) -> Result<bool, StoreError> {
        Ok(self.remove_many(&[id])? > 0)
    }

    /// Remove all records whose id is in `ids` with a single rewrite
    pub fn remove_many(&self, ids: &[AlertId]) -> Result<usize, StoreError> {
        if ids.is_empty() || !self.path.exists() {
            return Ok(0);
        }
        let _lock = self.lock_exclusive()?;
        let mut lines = self.read_lines()?;
        let before = lines.len();
        lines.retain(|line| !line.record.as_ref().is_some_and(|r| ids.contains(&r.id)));
        let removed = before - lines.len();

        if removed > 0 {
            self.rewrite(&lines)?;
        }
        Ok(removed)
    }

    /// Replace the record with `id` in place, keeping its position
    pub fn replace_by_id(&self, id: AlertId, replacement: AlertRecord) -> Result<bool, StoreError> {
        let line = record::encode(&replacement)?;
        let _lock = self.lock_exclusive()?;
        let lines = self.read_lines()?;

        let mut existing = lines.iter().filter_map(|l| l.record.as_ref());
        if replacement.id != id && existing.any(|r| r.id == replacement.id) {
            return Err(StoreError::DuplicateId(replacement.id));
        }

        // Drop any later duplicates of the replaced id
        let mut found = false;
        let updated: Vec<StoredLine> = lines
            .into_iter()
            .filter_map(|l| {
                if !l.record.as_ref().is_some_and(|r| r.id == id) {
                    Some(l)
                } else if found {
                    None
                } else {
                    found = true;
                    Some(StoredLine {
                        raw: line.clone().into_bytes(),
                        record: Some(replacement.clone()),
                    })
                }
            })
            .collect();

        if !found {
            return Ok(false);
        }

        self.rewrite(&updated)?;
        Ok(true)
    }

    /// Atomically replace the file contents with `lines`
    fn rewrite(&self, lines: &[StoredLine]) -> Result<(), StoreError> {
        let mut contents = Vec::new();
        for line in lines {
            contents.extend_from_slice(&line.raw);
            contents.push(b'\n');
        }
        atomic_write(&self.path, &contents)
    }
}

/// A line as read from disk, with the record it decoded to (if any)
struct StoredLine {
    raw: Vec<u8>,
    record: Option<AlertRecord>,
}

fn next_id_for(records: &[AlertRecord]) -> AlertId {
    records.iter().map(|r| r.id).max().unwrap_or(0) + 1
}

/// Atomically save data to a file using write-to-temp + fsync + rename
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    // Temp file in the same directory so the rename stays on one filesystem
    let temp_path = parent.join(format!(
        ".{}.tmp.{}",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown"),
        std::process::id()
    ));

    let write = || -> std::io::Result<()> {
        let mut file = File::create(&temp_path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(contents)?;
        file.sync_all()
    };

    if let Err(e) = write() {
        let _ = fs::remove_file(&temp_path);
        return Err(StoreError::io("failed to write temp file", &temp_path, e));
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        StoreError::io("failed to replace", path, e)
    })
}
