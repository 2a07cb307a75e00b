//! File-backed records with advisory locking.
//!
//! Every read and every write takes an exclusive advisory lock on the open
//! handle for the duration of that single operation. A read/modify/write
//! is therefore two lock acquisitions, and two concurrent
//! [`RecordStore::update_metadata`] callers on the same file can still
//! overwrite each other (last writer wins).

pub mod frontmatter;
pub mod transition;

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::debug;
use vaultflow_core::config::RecordStoreSettings;

use crate::error::{Result, WorkflowError};
pub use frontmatter::Metadata;
pub use transition::{move_record, validate_transition};

/// Metadata header plus free-text body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub metadata: Metadata,
    pub body: String,
}

impl Record {
    pub fn new(metadata: Metadata, body: impl Into<String>) -> Self {
        Self {
            metadata,
            body: body.into(),
        }
    }
}

/// Reads and writes record files.
#[derive(Debug, Clone)]
pub struct RecordStore {
    lock_timeout: Duration,
    lock_poll: Duration,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::from_settings(&RecordStoreSettings::default())
    }
}

impl RecordStore {
    pub fn new(lock_timeout: Duration, lock_poll: Duration) -> Self {
        Self {
            lock_timeout,
            lock_poll,
        }
    }

    pub fn from_settings(settings: &RecordStoreSettings) -> Self {
        Self::new(
            Duration::from_millis(settings.lock_timeout_ms),
            Duration::from_millis(settings.lock_poll_ms),
        )
    }

    /// Read a record. A missing file is [`WorkflowError::NotFound`].
    pub fn read(&self, path: &Path) -> Result<Record> {
        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(WorkflowError::NotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        self.lock(&file, path)?;
        let mut content = String::new();
        let read = file.read_to_string(&mut content);
        let _ = FileExt::unlock(&file);
        read?;

        let (metadata, body) =
            frontmatter::parse(&content).map_err(|reason| WorkflowError::Frontmatter {
                path: path.to_path_buf(),
                reason,
            })?;
        Ok(Record { metadata, body })
    }

    /// Write the whole record, creating parent directories as needed.
    pub fn write(&self, path: &Path, record: &Record) -> Result<()> {
        let content = frontmatter::render(&record.metadata, &record.body).map_err(|reason| {
            WorkflowError::Frontmatter {
                path: path.to_path_buf(),
                reason,
            }
        })?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        self.lock(&file, path)?;
        let written = file
            .set_len(0)
            .and_then(|_| file.write_all(content.as_bytes()))
            .and_then(|_| file.sync_all());
        let _ = FileExt::unlock(&file);
        written?;

        debug!(path = %path.display(), "Record written");
        Ok(())
    }

    /// Merge `updates` into the record's metadata and write it back.
    ///
    /// Returns the record as written.
    pub fn update_metadata(&self, path: &Path, updates: Metadata) -> Result<Record> {
        let mut record = self.read(path)?;
        record.metadata.merge(updates);
        self.write(path, &record)?;
        Ok(record)
    }

    fn lock(&self, file: &File, path: &Path) -> Result<()> {
        let started = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == ErrorKind::WouldBlock || is_contended(&e) => {
                    if started.elapsed() >= self.lock_timeout {
                        return Err(WorkflowError::LockTimeout {
                            path: path.to_path_buf(),
                            timeout_ms: self.lock_timeout.as_millis() as u64,
                        });
                    }
                    std::thread::sleep(self.lock_poll);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// `*.md` files directly inside `dir`, sorted by file name.
///
/// A missing directory yields an empty list.
pub fn list_records(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "md") {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

/// File stem as an owned string, used as the record id fallback.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
