//! Single-instance guard for long-running watcher processes.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::info;

use crate::error::{Result, WorkflowError};

/// Exclusive lock on a pid file, held for the lifetime of the value.
///
/// The OS drops the lock when the process exits, so a crashed instance
/// never leaves a stale guard behind. The file itself stays on disk; the
/// next holder locks the same inode and rewrites the pid.
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(WorkflowError::AlreadyRunning(path.to_path_buf()));
        }

        file.set_len(0)?;
        write!(file, "{}", std::process::id())?;
        file.sync_all()?;
        info!(lock = %path.display(), "Instance lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
