use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultflowError};

// =============================================================================
// Folders
// =============================================================================

/// The well-known vault folders. A record's folder is its lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Folder {
    Inbox,
    NeedsAction,
    Plans,
    PendingApproval,
    Approved,
    Rejected,
    Done,
}

impl Folder {
    pub const ALL: [Folder; 7] = [
        Folder::Inbox,
        Folder::NeedsAction,
        Folder::Plans,
        Folder::PendingApproval,
        Folder::Approved,
        Folder::Rejected,
        Folder::Done,
    ];

    /// Directory name on disk.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Folder::Inbox => "Inbox",
            Folder::NeedsAction => "Needs_Action",
            Folder::Plans => "Plans",
            Folder::PendingApproval => "Pending_Approval",
            Folder::Approved => "Approved",
            Folder::Rejected => "Rejected",
            Folder::Done => "Done",
        }
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl std::str::FromStr for Folder {
    type Err = VaultflowError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Folder::ALL
            .into_iter()
            .find(|f| f.dir_name() == s)
            .ok_or_else(|| VaultflowError::UnknownFolder(s.to_string()))
    }
}

/// Resolves folder paths under a vault root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultLayout {
    root: PathBuf,
}

impl VaultLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn folder(&self, folder: Folder) -> PathBuf {
        self.root.join(folder.dir_name())
    }

    /// Path of `file_name` inside `folder`.
    pub fn file(&self, folder: Folder, file_name: &str) -> PathBuf {
        self.folder(folder).join(file_name)
    }

    /// Create every folder that does not exist yet.
    pub fn ensure_all(&self) -> Result<()> {
        for folder in Folder::ALL {
            std::fs::create_dir_all(self.folder(folder))?;
        }
        Ok(())
    }

    /// Which well-known folder directly contains `path`, if any.
    pub fn folder_of(&self, path: &Path) -> Option<Folder> {
        let parent = path.parent()?;
        Folder::ALL
            .into_iter()
            .find(|f| parent == self.folder(*f).as_path())
    }
}

// =============================================================================
// Time helpers
// =============================================================================

/// Current local time as an RFC 3339 string, the format stored in record
/// metadata.
pub fn iso_now() -> String {
    Local::now().to_rfc3339()
}

/// Compact sortable stamp used in generated ids and collision suffixes.
pub fn compact_stamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y%m%dT%H%M%S").to_string()
}
