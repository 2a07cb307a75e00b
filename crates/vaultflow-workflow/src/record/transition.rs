//! Folder state machine with validated moves.
//!
//! A record's folder is its lifecycle state:
//! Inbox -> Needs_Action -> (Plans | Pending_Approval) -> Approved -> Done
//! Pending_Approval -> Rejected

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};
use vaultflow_core::{compact_stamp, Folder, VaultLayout};

use crate::error::{Result, WorkflowError};

/// Validate that a folder move is allowed.
///
/// Valid transitions:
/// - Inbox -> Needs_Action
/// - Needs_Action -> Inbox (requeue after a processing error)
/// - Plans -> Approved
/// - Pending_Approval -> Approved
/// - Pending_Approval -> Rejected
/// - Approved -> Done
/// - Approved -> Pending_Approval (execution failed, back to human review)
pub fn validate_transition(from: Folder, to: Folder) -> Result<()> {
    let valid = matches!(
        (from, to),
        (Folder::Inbox, Folder::NeedsAction)
            | (Folder::NeedsAction, Folder::Inbox)
            | (Folder::Plans, Folder::Approved)
            | (Folder::PendingApproval, Folder::Approved)
            | (Folder::PendingApproval, Folder::Rejected)
            | (Folder::Approved, Folder::Done)
            | (Folder::Approved, Folder::PendingApproval)
    );

    if valid {
        Ok(())
    } else {
        Err(WorkflowError::InvalidTransition(from, to))
    }
}

/// Move a record file into `to`, returning its new path.
///
/// Copies then deletes the source. When the destination name is already
/// taken by a byte-identical file (an earlier move that died before the
/// delete), only the source is removed. A different file under the same
/// name makes the moved record take a `-YYYYmmddTHHMMSS` suffix.
pub fn move_record(layout: &VaultLayout, path: &Path, to: Folder) -> Result<PathBuf> {
    let from = layout
        .folder_of(path)
        .ok_or_else(|| WorkflowError::OutsideVault(path.to_path_buf()))?;
    validate_transition(from, to)?;

    if !path.exists() {
        return Err(WorkflowError::NotFound(path.to_path_buf()));
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| WorkflowError::OutsideVault(path.to_path_buf()))?;

    fs::create_dir_all(layout.folder(to))?;
    let mut dest = layout.file(to, &file_name);

    if dest.exists() {
        if fs::read(&dest)? == fs::read(path)? {
            debug!(path = %path.display(), "Destination already holds this record, removing source");
            fs::remove_file(path)?;
            return Ok(dest);
        }
        dest = collision_free(layout, to, path);
        warn!(
            from = %path.display(),
            to = %dest.display(),
            "Name collision on move, using suffixed name"
        );
    }

    fs::copy(path, &dest)?;
    fs::remove_file(path)?;
    debug!(from = %from, to = %to, file = %file_name, "Record moved");
    Ok(dest)
}

fn collision_free(layout: &VaultLayout, to: Folder, path: &Path) -> PathBuf {
    let stem = crate::record::file_stem(path);
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let stamp = compact_stamp(Utc::now());

    let mut candidate = layout.file(to, &format!("{}-{}{}", stem, stamp, ext));
    let mut n = 1;
    while candidate.exists() {
        candidate = layout.file(to, &format!("{}-{}-{}{}", stem, stamp, n, ext));
        n += 1;
    }
    candidate
}
