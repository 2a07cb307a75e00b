//! Pending-approval watcher: tells the human a plan awaits review.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::warn;
use vaultflow_core::{Folder, VaultLayout};

use super::{FileEventKind, FileHandler, WatcherConfig};
use crate::error::Result;
use crate::record::{file_stem, RecordStore};
use crate::types::keys;

pub struct PendingApprovalHandler {
    store: RecordStore,
    notified: AtomicU64,
}

impl PendingApprovalHandler {
    pub fn new(store: RecordStore) -> Self {
        Self {
            store,
            notified: AtomicU64::new(0),
        }
    }

    pub fn config(layout: &VaultLayout) -> WatcherConfig {
        WatcherConfig::new("pending_approval_watcher", layout.folder(Folder::PendingApproval))
            .with_event_types(vec![FileEventKind::Created])
    }

    /// Approval requests announced so far.
    pub fn notified_count(&self) -> u64 {
        self.notified.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileHandler for PendingApprovalHandler {
    async fn process_file(&self, path: &Path, _kind: FileEventKind) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }

        let record = self.store.read(path)?;
        let meta = &record.metadata;
        let plan_id = meta.get_str(keys::ID).unwrap_or_else(|| file_stem(path));
        let objective = meta
            .get_str(keys::OBJECTIVE)
            .unwrap_or_else(|| "No objective specified".to_string());

        if !meta.get_bool(keys::REQUIRES_APPROVAL).unwrap_or(false) {
            warn!(
                plan = %plan_id,
                "Plan in Pending_Approval but requires_approval=false. This may be a routing error."
            );
        }

        warn!(
            plan = %plan_id,
            objective = %objective,
            file = %path.display(),
            "APPROVAL REQUIRED: review the plan and move it to Approved/ or Rejected/"
        );
        self.notified.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Metadata, Record};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_announces_plan() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p.md");
        let store = RecordStore::default();
        store
            .write(
                &path,
                &Record::new(
                    Metadata::new()
                        .with("id", "p")
                        .with("requires_approval", true)
                        .with("objective", "Send outage email"),
                    "body",
                ),
            )
            .unwrap();

        let handler = PendingApprovalHandler::new(store);
        handler.process_file(&path, FileEventKind::Created).await.unwrap();
        assert_eq!(handler.notified_count(), 1);
        // Read-only: the record is untouched.
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_routing_error_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p.md");
        let store = RecordStore::default();
        store
            .write(
                &path,
                &Record::new(Metadata::new().with("requires_approval", false), "body"),
            )
            .unwrap();

        let handler = PendingApprovalHandler::new(store);
        assert!(handler.process_file(&path, FileEventKind::Created).await.is_ok());
        assert_eq!(handler.notified_count(), 1);
    }
}
