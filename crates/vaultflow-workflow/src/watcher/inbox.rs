//! Inbox watcher: hands new tasks over to Needs_Action.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};
use vaultflow_core::{Folder, VaultLayout};

use super::{FileEventKind, FileHandler, WatcherConfig};
use crate::error::Result;
use crate::record::{move_record, RecordStore};
use crate::types::{keys, TaskStatus};

pub struct InboxHandler {
    layout: VaultLayout,
    store: RecordStore,
}

impl InboxHandler {
    pub fn new(layout: VaultLayout, store: RecordStore) -> Self {
        Self { layout, store }
    }

    pub fn config(layout: &VaultLayout) -> WatcherConfig {
        WatcherConfig::new("inbox_watcher", layout.folder(Folder::Inbox))
            .with_event_types(vec![FileEventKind::Created])
    }
}

#[async_trait]
impl FileHandler for InboxHandler {
    async fn process_file(&self, path: &Path, _kind: FileEventKind) -> Result<()> {
        // Already moved by an earlier event.
        if !path.exists() {
            return Ok(());
        }

        let record = self.store.read(path)?;
        let status = record
            .metadata
            .get_str(keys::STATUS)
            .and_then(|s| s.parse::<TaskStatus>().ok());
        if status == Some(TaskStatus::Failed) {
            debug!(path = %path.display(), "Failed task left in Inbox for review");
            return Ok(());
        }

        let dest = move_record(&self.layout, path, Folder::NeedsAction)?;
        info!(
            from = %path.display(),
            to = %dest.display(),
            "Task moved to Needs_Action"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Metadata, Record};
    use tempfile::TempDir;

    fn setup() -> (TempDir, VaultLayout, InboxHandler) {
        let dir = TempDir::new().unwrap();
        let layout = VaultLayout::new(dir.path());
        layout.ensure_all().unwrap();
        let handler = InboxHandler::new(layout.clone(), RecordStore::default());
        (dir, layout, handler)
    }

    #[tokio::test]
    async fn test_moves_new_task() {
        let (_dir, layout, handler) = setup();
        let path = layout.file(Folder::Inbox, "t-1.md");
        RecordStore::default()
            .write(&path, &Record::new(Metadata::new().with("status", "new"), "x"))
            .unwrap();

        handler.process_file(&path, FileEventKind::Created).await.unwrap();
        assert!(!path.exists());
        assert!(layout.file(Folder::NeedsAction, "t-1.md").exists());
    }

    #[tokio::test]
    async fn test_moves_plain_markdown_drop() {
        let (_dir, layout, handler) = setup();
        let path = layout.file(Folder::Inbox, "note.md");
        std::fs::write(&path, "Read the quarterly file").unwrap();

        handler.process_file(&path, FileEventKind::Created).await.unwrap();
        assert!(layout.file(Folder::NeedsAction, "note.md").exists());
    }

    #[tokio::test]
    async fn test_skips_failed_task() {
        let (_dir, layout, handler) = setup();
        let path = layout.file(Folder::Inbox, "t-2.md");
        RecordStore::default()
            .write(&path, &Record::new(Metadata::new().with("status", "failed"), "x"))
            .unwrap();

        handler.process_file(&path, FileEventKind::Created).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_noop() {
        let (_dir, layout, handler) = setup();
        let path = layout.file(Folder::Inbox, "gone.md");
        assert!(handler.process_file(&path, FileEventKind::Created).await.is_ok());
    }
}
