//! Approved watcher: stamps human approval on plans moved into Approved.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};
use vaultflow_core::{iso_now, Folder, VaultLayout};

use super::{FileEventKind, FileHandler, WatcherConfig};
use crate::error::Result;
use crate::record::{file_stem, Metadata, RecordStore};
use crate::types::{keys, ExecutionStatus};

pub struct ApprovedHandler {
    store: RecordStore,
}

impl ApprovedHandler {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    pub fn config(layout: &VaultLayout) -> WatcherConfig {
        WatcherConfig::new("approved_watcher", layout.folder(Folder::Approved))
            .with_event_types(vec![FileEventKind::Created])
            .with_debounce(Duration::from_secs(2))
    }
}

#[async_trait]
impl FileHandler for ApprovedHandler {
    async fn process_file(&self, path: &Path, _kind: FileEventKind) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }

        let record = self.store.read(path)?;
        let plan_id = record
            .metadata
            .get_str(keys::ID)
            .unwrap_or_else(|| file_stem(path));

        if record.metadata.is_set(keys::APPROVED_AT) {
            debug!(plan = %plan_id, "Plan already has approval timestamp");
            return Ok(());
        }

        let updates = Metadata::new()
            .with(keys::APPROVED_AT, iso_now())
            .with(keys::APPROVED_BY, "human")
            .with(keys::EXECUTION_STATUS, ExecutionStatus::Pending.to_string());
        self.store.update_metadata(path, updates)?;

        info!(
            plan = %plan_id,
            file = %path.display(),
            "Plan approved and waiting for the reasoning loop to execute"
        );
        Ok(())
    }
}
