//! Inbound mail intake: turns new messages into Inbox tasks.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use vaultflow_core::{iso_now, Folder, VaultLayout};

use crate::capability::{InboundMailSource, InboundMessage};
use crate::error::Result;
use crate::record::{list_records, Metadata, Record, RecordStore};
use crate::types::{keys, TaskStatus};

/// Polls an [`InboundMailSource`] and writes one task per message.
pub struct MailIntake {
    source: Arc<dyn InboundMailSource>,
    layout: VaultLayout,
    store: RecordStore,
    interval: Duration,
    shutdown: Arc<Notify>,
}

impl MailIntake {
    pub fn new(
        source: Arc<dyn InboundMailSource>,
        layout: VaultLayout,
        store: RecordStore,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            layout,
            store,
            interval,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Fetch once and create tasks. Returns the number of tasks written.
    pub async fn poll_once(&self) -> Result<usize> {
        let messages = self.source.fetch_new().await?;
        if messages.is_empty() {
            debug!("No new emails found");
            return Ok(0);
        }

        let mut created = 0;
        for message in &messages {
            if self.already_imported(&message.id)? {
                debug!(uid = %message.id, "Email already imported, skipping");
                continue;
            }
            match self.create_task(message) {
                Ok(path) => {
                    created += 1;
                    info!(
                        subject = %message.subject,
                        from = %message.from,
                        file = %path.display(),
                        "Created task from email"
                    );
                }
                Err(e) => warn!(uid = %message.id, error = %e, "Failed to create task from email"),
            }
        }
        Ok(created)
    }

    /// Poll on the configured interval until [`MailIntake::shutdown`].
    pub async fn run(&self) {
        info!(interval_secs = self.interval.as_secs(), "Mail intake started");
        loop {
            match self.poll_once().await {
                Ok(n) if n > 0 => info!(count = n, "Processed new emails"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Mail poll failed"),
            }
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.shutdown.notified() => return,
            }
        }
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    fn already_imported(&self, uid: &str) -> Result<bool> {
        let suffix = format!("-email-{}.md", uid);
        for folder in [Folder::Inbox, Folder::NeedsAction] {
            let found = list_records(&self.layout.folder(folder))?
                .iter()
                .filter_map(|p| p.file_name())
                .any(|name| name.to_string_lossy().ends_with(&suffix));
            if found {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn create_task(&self, message: &InboundMessage) -> Result<PathBuf> {
        let task_id = format!(
            "{}-email-{}",
            Local::now().format("%Y%m%d-%H%M%S"),
            message.id
        );
        let now = iso_now();
        let metadata = Metadata::new()
            .with(keys::ID, task_id.as_str())
            .with(keys::TITLE, format!("Email: {}", message.subject))
            .with(keys::STATUS, TaskStatus::New.to_string())
            .with(keys::CREATED_AT, now.as_str())
            .with(keys::UPDATED_AT, now.as_str())
            .with(keys::PRIORITY, "P3")
            .with(keys::SOURCE, "email")
            .with("email_source", true)
            .with("original_email_id", message.id.as_str());

        let body = format!(
            "# Email: {subject}\n\n\
             **From**: {from}\n\
             **Date**: {date}\n\
             **Subject**: {subject}\n\n\
             ## Email Content\n\n\
             {body}\n\n\
             ---\n\n\
             *This task was automatically created from an incoming email.*\n",
            subject = message.subject,
            from = message.from,
            date = message.date,
            body = message.body.trim(),
        );

        let path = self.layout.file(Folder::Inbox, &format!("{}.md", task_id));
        self.store.write(&path, &Record::new(metadata, body))?;
        Ok(path)
    }
}
