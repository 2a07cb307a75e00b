//! File event sources.
//!
//! [`PollingEventSource`] rescans a folder on an interval and diffs the
//! listing against the previous scan. It reports `created` and `modified`
//! only; a file leaving the folder produces no event.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

use super::{FileEvent, FileEventKind};
use crate::error::Result;

/// Delivers file-change events for one folder.
pub trait FileEventSource: Send + Sync {
    /// Start delivering events for `folder`. Requires a tokio runtime.
    fn subscribe(&self, folder: &Path) -> Result<Subscription>;
}

/// Receiving end of a source subscription. Dropping it cancels the feed.
pub struct Subscription {
    events: mpsc::Receiver<FileEvent>,
    cancel: Arc<Notify>,
}

impl Subscription {
    pub fn new(events: mpsc::Receiver<FileEvent>, cancel: Arc<Notify>) -> Self {
        Self { events, cancel }
    }

    pub async fn next(&mut self) -> Option<FileEvent> {
        self.events.recv().await
    }

    pub fn cancel(&self) {
        self.cancel.notify_one();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Interval-based directory scanner.
#[derive(Debug, Clone)]
pub struct PollingEventSource {
    interval: Duration,
    report_existing: bool,
}

impl PollingEventSource {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            report_existing: false,
        }
    }

    /// Report files already present at subscription time as `created`, so
    /// records dropped while nothing was watching still get handled.
    pub fn report_existing(mut self, yes: bool) -> Self {
        self.report_existing = yes;
        self
    }
}

type Snapshot = HashMap<PathBuf, (Option<SystemTime>, bool)>;

fn scan(folder: &Path) -> Snapshot {
    let mut snapshot = HashMap::new();
    let entries = match std::fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(folder = %folder.display(), error = %e, "Folder scan failed");
            return snapshot;
        }
    };
    for entry in entries.flatten() {
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        snapshot.insert(entry.path(), (meta.modified().ok(), meta.is_dir()));
    }
    snapshot
}

fn diff(previous: &Snapshot, current: &Snapshot) -> Vec<FileEvent> {
    let mut events: Vec<FileEvent> = current
        .iter()
        .filter_map(|(path, (mtime, is_dir))| {
            let kind = match previous.get(path) {
                None => FileEventKind::Created,
                Some((old, _)) if old != mtime => FileEventKind::Modified,
                Some(_) => return None,
            };
            Some(FileEvent {
                path: path.clone(),
                kind,
                is_dir: *is_dir,
            })
        })
        .collect();
    events.sort_by(|a, b| a.path.cmp(&b.path));
    events
}

impl FileEventSource for PollingEventSource {
    fn subscribe(&self, folder: &Path) -> Result<Subscription> {
        let (tx, rx) = mpsc::channel(256);
        let cancel = Arc::new(Notify::new());
        let stop = Arc::clone(&cancel);
        let folder = folder.to_path_buf();
        let interval = self.interval;
        let mut seen = if self.report_existing {
            Snapshot::new()
        } else {
            scan(&folder)
        };

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop.notified() => break,
                }
                let current = scan(&folder);
                for event in diff(&seen, &current) {
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
                seen = current;
            }
            debug!(folder = %folder.display(), "Polling source stopped");
        });

        Ok(Subscription::new(rx, cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_diff_created_and_modified() {
        let t1 = SystemTime::UNIX_EPOCH + Duration::from_secs(1);
        let t2 = SystemTime::UNIX_EPOCH + Duration::from_secs(2);
        let previous = Snapshot::from([
            (PathBuf::from("/f/a.md"), (Some(t1), false)),
            (PathBuf::from("/f/b.md"), (Some(t1), false)),
        ]);
        let current = Snapshot::from([
            (PathBuf::from("/f/a.md"), (Some(t1), false)),
            (PathBuf::from("/f/b.md"), (Some(t2), false)),
            (PathBuf::from("/f/c.md"), (Some(t1), false)),
        ]);
        let events = diff(&previous, &current);
        assert_eq!(
            events,
            vec![
                FileEvent::file("/f/b.md", FileEventKind::Modified),
                FileEvent::file("/f/c.md", FileEventKind::Created),
            ]
        );
    }

    #[tokio::test]
    async fn test_polling_reports_new_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("old.md"), "x").unwrap();

        let source = PollingEventSource::new(Duration::from_millis(20));
        let mut sub = source.subscribe(dir.path()).unwrap();
        std::fs::write(dir.path().join("new.md"), "y").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), sub.next())
            .await
            .expect("event within timeout")
            .expect("channel open");
        assert_eq!(event.kind, FileEventKind::Created);
        assert_eq!(event.path, dir.path().join("new.md"));
    }

    #[tokio::test]
    async fn test_polling_report_existing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("old.md"), "x").unwrap();

        let source = PollingEventSource::new(Duration::from_millis(20)).report_existing(true);
        let mut sub = source.subscribe(dir.path()).unwrap();
        let event = tokio::time::timeout(Duration::from_secs(2), sub.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.path, dir.path().join("old.md"));
    }

    #[tokio::test]
    async fn test_cancel_closes_feed() {
        let dir = TempDir::new().unwrap();
        let source = PollingEventSource::new(Duration::from_millis(10));
        let mut sub = source.subscribe(dir.path()).unwrap();
        sub.cancel();
        let next = tokio::time::timeout(Duration::from_secs(2), sub.next())
            .await
            .expect("feed should close after cancel");
        assert!(next.is_none());
    }
}
