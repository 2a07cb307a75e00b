//! Debounced folder watchers.
//!
//! A [`Watcher`] filters raw file events (directories, unsubscribed kinds,
//! non-matching names, repeats within the debounce window) and hands the
//! rest to its [`FileHandler`]. Consecutive handler failures trip an
//! advisory `circuit_open` status that blocks restarts until
//! [`Watcher::reset_circuit_breaker`] is called.

pub mod approved;
pub mod inbox;
pub mod instance_lock;
pub mod mail;
pub mod pending_approval;
pub mod source;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use vaultflow_core::config::WatcherSettings;

use crate::error::{Result, WorkflowError};

pub use approved::ApprovedHandler;
pub use inbox::InboxHandler;
pub use instance_lock::InstanceLock;
pub use mail::MailIntake;
pub use pending_approval::PendingApprovalHandler;
pub use source::{FileEventSource, PollingEventSource, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileEventKind {
    Created,
    Modified,
    Moved,
}

impl fmt::Display for FileEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileEventKind::Created => write!(f, "created"),
            FileEventKind::Modified => write!(f, "modified"),
            FileEventKind::Moved => write!(f, "moved"),
        }
    }
}

/// A raw event as delivered by a [`FileEventSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub kind: FileEventKind,
    pub is_dir: bool,
}

impl FileEvent {
    pub fn file(path: impl Into<PathBuf>, kind: FileEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
            is_dir: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatcherStatus {
    Running,
    CircuitOpen,
    Stopped,
}

impl fmt::Display for WatcherStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatcherStatus::Running => write!(f, "running"),
            WatcherStatus::CircuitOpen => write!(f, "circuit_open"),
            WatcherStatus::Stopped => write!(f, "stopped"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub name: String,
    pub folder: PathBuf,
    /// Glob matched against the file name, e.g. `*.md`.
    pub file_pattern: String,
    pub debounce: Duration,
    pub event_types: Vec<FileEventKind>,
    pub max_errors: u32,
}

impl WatcherConfig {
    pub fn new(name: impl Into<String>, folder: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            folder: folder.into(),
            file_pattern: "*.md".to_string(),
            debounce: Duration::from_secs(1),
            event_types: vec![FileEventKind::Created, FileEventKind::Modified],
            max_errors: 5,
        }
    }

    /// Shared `[watchers]` settings applied on top of the defaults.
    pub fn from_settings(
        name: impl Into<String>,
        folder: impl Into<PathBuf>,
        settings: &WatcherSettings,
    ) -> Self {
        Self {
            file_pattern: settings.file_pattern.clone(),
            debounce: Duration::from_secs(settings.debounce_secs),
            max_errors: settings.max_errors,
            ..Self::new(name, folder)
        }
    }

    pub fn with_event_types(mut self, event_types: Vec<FileEventKind>) -> Self {
        self.event_types = event_types;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}

/// Per-watcher processing logic.
#[async_trait]
pub trait FileHandler: Send + Sync + 'static {
    async fn process_file(&self, path: &Path, kind: FileEventKind) -> Result<()>;
}

#[derive(Debug)]
struct WatcherState {
    last_processed: HashMap<PathBuf, Instant>,
    error_count: u32,
    status: WatcherStatus,
}

/// Generic debounced watcher around a [`FileHandler`].
pub struct Watcher<H> {
    config: WatcherConfig,
    handler: Arc<H>,
    pattern: Regex,
    state: Mutex<WatcherState>,
    stop: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<H: FileHandler> Watcher<H> {
    pub fn new(config: WatcherConfig, handler: H) -> Self {
        let pattern = glob_to_regex(&config.file_pattern);
        info!(
            watcher = %config.name,
            folder = %config.folder.display(),
            "Watcher initialized"
        );
        Self {
            config,
            handler: Arc::new(handler),
            pattern,
            state: Mutex::new(WatcherState {
                last_processed: HashMap::new(),
                error_count: 0,
                status: WatcherStatus::Stopped,
            }),
            stop: Arc::new(Notify::new()),
            task: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn status(&self) -> WatcherStatus {
        self.state.lock().unwrap().status
    }

    pub fn error_count(&self) -> u32 {
        self.state.lock().unwrap().error_count
    }

    /// Filter one event and process it. Returns whether the handler ran.
    pub async fn handle_event(&self, event: FileEvent) -> bool {
        self.handle_event_at(event, Instant::now()).await
    }

    /// [`Watcher::handle_event`] against an explicit clock reading.
    pub async fn handle_event_at(&self, event: FileEvent, now: Instant) -> bool {
        if event.is_dir || !self.config.event_types.contains(&event.kind) {
            return false;
        }
        if !self.matches(&event.path) {
            return false;
        }

        {
            let mut state = self.state.lock().unwrap();
            let debounce = self.config.debounce;
            state
                .last_processed
                .retain(|_, last| now.saturating_duration_since(*last) < debounce);
            if let Some(last) = state.last_processed.get(&event.path) {
                if now.saturating_duration_since(*last) < self.config.debounce {
                    return false;
                }
            }
            state.last_processed.insert(event.path.clone(), now);
        }

        debug!(
            watcher = %self.config.name,
            kind = %event.kind,
            path = %event.path.display(),
            "Event detected"
        );

        let result = self.handler.process_file(&event.path, event.kind).await;

        let mut state = self.state.lock().unwrap();
        match result {
            Ok(()) => state.error_count = 0,
            Err(e) => {
                state.error_count += 1;
                error!(
                    watcher = %self.config.name,
                    path = %event.path.display(),
                    error = %e,
                    "Error processing file"
                );
                if state.error_count >= self.config.max_errors
                    && state.status != WatcherStatus::CircuitOpen
                {
                    state.status = WatcherStatus::CircuitOpen;
                    error!(
                        watcher = %self.config.name,
                        errors = state.error_count,
                        "Watcher circuit breaker opened"
                    );
                }
            }
        }
        true
    }

    /// Subscribe to `source` and process its events on a background task.
    /// No-op while an event loop is already running.
    pub fn start(self: &Arc<Self>, source: &dyn FileEventSource) -> Result<()> {
        if self.status() == WatcherStatus::CircuitOpen {
            warn!(watcher = %self.config.name, "Cannot start watcher: circuit breaker is open");
            return Err(WorkflowError::WatcherCircuitOpen(self.config.name.clone()));
        }
        let running = self
            .task
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|task| !task.is_finished());
        if running {
            debug!(watcher = %self.config.name, "Watcher already running");
            return Ok(());
        }

        std::fs::create_dir_all(&self.config.folder)?;
        let mut subscription = source.subscribe(&self.config.folder)?;

        let watcher = Arc::clone(self);
        let stop = Arc::clone(&self.stop);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = subscription.next() => match event {
                        Some(event) => {
                            watcher.handle_event(event).await;
                        }
                        None => break,
                    },
                    _ = stop.notified() => break,
                }
            }
        });

        *self.task.lock().unwrap() = Some(task);
        self.state.lock().unwrap().status = WatcherStatus::Running;
        info!(watcher = %self.config.name, "Watcher started");
        Ok(())
    }

    /// Cancel the subscription and wait for the event loop to exit.
    pub async fn stop(&self) {
        let task = self.task.lock().unwrap().take();
        if let Some(task) = task {
            self.stop.notify_one();
            let _ = task.await;
        }
        self.state.lock().unwrap().status = WatcherStatus::Stopped;
        info!(watcher = %self.config.name, "Watcher stopped");
    }

    pub fn reset_circuit_breaker(&self) {
        let mut state = self.state.lock().unwrap();
        state.error_count = 0;
        state.status = WatcherStatus::Running;
        info!(watcher = %self.config.name, "Circuit breaker reset");
    }

    fn matches(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| self.pattern.is_match(&name.to_string_lossy()))
            .unwrap_or(false)
    }
}

/// Translate a file-name glob (`*`, `?`) into an anchored regex.
fn glob_to_regex(glob: &str) -> Regex {
    let mut pattern = String::from("^");
    for c in glob.chars() {
        match c {
            '*' => pattern.push_str("[^/]*"),
            '?' => pattern.push_str("[^/]"),
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
    }
    pattern.push('$');
    Regex::new(&pattern).expect("Escaped glob is always a valid regex")
}
