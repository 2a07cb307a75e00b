//! Periodic reconciler.
//!
//! One invocation plans every pending task in Needs_Action, then runs a
//! single executor pass over Approved.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};
use vaultflow_core::{iso_now, Folder, VaultLayout};

use crate::error::Result;
use crate::executor::PlanExecutor;
use crate::planner::{PlanGenerator, PlanRouter};
use crate::record::{file_stem, list_records, move_record, Metadata, RecordStore};
use crate::types::{keys, TaskStatus};

/// Counts from one reasoning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopReport {
    pub tasks_processed: usize,
    pub task_errors: usize,
    /// Tasks already planned by an earlier pass.
    pub skipped: usize,
    pub plans_executed: usize,
    pub execution_errors: usize,
    pub duration: Duration,
}

pub struct ReasoningLoop {
    layout: VaultLayout,
    store: RecordStore,
    generator: PlanGenerator,
    router: PlanRouter,
    executor: PlanExecutor,
}

impl ReasoningLoop {
    pub fn new(layout: VaultLayout, store: RecordStore, executor: PlanExecutor) -> Self {
        let router = PlanRouter::new(layout.clone(), store.clone());
        Self {
            layout,
            store,
            generator: PlanGenerator::new(),
            router,
            executor,
        }
    }

    pub fn executor(&self) -> &PlanExecutor {
        &self.executor
    }

    pub async fn run(&self) -> LoopReport {
        let started = Instant::now();
        let mut report = LoopReport::default();
        info!("Reasoning loop started");

        let tasks = match list_records(&self.layout.folder(Folder::NeedsAction)) {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(error = %e, "Could not list Needs_Action");
                Vec::new()
            }
        };
        if tasks.is_empty() {
            info!("No tasks to process");
        } else {
            info!(count = tasks.len(), "Found tasks in Needs_Action");
        }

        for path in &tasks {
            match self.process_task(path) {
                Ok(true) => report.tasks_processed += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    report.task_errors += 1;
                    error!(task = %path.display(), error = %e, "Error processing task");
                    self.handle_task_error(path, &e.to_string());
                }
            }
        }

        debug!("Checking for approved plans to execute");
        let execution = self.executor.execute_approved_plans().await;
        report.plans_executed = execution.executed;
        report.execution_errors = execution.errors;
        report.duration = started.elapsed();

        info!(
            duration_ms = report.duration.as_millis() as u64,
            tasks_processed = report.tasks_processed,
            task_errors = report.task_errors,
            skipped = report.skipped,
            plans_executed = report.plans_executed,
            execution_errors = report.execution_errors,
            "Reasoning loop completed"
        );
        report
    }

    /// Plan one task. Returns `false` if it was already planned.
    fn process_task(&self, path: &Path) -> Result<bool> {
        let task = self.store.read(path)?;
        let status = task
            .metadata
            .get_str(keys::STATUS)
            .and_then(|s| s.parse::<TaskStatus>().ok());
        if status == Some(TaskStatus::Planned) {
            debug!(task = %path.display(), "Task already planned, skipping");
            return Ok(false);
        }

        let plan = self.generator.generate_for_task(path, &task);
        if !PlanRouter::validate_routing(&plan) {
            warn!(task = %plan.task_id, "Plan routing validation failed");
        }
        let plan_path = self.router.route(&plan, &plan.file_name())?;
        info!(task = %plan.task_id, plan = %plan_path.display(), "Plan routed");

        let updates = Metadata::new()
            .with(keys::STATUS, TaskStatus::Planned.to_string())
            .with(keys::UPDATED_AT, iso_now())
            .with(keys::PLAN_ID, plan.task_id.as_str());
        if let Err(e) = self.store.update_metadata(path, updates) {
            error!(task = %plan.task_id, error = %e, "Failed to update task status");
        }
        Ok(true)
    }

    /// Record the failure on the task and hand it back to Inbox for a human.
    pub fn handle_task_error(&self, path: &Path, message: &str) {
        let retry_count = self
            .store
            .read(path)
            .ok()
            .and_then(|t| t.metadata.get_u64(keys::RETRY_COUNT))
            .unwrap_or(0);

        let updates = Metadata::new()
            .with(keys::STATUS, TaskStatus::Failed.to_string())
            .with(keys::UPDATED_AT, iso_now())
            .with(keys::ERROR_MESSAGE, message)
            .with(keys::RETRY_COUNT, retry_count + 1);

        // An unreadable task still goes back to Inbox, or every pass would
        // trip over it again.
        if let Err(e) = self.store.update_metadata(path, updates) {
            warn!(task = %path.display(), error = %e, "Could not record task error");
        }
        match move_record(&self.layout, path, Folder::Inbox) {
            Ok(inbox) => info!(
                task = %file_stem(path),
                path = %inbox.display(),
                "Task moved to Inbox with error details"
            ),
            Err(e) => error!(task = %path.display(), error = %e, "Failed to handle task error"),
        }
    }
}
