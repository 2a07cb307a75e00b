//! Plan executor.
//!
//! Runs every plan in Approved: recovers the steps from the plan body,
//! gates each external step behind the rate limiter and the integration's
//! circuit breaker, and moves the plan to Done or back to Pending_Approval
//! depending on the outcome.

pub mod extract;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};
use vaultflow_core::{iso_now, Folder, VaultLayout};

use crate::capability::{DeliveryOutcome, EmailSender, SocialPoster};
use crate::circuit_breaker::{
    guarded, BreakerError, CircuitBreaker, CircuitBreakerConfig, OutcomeTracker,
};
use crate::error::{Result, WorkflowError};
use crate::rate_limiter::Admission;
use crate::record::{file_stem, list_records, move_record, Metadata, Record, RecordStore};
use crate::types::{keys, ActionType, ExecutionStatus, ParsedStep, StepErrorCode, StepResult};
pub use extract::PlanParser;

/// Counts from one pass over Approved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub executed: usize,
    pub errors: usize,
}

/// Runs the file-system steps of a plan.
#[async_trait]
pub trait FileActionRunner: Send + Sync {
    async fn run(&self, action: ActionType, step: &ParsedStep, plan: &Path) -> StepResult;
}

/// Logs file steps and reports success without touching the vault.
#[derive(Debug, Default)]
pub struct NoopFileActions;

#[async_trait]
impl FileActionRunner for NoopFileActions {
    async fn run(&self, action: ActionType, step: &ParsedStep, plan: &Path) -> StepResult {
        info!(
            plan = %plan.display(),
            action_type = %action,
            action = %step.action,
            "File operation logged"
        );
        StepResult::ok(action.to_string(), "File operation logged (not executed)")
    }
}

pub struct PlanExecutor {
    layout: VaultLayout,
    store: RecordStore,
    parser: &'static PlanParser,
    admission: Arc<dyn Admission>,
    email: Arc<dyn EmailSender>,
    social: Arc<dyn SocialPoster>,
    email_breaker: Arc<dyn OutcomeTracker>,
    social_breaker: Arc<dyn OutcomeTracker>,
    files: Arc<dyn FileActionRunner>,
}

impl PlanExecutor {
    pub fn new(
        layout: VaultLayout,
        store: RecordStore,
        admission: Arc<dyn Admission>,
        email: Arc<dyn EmailSender>,
        social: Arc<dyn SocialPoster>,
    ) -> Self {
        Self {
            layout,
            store,
            parser: PlanParser::shared(),
            admission,
            email,
            social,
            email_breaker: Arc::new(CircuitBreaker::new("email", CircuitBreakerConfig::default())),
            social_breaker: Arc::new(CircuitBreaker::new(
                "facebook",
                CircuitBreakerConfig::default(),
            )),
            files: Arc::new(NoopFileActions),
        }
    }

    /// Replace both integration breakers with fresh ones using `config`.
    pub fn with_breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.email_breaker = Arc::new(CircuitBreaker::new("email", config.clone()));
        self.social_breaker = Arc::new(CircuitBreaker::new("facebook", config));
        self
    }

    pub fn with_trackers(
        mut self,
        email: Arc<dyn OutcomeTracker>,
        social: Arc<dyn OutcomeTracker>,
    ) -> Self {
        self.email_breaker = email;
        self.social_breaker = social;
        self
    }

    pub fn with_file_actions(mut self, files: Arc<dyn FileActionRunner>) -> Self {
        self.files = files;
        self
    }

    /// Execute every plan in Approved. Per-plan errors are handled and
    /// counted, never propagated.
    pub async fn execute_approved_plans(&self) -> ExecutionReport {
        let mut report = ExecutionReport::default();

        let plans = match list_records(&self.layout.folder(Folder::Approved)) {
            Ok(plans) => plans,
            Err(e) => {
                warn!(error = %e, "Could not list approved plans");
                return report;
            }
        };
        if plans.is_empty() {
            debug!("No approved plans to execute");
            return report;
        }
        info!(count = plans.len(), "Found approved plans to execute");

        for path in plans {
            match self.execute_plan(&path).await {
                Ok(_) => report.executed += 1,
                Err(e) => {
                    report.errors += 1;
                    error!(plan = %path.display(), error = %e, "Error executing plan");
                    self.handle_execution_error(&path, &e.to_string());
                }
            }
        }
        report
    }

    /// Execute one approved plan and move it according to the outcome.
    pub async fn execute_plan(&self, path: &Path) -> Result<Vec<StepResult>> {
        let plan = self.store.read(path)?;
        let plan_id = plan
            .metadata
            .get_str(keys::ID)
            .unwrap_or_else(|| file_stem(path));
        info!(plan = %plan_id, "Executing plan");

        if !plan.metadata.is_set(keys::APPROVED_AT) {
            return Err(WorkflowError::NotApproved(plan_id));
        }

        self.store.update_metadata(
            path,
            Metadata::new()
                .with(keys::EXECUTION_STATUS, ExecutionStatus::InProgress.to_string())
                .with(keys::EXECUTED_AT, iso_now()),
        )?;

        let task_body = self.task_body(&plan);
        let mut results = Vec::new();
        for step in self.parser.parse_steps(&plan.body) {
            let result = self
                .execute_step(&step, path, task_body.as_deref(), &plan.body)
                .await;
            if !result.success {
                warn!(plan = %plan_id, step = %step.action, summary = %result.summary_line(), "Step failed");
            }
            results.push(result);
        }

        if results.iter().all(|r| r.success) {
            self.complete_plan(path, &results)?;
        } else {
            self.fail_plan(path, &results)?;
        }
        Ok(results)
    }

    /// Mark a plan failed and return it to Pending_Approval. Failures here
    /// are logged only.
    pub fn handle_execution_error(&self, path: &Path, message: &str) {
        let updates = Metadata::new()
            .with(keys::EXECUTION_STATUS, ExecutionStatus::Failed.to_string())
            .with(keys::ERROR_MESSAGE, message);
        if let Err(e) = self.store.update_metadata(path, updates) {
            error!(plan = %path.display(), error = %e, "Could not record execution error");
        }
        if path.exists() {
            if let Err(e) = move_record(&self.layout, path, Folder::PendingApproval) {
                error!(plan = %path.display(), error = %e, "Could not return plan to Pending_Approval");
                return;
            }
        }
        error!(plan = %path.display(), "Plan execution error handled");
    }

    /// Body of the originating task, if it is still in Needs_Action.
    fn task_body(&self, plan: &Record) -> Option<String> {
        let task_id = plan.metadata.get_str(keys::TASK_ID)?;
        let task_path = self
            .layout
            .file(Folder::NeedsAction, &format!("{}.md", task_id));
        if !task_path.exists() {
            return None;
        }
        match self.store.read(&task_path) {
            Ok(task) => Some(task.body),
            Err(e) => {
                warn!(task = %task_id, error = %e, "Could not read original task");
                None
            }
        }
    }

    async fn execute_step(
        &self,
        step: &ParsedStep,
        plan_path: &Path,
        task_body: Option<&str>,
        plan_body: &str,
    ) -> StepResult {
        let action: ActionType = match step.action_tag.parse() {
            Ok(action) => action,
            Err(e) => {
                return StepResult::failed(
                    step.action_tag.clone(),
                    StepErrorCode::UnknownActionType,
                    e,
                )
            }
        };

        match action {
            ActionType::SendEmail => self.send_email(task_body, plan_body).await,
            ActionType::PostFacebook => self.post_social(task_body, plan_body).await,
            ActionType::FileRead
            | ActionType::FileWrite
            | ActionType::FileMove
            | ActionType::FileDelete => self.files.run(action, step, plan_path).await,
        }
    }

    async fn send_email(&self, task_body: Option<&str>, plan_body: &str) -> StepResult {
        let tag = ActionType::SendEmail.to_string();
        let request = task_body
            .and_then(|body| self.parser.extract_email(body))
            .or_else(|| self.parser.extract_email(plan_body));
        let Some(request) = request else {
            return StepResult::failed(
                tag,
                StepErrorCode::EmailPreviewNotFound,
                "Could not extract email parameters from plan",
            );
        };

        if let Some(rejected) = self.admit(ActionType::SendEmail) {
            return rejected;
        }

        info!(to = %request.to, subject = %request.subject, "Sending email");
        let (sender, request) = (&self.email, &request);
        let outcome = guarded(self.email_breaker.as_ref(), || async move {
            let outcome = sender.send(request).await;
            if outcome.success {
                Ok(outcome)
            } else {
                Err(outcome)
            }
        })
        .await;
        step_result(ActionType::SendEmail, outcome)
    }

    async fn post_social(&self, task_body: Option<&str>, plan_body: &str) -> StepResult {
        let tag = ActionType::PostFacebook.to_string();
        let post = task_body
            .and_then(|body| self.parser.extract_social(body))
            .or_else(|| self.parser.extract_social(plan_body));
        let Some(post) = post else {
            return StepResult::failed(
                tag,
                StepErrorCode::FacebookParamsNotFound,
                "Could not extract Facebook parameters from plan",
            );
        };

        if let Some(rejected) = self.admit(ActionType::PostFacebook) {
            return rejected;
        }

        info!(message_len = post.message.chars().count(), "Posting to Facebook page");
        let (poster, post) = (&self.social, &post);
        let outcome = guarded(self.social_breaker.as_ref(), || async move {
            let outcome = poster.post(post).await;
            if outcome.success {
                Ok(outcome)
            } else {
                Err(outcome)
            }
        })
        .await;
        step_result(ActionType::PostFacebook, outcome)
    }

    /// `Some(failure)` when the quota for `action` is used up.
    fn admit(&self, action: ActionType) -> Option<StepResult> {
        let key = action.rate_limit_key()?;
        if self.admission.try_admit(key) {
            return None;
        }
        warn!(action = key, "Rate limit exceeded");
        Some(StepResult::failed(
            action.to_string(),
            StepErrorCode::RateLimitExceeded,
            format!("Hourly quota for {} exhausted", key),
        ))
    }

    fn complete_plan(&self, path: &Path, results: &[StepResult]) -> Result<()> {
        let summary = results
            .iter()
            .map(StepResult::summary_line)
            .collect::<Vec<_>>()
            .join("\n");
        self.store.update_metadata(
            path,
            Metadata::new()
                .with(keys::EXECUTION_STATUS, ExecutionStatus::Completed.to_string())
                .with(keys::COMPLETED_AT, iso_now())
                .with(keys::EXECUTION_SUMMARY, summary),
        )?;
        let done = move_record(&self.layout, path, Folder::Done)?;
        info!(plan = %done.display(), "Plan completed and moved to Done");
        Ok(())
    }

    fn fail_plan(&self, path: &Path, results: &[StepResult]) -> Result<()> {
        let message = results
            .iter()
            .filter(|r| !r.success)
            .map(StepResult::summary_line)
            .collect::<Vec<_>>()
            .join("\n");
        self.store.update_metadata(
            path,
            Metadata::new()
                .with(keys::EXECUTION_STATUS, ExecutionStatus::Failed.to_string())
                .with(keys::COMPLETED_AT, iso_now())
                .with(keys::ERROR_MESSAGE, message),
        )?;
        let pending = move_record(&self.layout, path, Folder::PendingApproval)?;
        warn!(plan = %pending.display(), "Plan failed and moved back to Pending_Approval");
        Ok(())
    }
}

fn step_result(
    action: ActionType,
    outcome: std::result::Result<DeliveryOutcome, BreakerError<DeliveryOutcome>>,
) -> StepResult {
    let tag = action.to_string();
    match outcome {
        Ok(delivered) => StepResult {
            external_id: delivered.external_id,
            ..StepResult::ok(tag, delivered.message)
        },
        Err(BreakerError::Open { name }) => StepResult::failed(
            tag,
            StepErrorCode::CircuitOpen,
            format!("Circuit breaker '{}' is open", name),
        ),
        Err(BreakerError::Failed(failed)) => StepResult::failed(
            tag,
            StepErrorCode::Transport(
                failed
                    .error_code
                    .unwrap_or_else(|| "EXECUTION_ERROR".to_string()),
            ),
            failed.message,
        ),
    }
}
