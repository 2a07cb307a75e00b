//! Core types and value objects for the workflow engine.
//!
//! Defines action types, record statuses, plan steps and step outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Metadata keys
// =============================================================================

/// Frontmatter field names. The schema is fixed and versionless.
pub mod keys {
    pub const ID: &str = "id";
    pub const TITLE: &str = "title";
    pub const STATUS: &str = "status";
    pub const EXECUTION_STATUS: &str = "execution_status";
    pub const REQUIRES_APPROVAL: &str = "requires_approval";
    pub const APPROVED_AT: &str = "approved_at";
    pub const APPROVED_BY: &str = "approved_by";
    pub const TASK_ID: &str = "task_id";
    pub const PLAN_ID: &str = "plan_id";
    pub const OBJECTIVE: &str = "objective";
    pub const RETRY_COUNT: &str = "retry_count";
    pub const ERROR_MESSAGE: &str = "error_message";
    pub const CREATED_AT: &str = "created_at";
    pub const UPDATED_AT: &str = "updated_at";
    pub const EXECUTED_AT: &str = "executed_at";
    pub const COMPLETED_AT: &str = "completed_at";
    pub const EXECUTION_SUMMARY: &str = "execution_summary";
    pub const PRIORITY: &str = "priority";
    pub const SOURCE: &str = "source";
}

// =============================================================================
// Enums
// =============================================================================

/// Action types a plan step can carry.
///
/// Declaration order is the order in which detected actions are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    SendEmail,
    PostFacebook,
    FileRead,
    FileWrite,
    FileMove,
    FileDelete,
}

impl ActionType {
    pub const ALL: [ActionType; 6] = [
        ActionType::SendEmail,
        ActionType::PostFacebook,
        ActionType::FileRead,
        ActionType::FileWrite,
        ActionType::FileMove,
        ActionType::FileDelete,
    ];

    /// Whether the action has a side effect outside the vault.
    pub fn is_external(&self) -> bool {
        matches!(self, ActionType::SendEmail | ActionType::PostFacebook)
    }

    /// Rate limiter key of the integration this action calls, if any.
    pub fn rate_limit_key(&self) -> Option<&'static str> {
        match self {
            ActionType::SendEmail => Some("send_email"),
            ActionType::PostFacebook => Some("post_facebook_page"),
            ActionType::FileRead
            | ActionType::FileWrite
            | ActionType::FileMove
            | ActionType::FileDelete => None,
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionType::SendEmail => write!(f, "send_email"),
            ActionType::PostFacebook => write!(f, "post_facebook"),
            ActionType::FileRead => write!(f, "file_read"),
            ActionType::FileWrite => write!(f, "file_write"),
            ActionType::FileMove => write!(f, "file_move"),
            ActionType::FileDelete => write!(f, "file_delete"),
        }
    }
}

impl std::str::FromStr for ActionType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "send_email" => Ok(ActionType::SendEmail),
            "post_facebook" => Ok(ActionType::PostFacebook),
            "file_read" => Ok(ActionType::FileRead),
            "file_write" => Ok(ActionType::FileWrite),
            "file_move" => Ok(ActionType::FileMove),
            "file_delete" => Ok(ActionType::FileDelete),
            _ => Err(format!("Unknown action type: {}", s)),
        }
    }
}

/// Task lifecycle status stored in the `status` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    New,
    Planned,
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::New => write!(f, "new"),
            TaskStatus::Planned => write!(f, "planned"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(TaskStatus::New),
            "planned" => Ok(TaskStatus::Planned),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(format!("Unknown task status: {}", s)),
        }
    }
}

/// Plan execution status stored in the `execution_status` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Pending => write!(f, "pending"),
            ExecutionStatus::InProgress => write!(f, "in_progress"),
            ExecutionStatus::Completed => write!(f, "completed"),
            ExecutionStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExecutionStatus::Pending),
            "in_progress" => Ok(ExecutionStatus::InProgress),
            "completed" => Ok(ExecutionStatus::Completed),
            "failed" => Ok(ExecutionStatus::Failed),
            _ => Err(format!("Unknown execution status: {}", s)),
        }
    }
}

/// Stable error codes attached to failed steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepErrorCode {
    RateLimitExceeded,
    CircuitOpen,
    EmailPreviewNotFound,
    FacebookParamsNotFound,
    UnknownActionType,
    /// Code reported by the external capability itself.
    Transport(String),
}

impl fmt::Display for StepErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepErrorCode::RateLimitExceeded => write!(f, "RATE_LIMIT_EXCEEDED"),
            StepErrorCode::CircuitOpen => write!(f, "CIRCUIT_OPEN"),
            StepErrorCode::EmailPreviewNotFound => write!(f, "EMAIL_PREVIEW_NOT_FOUND"),
            StepErrorCode::FacebookParamsNotFound => write!(f, "FACEBOOK_PARAMS_NOT_FOUND"),
            StepErrorCode::UnknownActionType => write!(f, "UNKNOWN_ACTION_TYPE"),
            StepErrorCode::Transport(code) => write!(f, "{}", code),
        }
    }
}

// =============================================================================
// Domain Structs
// =============================================================================

/// One action within a plan. Generated, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub action_type: ActionType,
    /// Human-readable label, e.g. "Send email".
    pub action: String,
    pub parameters: String,
    pub expected_outcome: String,
}

/// A step as recovered from a rendered plan body.
///
/// The action type is kept as written so that an unknown tag becomes a step
/// failure instead of a parse error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStep {
    pub action: String,
    pub action_tag: String,
}

/// Outcome of executing one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    /// Tag of the step's action type as written in the plan.
    pub action_type: String,
    pub success: bool,
    pub message: String,
    pub error_code: Option<StepErrorCode>,
    /// Message id / post id returned by the integration.
    pub external_id: Option<String>,
}

impl StepResult {
    pub fn ok(action_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            success: true,
            message: message.into(),
            error_code: None,
            external_id: None,
        }
    }

    pub fn failed(
        action_type: impl Into<String>,
        code: StepErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            action_type: action_type.into(),
            success: false,
            message: message.into(),
            error_code: Some(code),
            external_id: None,
        }
    }

    /// One summary line: `send_email: Email sent` or
    /// `send_email: RATE_LIMIT_EXCEEDED - ...`.
    pub fn summary_line(&self) -> String {
        match (&self.error_code, self.success) {
            (_, true) => format!("{}: {}", self.action_type, self.message),
            (Some(code), false) => format!("{}: {} - {}", self.action_type, code, self.message),
            (None, false) => format!("{}: UNKNOWN - {}", self.action_type, self.message),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
