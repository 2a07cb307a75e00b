//! Rule-based plan generator.
//!
//! Classifies a task's text into action types, decides whether a human has
//! to approve the plan, and fills in steps, risks, rollback and preview
//! from fixed per-type fragments. Same input, same plan.

use std::path::Path;

use regex::Regex;
use tracing::{debug, info};
use vaultflow_core::iso_now;

use super::patterns::ActionPatternSet;
use super::Plan;
use crate::record::{file_stem, Record};
use crate::types::{keys, ActionType, Step};

const PREVIEW_CHARS: usize = 500;
const OBJECTIVE_MAX_CHARS: usize = 500;
const FIRST_LINE_MAX_CHARS: usize = 200;

const DEFAULT_RECIPIENT: &str = "recipient@example.com";
const DEFAULT_SUBJECT: &str = "Email Subject";

pub struct PlanGenerator {
    patterns: &'static ActionPatternSet,
    labelled_recipient: Regex,
    bare_address: Regex,
    subject: Regex,
}

impl Default for PlanGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanGenerator {
    pub fn new() -> Self {
        Self {
            patterns: ActionPatternSet::shared(),
            // "To: a@b", "**To:** a@b", "**Recipients**: a@b"
            labelled_recipient: Regex::new(
                r"(?i)\*?\*?(?:to|recipients?)\*?\*?:\s*\*?\*?\s*(\S+@\S+)",
            )
            .expect("Invalid recipient regex"),
            bare_address: Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
                .expect("Invalid address regex"),
            subject: Regex::new(r"(?im)subject:\s*(.+?)\s*$").expect("Invalid subject regex"),
        }
    }

    pub fn detect_action_types(&self, text: &str) -> Vec<ActionType> {
        self.patterns.detect(text)
    }

    /// The approval gate: any external action needs a human.
    pub fn requires_approval(actions: &[ActionType]) -> bool {
        actions.iter().any(ActionType::is_external)
    }

    /// Build a plan for the task stored at `path`.
    ///
    /// A task without an `id` is keyed by its file stem.
    pub fn generate_for_task(&self, path: &Path, task: &Record) -> Plan {
        let task_id = task
            .metadata
            .get_str(keys::ID)
            .unwrap_or_else(|| file_stem(path));
        let title = task
            .metadata
            .get_str(keys::TITLE)
            .unwrap_or_else(|| "Untitled Task".to_string());
        self.generate(&task_id, &title, &task.body)
    }

    pub fn generate(&self, task_id: &str, title: &str, content: &str) -> Plan {
        let actions = self.detect_action_types(content);
        let requires_approval = Self::requires_approval(&actions);
        debug!(task = %task_id, actions = ?actions, "Detected actions");

        let steps = actions
            .iter()
            .map(|action| self.step_for(*action, content))
            .collect();
        let preview = requires_approval.then(|| self.action_preview(content, &actions));

        let plan = Plan {
            task_id: task_id.to_string(),
            title: title.to_string(),
            objective: extract_objective(title, content),
            requires_approval,
            steps,
            risks: risks_for(&actions),
            rollback: rollback_for(&actions),
            preview,
            actions,
            created_at: iso_now(),
        };

        info!(
            task = %task_id,
            requires_approval,
            actions = ?plan.actions,
            "Plan generated"
        );
        plan
    }

    fn recipient(&self, content: &str) -> String {
        self.labelled_recipient
            .captures(content)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim_end_matches(['*', ',', '.', ';', ')']).to_string())
            .or_else(|| {
                self.bare_address
                    .find(content)
                    .map(|m| m.as_str().trim_end_matches('.').to_string())
            })
            .unwrap_or_else(|| DEFAULT_RECIPIENT.to_string())
    }

    fn subject_line(&self, content: &str) -> String {
        self.subject
            .captures(content)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SUBJECT.to_string())
    }

    fn step_for(&self, action: ActionType, content: &str) -> Step {
        let (label, parameters, outcome) = match action {
            ActionType::SendEmail => (
                "Send email",
                format!(
                    "to=\"{}\", subject=\"{}\", body=<content>",
                    self.recipient(content),
                    self.subject_line(content)
                ),
                "Email delivered successfully",
            ),
            ActionType::PostFacebook => (
                "Post to Facebook Page",
                "message=<content>".to_string(),
                "Post published successfully",
            ),
            ActionType::FileRead => (
                "Read required files",
                "folder=<target_folder>".to_string(),
                "File contents retrieved",
            ),
            ActionType::FileWrite => (
                "Write to file",
                "file_path=<target_file>, content=<data>".to_string(),
                "File created/updated successfully",
            ),
            ActionType::FileMove => (
                "Move file to destination",
                "source=<source_path>, destination=<dest_path>".to_string(),
                "File moved successfully",
            ),
            ActionType::FileDelete => (
                "Delete file",
                "file_path=<target_file>".to_string(),
                "File deleted successfully",
            ),
        };
        Step {
            action_type: action,
            action: label.to_string(),
            parameters,
            expected_outcome: outcome.to_string(),
        }
    }

    fn action_preview(&self, content: &str, actions: &[ActionType]) -> String {
        let mut parts = Vec::new();
        let excerpt = truncate_chars(content, PREVIEW_CHARS);

        if actions.contains(&ActionType::SendEmail) {
            parts.push(format!(
                "**Email Preview**:\n- To: {}\n- Subject: {}\n- Body: (first {} chars)\n  {}",
                self.recipient(content),
                self.subject_line(content),
                PREVIEW_CHARS,
                excerpt
            ));
        }
        if actions.contains(&ActionType::PostFacebook) {
            parts.push(format!("**Facebook Post Preview**:\n- Message: {}", excerpt));
        }
        parts.join("\n\n")
    }
}

fn risks_for(actions: &[ActionType]) -> Vec<String> {
    let mut risks: Vec<&str> = Vec::new();
    if actions.contains(&ActionType::SendEmail) {
        risks.push("Email delivery failure due to SMTP server issues");
        risks.push("Recipient email address may be invalid");
    }
    if actions.contains(&ActionType::PostFacebook) {
        risks.push("Facebook API rate limit may be exceeded");
        risks.push("Access token may be invalid or expired");
    }
    if actions
        .iter()
        .any(|a| matches!(a, ActionType::FileWrite | ActionType::FileMove))
    {
        risks.push("File system permissions may prevent operation");
    }
    if actions.contains(&ActionType::FileDelete) {
        risks.push("Deleted files cannot be recovered from the vault");
    }
    if risks.is_empty() {
        risks.push("Task requirements may be incomplete or ambiguous");
    }
    risks.into_iter().map(String::from).collect()
}

fn rollback_for(actions: &[ActionType]) -> String {
    if !PlanGenerator::requires_approval(actions) {
        return "If execution fails, log error and move task back to Needs_Action.".to_string();
    }
    [
        "1. Log error details in plan frontmatter",
        "2. Move plan back to Pending_Approval with error message",
        "3. Notify human via the pending approval watcher",
        "4. Human can modify parameters or retry",
    ]
    .join("\n")
}

/// Task title, replaced by the first content line when that line is short
/// and non-empty. Markdown heading marks are stripped.
pub fn extract_objective(title: &str, content: &str) -> String {
    let first_line = content.lines().next().unwrap_or("").trim();
    let objective = if !first_line.is_empty() && first_line.chars().count() < FIRST_LINE_MAX_CHARS
    {
        first_line.replace('#', "").trim().to_string()
    } else {
        title.to_string()
    };
    truncate_chars(&objective, OBJECTIVE_MAX_CHARS)
}

pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
