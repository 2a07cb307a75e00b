//! Plan generation and routing.

pub mod generator;
pub mod patterns;
pub mod router;

use serde::{Deserialize, Serialize};

use crate::record::{Metadata, Record};
use crate::types::{keys, ActionType, ExecutionStatus, Step};

pub use generator::PlanGenerator;
pub use patterns::ActionPatternSet;
pub use router::PlanRouter;

pub const STEPS_HEADING: &str = "## Steps";
pub const RISKS_HEADING: &str = "## Risks";
pub const ROLLBACK_HEADING: &str = "## Rollback Procedure";
pub const PREVIEW_HEADING: &str = "## Action Preview";

/// A generated plan, before it is written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Id of the originating task; also the plan's own id.
    pub task_id: String,
    pub title: String,
    pub objective: String,
    pub requires_approval: bool,
    pub actions: Vec<ActionType>,
    pub steps: Vec<Step>,
    pub risks: Vec<String>,
    pub rollback: String,
    /// Present iff `requires_approval`.
    pub preview: Option<String>,
    pub created_at: String,
}

impl Plan {
    pub fn file_name(&self) -> String {
        format!("{}.md", self.task_id)
    }

    pub fn render_body(&self) -> String {
        let mut parts: Vec<String> = vec![
            format!("# Execution Plan: {}", self.title),
            String::new(),
            STEPS_HEADING.to_string(),
            String::new(),
        ];

        for (i, step) in self.steps.iter().enumerate() {
            parts.push(format!(
                "{}. **{}** (action_type: {})\n   - Parameters: {}\n   - Expected outcome: {}",
                i + 1,
                step.action,
                step.action_type,
                step.parameters,
                step.expected_outcome
            ));
        }

        parts.extend([String::new(), RISKS_HEADING.to_string(), String::new()]);
        parts.extend(self.risks.iter().map(|r| format!("- {}", r)));
        parts.extend([
            String::new(),
            ROLLBACK_HEADING.to_string(),
            String::new(),
            self.rollback.clone(),
        ]);

        if let Some(preview) = self.preview.as_ref().filter(|p| !p.is_empty()) {
            parts.extend([
                String::new(),
                PREVIEW_HEADING.to_string(),
                String::new(),
                preview.clone(),
            ]);
        }

        parts.join("\n")
    }

    pub fn metadata(&self) -> Metadata {
        Metadata::new()
            .with(keys::ID, self.task_id.as_str())
            .with(keys::TASK_ID, self.task_id.as_str())
            .with(keys::OBJECTIVE, self.objective.as_str())
            .with(keys::REQUIRES_APPROVAL, self.requires_approval)
            .with(keys::CREATED_AT, self.created_at.as_str())
            .with(keys::EXECUTION_STATUS, ExecutionStatus::Pending.to_string())
    }

    pub fn to_record(&self) -> Record {
        Record::new(self.metadata(), self.render_body())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(requires_approval: bool) -> Plan {
        Plan {
            task_id: "20260101-120000-task".to_string(),
            title: "Weekly report".to_string(),
            objective: "Send the weekly report".to_string(),
            requires_approval,
            actions: vec![ActionType::SendEmail],
            steps: vec![Step {
                action_type: ActionType::SendEmail,
                action: "Send email".to_string(),
                parameters: "to=\"a@example.com\"".to_string(),
                expected_outcome: "Email delivered successfully".to_string(),
            }],
            risks: vec!["Recipient email address may be invalid".to_string()],
            rollback: "1. Log error details in plan frontmatter".to_string(),
            preview: requires_approval.then(|| "**Email Preview**:\n- To: a@example.com".to_string()),
            created_at: "2026-01-01T12:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_render_body_layout() {
        let body = plan(true).render_body();
        let expected = "# Execution Plan: Weekly report\n\
                        \n\
                        ## Steps\n\
                        \n\
                        1. **Send email** (action_type: send_email)\n   - Parameters: to=\"a@example.com\"\n   - Expected outcome: Email delivered successfully\n\
                        \n\
                        ## Risks\n\
                        \n\
                        - Recipient email address may be invalid\n\
                        \n\
                        ## Rollback Procedure\n\
                        \n\
                        1. Log error details in plan frontmatter\n\
                        \n\
                        ## Action Preview\n\
                        \n\
                        **Email Preview**:\n- To: a@example.com";
        assert_eq!(body, expected);
    }

    #[test]
    fn test_preview_omitted_without_approval() {
        let body = plan(false).render_body();
        assert!(!body.contains(PREVIEW_HEADING));
        assert!(body.contains(RISKS_HEADING));
        assert!(body.contains(ROLLBACK_HEADING));
    }

    #[test]
    fn test_metadata_fields() {
        let record = plan(true).to_record();
        let meta = &record.metadata;
        assert_eq!(meta.get_str("id").as_deref(), Some("20260101-120000-task"));
        assert_eq!(meta.get_str("task_id").as_deref(), Some("20260101-120000-task"));
        assert_eq!(meta.get_bool("requires_approval"), Some(true));
        assert_eq!(meta.get_str("execution_status").as_deref(), Some("pending"));
        assert_eq!(plan(true).file_name(), "20260101-120000-task.md");
    }
}
