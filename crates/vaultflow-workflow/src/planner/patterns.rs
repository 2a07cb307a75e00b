//! Regex-based action type detection.
//!
//! Each action type owns an ordered list of patterns evaluated against the
//! lower-cased task text. The first hit of any pattern adds the type once.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::ActionType;

/// Compiled patterns for one action type.
pub struct ActionPattern {
    pub action_type: ActionType,
    pub regexes: Vec<Regex>,
}

/// All action patterns, compiled once and reused.
pub struct ActionPatternSet {
    patterns: Vec<ActionPattern>,
}

impl Default for ActionPatternSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionPatternSet {
    /// Process-wide pattern set, compiled on first use.
    pub fn shared() -> &'static ActionPatternSet {
        static PATTERNS: OnceLock<ActionPatternSet> = OnceLock::new();
        PATTERNS.get_or_init(ActionPatternSet::new)
    }

    pub fn new() -> Self {
        let table: Vec<(ActionType, Vec<&str>)> = vec![
            // =================================================================
            // External actions (require approval)
            // =================================================================
            (
                ActionType::SendEmail,
                vec![
                    r"send\s+(?:an?\s+)?email",
                    r"email\s+(?:to|someone)",
                    r"notify\s+(?:via\s+)?email",
                    r"send\s+(?:a\s+)?message\s+to\s+\S+@\S+",
                ],
            ),
            (
                ActionType::PostFacebook,
                vec![
                    r"post\s+(?:to|on)\s+facebook",
                    r"facebook\s+post",
                    r"publish\s+(?:to|on)\s+(?:the\s+)?(?:facebook\s+)?page",
                    r"social\s+media\s+post",
                ],
            ),
            // =================================================================
            // File actions
            // =================================================================
            (
                ActionType::FileRead,
                vec![
                    r"read\s+(?:the\s+)?file",
                    r"check\s+(?:the\s+)?(?:contents?\s+of)",
                    r"review\s+(?:the\s+)?file",
                    r"scan\s+(?:the\s+)?folder",
                ],
            ),
            (
                ActionType::FileWrite,
                vec![
                    r"write\s+(?:to\s+)?(?:a\s+)?file",
                    r"create\s+(?:a\s+)?file",
                    r"save\s+(?:to\s+)?file",
                    r"update\s+(?:the\s+)?file",
                ],
            ),
            (
                ActionType::FileMove,
                vec![
                    r"move\s+(?:the\s+)?file",
                    r"move\s+(?:\w+\s+){0,2}files?\b",
                    r"relocate\s+(?:the\s+)?file",
                    r"transfer\s+(?:the\s+)?file",
                    r"organize\s+files",
                    r"archive\s+(?:the\s+)?files?\b",
                ],
            ),
            (
                ActionType::FileDelete,
                vec![
                    r"delete\s+(?:the\s+)?file",
                    r"remove\s+(?:the\s+)?file",
                    r"clean\s+up\s+files",
                ],
            ),
        ];

        let patterns = table
            .into_iter()
            .map(|(action_type, pats)| ActionPattern {
                action_type,
                regexes: pats
                    .into_iter()
                    .map(|p| Regex::new(p).expect("Invalid action regex"))
                    .collect(),
            })
            .collect();

        Self { patterns }
    }

    /// Detected action types in declaration order. Never empty: text that
    /// matches nothing is treated as a `file_read` task.
    pub fn detect(&self, text: &str) -> Vec<ActionType> {
        let lower = text.to_lowercase();
        let mut detected: Vec<ActionType> = self
            .patterns
            .iter()
            .filter(|p| p.regexes.iter().any(|re| re.is_match(&lower)))
            .map(|p| p.action_type)
            .collect();

        if detected.is_empty() {
            detected.push(ActionType::FileRead);
        }
        detected
    }

    pub fn patterns(&self) -> &[ActionPattern] {
        &self.patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(text: &str) -> Vec<ActionType> {
        ActionPatternSet::new().detect(text)
    }

    // =====================================================================
    // Email
    // =====================================================================

    #[test]
    fn test_send_an_email() {
        assert_eq!(
            detect("Send an email to ops@example.com about the outage, subject: Outage Update"),
            vec![ActionType::SendEmail]
        );
    }

    #[test]
    fn test_notify_via_email() {
        assert_eq!(detect("Notify via email when done"), vec![ActionType::SendEmail]);
    }

    #[test]
    fn test_message_to_address() {
        assert_eq!(
            detect("send a message to bob@example.com"),
            vec![ActionType::SendEmail]
        );
    }

    // =====================================================================
    // Facebook
    // =====================================================================

    #[test]
    fn test_post_on_facebook() {
        assert_eq!(
            detect("Post on Facebook about the launch"),
            vec![ActionType::PostFacebook]
        );
    }

    #[test]
    fn test_publish_to_page() {
        assert_eq!(
            detect("Publish to the page tomorrow"),
            vec![ActionType::PostFacebook]
        );
    }

    // =====================================================================
    // File actions
    // =====================================================================

    #[test]
    fn test_move_completed_files() {
        assert_eq!(
            detect("Move completed files to archive"),
            vec![ActionType::FileMove]
        );
    }

    #[test]
    fn test_write_file() {
        assert_eq!(detect("Create a file with the notes"), vec![ActionType::FileWrite]);
    }

    #[test]
    fn test_delete_file() {
        assert_eq!(detect("Delete the file old.log"), vec![ActionType::FileDelete]);
    }

    // =====================================================================
    // Ordering and defaults
    // =====================================================================

    #[test]
    fn test_declaration_order_not_match_order() {
        let text = "Move the file to shared, then post to Facebook, then send an email";
        assert_eq!(
            detect(text),
            vec![
                ActionType::SendEmail,
                ActionType::PostFacebook,
                ActionType::FileMove
            ]
        );
    }

    #[test]
    fn test_each_type_added_once() {
        let text = "send an email. send email again. email to someone.";
        assert_eq!(detect(text), vec![ActionType::SendEmail]);
    }

    #[test]
    fn test_default_is_file_read() {
        assert_eq!(detect("Think about lunch"), vec![ActionType::FileRead]);
        assert_eq!(detect(""), vec![ActionType::FileRead]);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(detect("SEND AN EMAIL NOW"), vec![ActionType::SendEmail]);
    }

    #[test]
    fn test_every_type_has_patterns() {
        let set = ActionPatternSet::new();
        assert_eq!(set.patterns().len(), ActionType::ALL.len());
        for (pattern, expected) in set.patterns().iter().zip(ActionType::ALL) {
            assert_eq!(pattern.action_type, expected);
            assert!(!pattern.regexes.is_empty());
        }
    }

    #[test]
    fn test_shared_set_is_compiled_once() {
        assert!(std::ptr::eq(ActionPatternSet::shared(), ActionPatternSet::shared()));
        assert_eq!(
            ActionPatternSet::shared().detect("send an email"),
            vec![ActionType::SendEmail]
        );
    }
}
