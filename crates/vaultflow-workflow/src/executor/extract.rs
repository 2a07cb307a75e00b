//! Pulls steps and transport parameters back out of markdown.
//!
//! Email and social parameters are written by humans or upstream tools in
//! several layouts; each extractor tries them in a fixed order and takes
//! the first complete match.

use std::sync::OnceLock;

use regex::Regex;

use crate::capability::{EmailRequest, SocialPost};
use crate::types::ParsedStep;

pub struct PlanParser {
    steps_heading: Regex,
    step_line: Regex,

    bullet_to: Regex,
    bullet_subject: Regex,
    bullet_body: Regex,
    bold_to: Regex,
    bold_subject: Regex,
    bold_body: Regex,
    email_preview: Regex,

    post_details: Regex,
    bullet_message: Regex,
    bullet_message_end: Regex,
    bullet_link: Regex,
    bullet_published: Regex,
    bold_message: Regex,
    bold_message_end: Regex,
    bold_link: Regex,
    bold_published: Regex,
    social_preview: Regex,
}

impl Default for PlanParser {
    fn default() -> Self {
        Self::new()
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("Invalid extraction regex")
}

/// Text up to the first of `terminators`, or all of it.
fn take_until<'a>(text: &'a str, terminators: &[&str]) -> &'a str {
    let end = terminators
        .iter()
        .filter_map(|t| text.find(t))
        .min()
        .unwrap_or(text.len());
    &text[..end]
}

/// Text up to the first match of `terminator`, or all of it.
fn take_until_match<'a>(text: &'a str, terminator: &Regex) -> &'a str {
    match terminator.find(text) {
        Some(m) => &text[..m.start()],
        None => text,
    }
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

impl PlanParser {
    /// Process-wide parser, compiled on first use.
    pub fn shared() -> &'static PlanParser {
        static PARSER: OnceLock<PlanParser> = OnceLock::new();
        PARSER.get_or_init(PlanParser::new)
    }

    pub fn new() -> Self {
        Self {
            steps_heading: compile(r"## Steps\s*\n"),
            step_line: compile(r"\d+\.\s+\*\*(.+?)\*\*\s+\(action_type:\s+(\w+)\)"),

            bullet_to: compile(r"-\s*To:\s*(.+)"),
            bullet_subject: compile(r"-\s*Subject:\s*(.+)"),
            bullet_body: compile(r"-\s*Body:\s*\n\n"),
            bold_to: compile(r"\*\*To:\*\*\s*(.+)"),
            bold_subject: compile(r"\*\*Subject:\*\*\s*(.+)"),
            bold_body: compile(r"\*\*Body:\*\*\s*\n"),
            email_preview: compile(
                r"\*\*Email Preview\*\*:\s*\n- To:\s*([^\n]+?)\n- Subject:\s*([^\n]+?)\n- Body:[^\n]*\n\s+",
            ),

            post_details: compile(r"\*\*Post Details:\*\*\s*\n"),
            bullet_message: compile(r"-\s*Message:\s*"),
            bullet_message_end: compile(r"\n-\s*(?:Link|Published):|\n\n"),
            bullet_link: compile(r"-\s*Link:\s*(.+)"),
            bullet_published: compile(r"-\s*Published:\s*(\w+)"),
            bold_message: compile(r"\*\*Message:\*\*\s*\n"),
            bold_message_end: compile(r"\n\*\*(?:Link|Published):\*\*|\n##"),
            bold_link: compile(r"\*\*Link:\*\*\s*(.+)"),
            bold_published: compile(r"\*\*Published:\*\*\s*(\w+)"),
            social_preview: compile(r"\*\*Facebook Post Preview\*\*:\s*\n- Message:\s*"),
        }
    }

    /// Numbered steps under `## Steps`, up to the next `##` heading.
    pub fn parse_steps(&self, body: &str) -> Vec<ParsedStep> {
        let Some(heading) = self.steps_heading.find(body) else {
            return Vec::new();
        };
        let section = take_until(&body[heading.end()..], &["\n##"]);

        self.step_line
            .captures_iter(section)
            .map(|c| ParsedStep {
                action: c[1].to_string(),
                action_tag: c[2].to_string(),
            })
            .collect()
    }

    pub fn extract_email(&self, content: &str) -> Option<EmailRequest> {
        self.email_from_bullets(content)
            .or_else(|| self.email_from_bold(content))
            .or_else(|| self.email_from_preview(content))
    }

    fn email_from_bullets(&self, content: &str) -> Option<EmailRequest> {
        let to = capture(&self.bullet_to, content)?;
        let subject = capture(&self.bullet_subject, content)?;
        let start = self.bullet_body.find(content)?.end();
        let body = non_empty(take_until(&content[start..], &["\n**", "\n##"]))?;
        Some(EmailRequest::new(to, subject, body))
    }

    fn email_from_bold(&self, content: &str) -> Option<EmailRequest> {
        let to = capture(&self.bold_to, content)?;
        let subject = capture(&self.bold_subject, content)?;
        let start = self.bold_body.find(content)?.end();
        let body = non_empty(take_until(&content[start..], &["\n**", "\n##"]))?;
        Some(EmailRequest::new(to, subject, body))
    }

    fn email_from_preview(&self, content: &str) -> Option<EmailRequest> {
        let caps = self.email_preview.captures(content)?;
        let start = caps.get(0)?.end();
        let body = non_empty(take_until(&content[start..], &["\n\n"]))?;
        Some(EmailRequest::new(
            caps[1].trim(),
            caps[2].trim(),
            body,
        ))
    }

    pub fn extract_social(&self, content: &str) -> Option<SocialPost> {
        self.social_from_details(content)
            .or_else(|| self.social_from_bold(content))
            .or_else(|| self.social_from_preview(content))
    }

    fn social_from_details(&self, content: &str) -> Option<SocialPost> {
        let start = self.post_details.find(content)?.end();
        let section = take_until(&content[start..], &["\n##"]);

        let message_start = self.bullet_message.find(section)?.end();
        let message = non_empty(take_until_match(
            &section[message_start..],
            &self.bullet_message_end,
        ))?;

        Some(SocialPost {
            message,
            link: capture(&self.bullet_link, section),
            published: published_flag(capture(&self.bullet_published, section)),
        })
    }

    fn social_from_bold(&self, content: &str) -> Option<SocialPost> {
        let start = self.bold_message.find(content)?.end();
        let message = non_empty(take_until_match(&content[start..], &self.bold_message_end))?;

        Some(SocialPost {
            message,
            link: capture(&self.bold_link, content),
            published: published_flag(capture(&self.bold_published, content)),
        })
    }

    fn social_from_preview(&self, content: &str) -> Option<SocialPost> {
        let start = self.social_preview.find(content)?.end();
        let message = non_empty(take_until(&content[start..], &["\n\n", "\n##"]))?;
        Some(SocialPost {
            message,
            link: None,
            published: true,
        })
    }
}

/// Absent means published.
fn published_flag(value: Option<String>) -> bool {
    value.map_or(true, |v| v.eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::PlanGenerator;

    // =====================================================================
    // Steps
    // =====================================================================

    #[test]
    fn test_parse_steps_from_generated_plan() {
        let plan = PlanGenerator::new().generate(
            "t",
            "T",
            "Send an email to a@example.com, then post to Facebook",
        );
        let steps = PlanParser::new().parse_steps(&plan.render_body());
        assert_eq!(
            steps,
            vec![
                ParsedStep {
                    action: "Send email".to_string(),
                    action_tag: "send_email".to_string()
                },
                ParsedStep {
                    action: "Post to Facebook Page".to_string(),
                    action_tag: "post_facebook".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_parse_steps_stops_at_next_heading() {
        let body = "## Steps\n\n1. **Read required files** (action_type: file_read)\n\n\
                    ## Risks\n\n2. **Not a step** (action_type: file_delete)\n";
        let steps = PlanParser::new().parse_steps(body);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].action_tag, "file_read");
    }

    #[test]
    fn test_parse_steps_without_section() {
        assert!(PlanParser::new().parse_steps("# Nothing here").is_empty());
    }

    #[test]
    fn test_parse_steps_keeps_unknown_tags() {
        let body = "## Steps\n\n1. **Fly** (action_type: launch_rocket)\n";
        let steps = PlanParser::new().parse_steps(body);
        assert_eq!(steps[0].action_tag, "launch_rocket");
    }

    // =====================================================================
    // Email layouts
    // =====================================================================

    #[test]
    fn test_email_bullet_layout() {
        let content = "# Task\n\n- To: ops@example.com\n- Subject: Outage Update\n- Body:\n\n\
                       Systems are back.\nThanks.\n\n## Notes\nignored";
        let email = PlanParser::new().extract_email(content).unwrap();
        assert_eq!(email.to, "ops@example.com");
        assert_eq!(email.subject, "Outage Update");
        assert_eq!(email.body, "Systems are back.\nThanks.");
    }

    #[test]
    fn test_email_bold_layout() {
        let content = "**To:** ops@example.com\n**Subject:** Status\n**Body:**\nAll good.\n**Signature:** me";
        let email = PlanParser::new().extract_email(content).unwrap();
        assert_eq!(email.to, "ops@example.com");
        assert_eq!(email.subject, "Status");
        assert_eq!(email.body, "All good.");
    }

    #[test]
    fn test_email_from_generated_preview() {
        let plan = PlanGenerator::new().generate(
            "t",
            "T",
            "Send an email to ops@example.com about the outage, subject: Outage Update",
        );
        let email = PlanParser::new()
            .extract_email(&plan.render_body())
            .unwrap();
        assert_eq!(email.to, "ops@example.com");
        assert_eq!(email.subject, "Outage Update");
        assert!(email.body.starts_with("Send an email to ops@example.com"));
    }

    #[test]
    fn test_email_not_found() {
        assert!(PlanParser::new().extract_email("Just some text").is_none());
        // Recipient and subject alone are not enough.
        assert!(PlanParser::new()
            .extract_email("- To: a@example.com\n- Subject: Hi\n")
            .is_none());
    }

    // =====================================================================
    // Social layouts
    // =====================================================================

    #[test]
    fn test_social_post_details_layout() {
        let content = "**Post Details:**\n- Message: We are live!\n- Link: https://example.com\n\
                       - Published: false\n\n## Other";
        let post = PlanParser::new().extract_social(content).unwrap();
        assert_eq!(post.message, "We are live!");
        assert_eq!(post.link.as_deref(), Some("https://example.com"));
        assert!(!post.published);
    }

    #[test]
    fn test_social_post_details_defaults() {
        let content = "**Post Details:**\n- Message: Hello\nworld\n\nrest";
        let post = PlanParser::new().extract_social(content).unwrap();
        assert_eq!(post.message, "Hello\nworld");
        assert_eq!(post.link, None);
        assert!(post.published);
    }

    #[test]
    fn test_social_bold_layout() {
        let content = "**Message:**\nBig news today.\n**Link:** https://example.com/n\n**Published:** TRUE";
        let post = PlanParser::new().extract_social(content).unwrap();
        assert_eq!(post.message, "Big news today.");
        assert_eq!(post.link.as_deref(), Some("https://example.com/n"));
        assert!(post.published);
    }

    #[test]
    fn test_social_from_generated_preview() {
        let plan = PlanGenerator::new().generate("t", "T", "Post to Facebook: launch day");
        let post = PlanParser::new().extract_social(&plan.render_body()).unwrap();
        assert_eq!(post.message, "Post to Facebook: launch day");
        assert!(post.published);
    }

    #[test]
    fn test_social_not_found() {
        assert!(PlanParser::new().extract_social("no params").is_none());
    }

    #[test]
    fn test_shared_parser_is_compiled_once() {
        assert!(std::ptr::eq(PlanParser::shared(), PlanParser::shared()));
        let content = "- To: ops@example.com\n- Subject: Status\n- Body:\n\nAll good.";
        let email = PlanParser::shared().extract_email(content).unwrap();
        assert_eq!(email.to, "ops@example.com");
    }
}
