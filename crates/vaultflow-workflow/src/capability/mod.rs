//! External integrations the engine talks to.
//!
//! Only the interfaces live here. Real transports (SMTP, Graph API, IMAP)
//! are supplied by the embedding application; the dry-run implementations
//! log what they would have done.

pub mod dry_run;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use dry_run::{DryRunEmailSender, DryRunSocialPoster, EmptyMailSource};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    Plain,
    Html,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentType::Plain => write!(f, "text/plain"),
            ContentType::Html => write!(f, "text/html"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRequest {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub content_type: ContentType,
}

impl EmailRequest {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            cc: None,
            bcc: None,
            content_type: ContentType::Plain,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialPost {
    pub message: String,
    pub link: Option<String>,
    pub published: bool,
}

/// Result reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub success: bool,
    pub message: String,
    /// Message id or post id assigned by the remote side.
    pub external_id: Option<String>,
    /// Stable error code, e.g. `SMTP_AUTH_ERROR`.
    pub error_code: Option<String>,
}

impl DeliveryOutcome {
    pub fn delivered(message: impl Into<String>, external_id: Option<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            external_id,
            error_code: None,
        }
    }

    pub fn failed(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            external_id: None,
            error_code: Some(code.into()),
        }
    }
}

/// A message picked up from the inbound mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Mailbox-assigned id, stable across redeliveries.
    pub id: String,
    pub from: String,
    pub subject: String,
    pub date: String,
    pub body: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, request: &EmailRequest) -> DeliveryOutcome;
}

#[async_trait]
pub trait SocialPoster: Send + Sync {
    async fn post(&self, post: &SocialPost) -> DeliveryOutcome;
}

#[async_trait]
pub trait InboundMailSource: Send + Sync {
    /// Messages that arrived since the previous call.
    async fn fetch_new(&self) -> Result<Vec<InboundMessage>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_display() {
        assert_eq!(ContentType::Plain.to_string(), "text/plain");
        assert_eq!(ContentType::Html.to_string(), "text/html");
        assert_eq!(ContentType::default(), ContentType::Plain);
    }

    #[test]
    fn test_email_request_defaults() {
        let req = EmailRequest::new("ops@example.com", "Outage", "Body");
        assert_eq!(req.to, "ops@example.com");
        assert!(req.cc.is_none());
        assert!(req.bcc.is_none());
        assert_eq!(req.content_type, ContentType::Plain);
    }

    #[test]
    fn test_delivery_outcome_constructors() {
        let ok = DeliveryOutcome::delivered("Email sent", Some("<id@host>".to_string()));
        assert!(ok.success);
        assert!(ok.error_code.is_none());

        let failed = DeliveryOutcome::failed("SMTP_AUTH_ERROR", "bad credentials");
        assert!(!failed.success);
        assert_eq!(failed.error_code.as_deref(), Some("SMTP_AUTH_ERROR"));
        assert!(failed.external_id.is_none());
    }
}
