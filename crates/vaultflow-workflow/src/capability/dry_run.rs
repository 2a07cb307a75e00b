//! Log-only transports for running without real integrations.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::info;

use super::{
    DeliveryOutcome, EmailRequest, EmailSender, InboundMailSource, InboundMessage, SocialPost,
    SocialPoster,
};
use crate::error::Result;

/// Pretends to send email and always succeeds.
#[derive(Debug, Default)]
pub struct DryRunEmailSender {
    sent: AtomicU64,
}

impl DryRunEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmailSender for DryRunEmailSender {
    async fn send(&self, request: &EmailRequest) -> DeliveryOutcome {
        let n = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            to = %request.to,
            subject = %request.subject,
            content_type = %request.content_type,
            body_len = request.body.len(),
            "Dry run: email not sent"
        );
        DeliveryOutcome::delivered(
            format!("Dry run: email to {} recorded", request.to),
            Some(format!("dry-run-email-{}", n)),
        )
    }
}

/// Pretends to publish posts and always succeeds.
#[derive(Debug, Default)]
pub struct DryRunSocialPoster {
    posted: AtomicU64,
}

impl DryRunSocialPoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn posted_count(&self) -> u64 {
        self.posted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SocialPoster for DryRunSocialPoster {
    async fn post(&self, post: &SocialPost) -> DeliveryOutcome {
        let n = self.posted.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            message_len = post.message.len(),
            link = post.link.as_deref().unwrap_or("-"),
            published = post.published,
            "Dry run: post not published"
        );
        DeliveryOutcome::delivered("Dry run: post recorded", Some(format!("dry-run-post-{}", n)))
    }
}

/// Mailbox that never has new mail.
#[derive(Debug, Default)]
pub struct EmptyMailSource;

#[async_trait]
impl InboundMailSource for EmptyMailSource {
    async fn fetch_new(&self) -> Result<Vec<InboundMessage>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dry_run_email_counts_and_succeeds() {
        let sender = DryRunEmailSender::new();
        let outcome = sender
            .send(&EmailRequest::new("a@example.com", "Hi", "Body"))
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.external_id.as_deref(), Some("dry-run-email-1"));
        assert_eq!(sender.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_post() {
        let poster = DryRunSocialPoster::new();
        let outcome = poster
            .post(&SocialPost {
                message: "Launch day".to_string(),
                link: None,
                published: true,
            })
            .await;
        assert!(outcome.success);
        assert_eq!(poster.posted_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_mail_source() {
        assert!(EmptyMailSource.fetch_new().await.unwrap().is_empty());
    }
}
