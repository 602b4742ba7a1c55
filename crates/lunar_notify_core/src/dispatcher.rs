//! crates/lunar_notify_core/src/dispatcher.rs
//!
//! Delivers a rendered reminder over every channel the owner has enabled and
//! the process has credentials for. Each channel gets one bounded attempt.

use crate::domain::Owner;
use crate::message::RenderedMessage;
use crate::ports::{EmailSender, PortError, PortResult, TelegramSender};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Result of one channel's delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    Sent,
    Failed(String),
    /// The owner has the channel off, or credentials are missing.
    NotConfigured,
}

impl ChannelOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, ChannelOutcome::Sent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub telegram: ChannelOutcome,
    pub email: ChannelOutcome,
}

impl DispatchOutcome {
    /// True iff at least one channel delivered.
    pub fn overall_success(&self) -> bool {
        self.telegram.is_sent() || self.email.is_sent()
    }
}

/// The outbound channels plus the per-call timeout.
#[derive(Clone)]
pub struct Channels {
    telegram: Arc<dyn TelegramSender>,
    email: Arc<dyn EmailSender>,
    timeout: Duration,
}

impl Channels {
    pub fn new(
        telegram: Arc<dyn TelegramSender>,
        email: Arc<dyn EmailSender>,
        timeout: Duration,
    ) -> Self {
        Self {
            telegram,
            email,
            timeout,
        }
    }

    /// Chat id to deliver to, if Telegram is usable for this owner.
    pub fn telegram_target<'a>(&self, owner: &'a Owner) -> Option<&'a str> {
        if !owner.telegram_notifications || !self.telegram.is_configured() {
            return None;
        }
        owner
            .telegram_chat_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Address to deliver to, if email is usable for this owner.
    pub fn email_target<'a>(&self, owner: &'a Owner) -> Option<&'a str> {
        if !owner.email_notifications || !self.email.is_configured() {
            return None;
        }
        owner
            .email
            .as_deref()
            .map(str::trim)
            .filter(|address| !address.is_empty())
    }

    pub fn has_deliverable_channel(&self, owner: &Owner) -> bool {
        self.telegram_target(owner).is_some() || self.email_target(owner).is_some()
    }

    /// Sends over every usable channel concurrently and reports per-channel outcomes.
    pub async fn dispatch(&self, owner: &Owner, message: &RenderedMessage) -> DispatchOutcome {
        let telegram = async {
            match self.telegram_target(owner) {
                Some(chat_id) => {
                    self.attempt("telegram", self.telegram.send(chat_id, &message.text))
                        .await
                }
                None => ChannelOutcome::NotConfigured,
            }
        };
        let email = async {
            match self.email_target(owner) {
                Some(address) => {
                    self.attempt(
                        "email",
                        self.email.send(
                            address,
                            &message.email_subject,
                            &message.email_html,
                            &message.text,
                        ),
                    )
                    .await
                }
                None => ChannelOutcome::NotConfigured,
            }
        };

        let (telegram, email) = futures::join!(telegram, email);
        DispatchOutcome { telegram, email }
    }

    /// The manual "send test message" action. Errors are returned, not swallowed.
    pub async fn send_test_message(&self, owner: &Owner) -> PortResult<()> {
        if !self.telegram.is_configured() {
            return Err(PortError::NotConfigured("Telegram bot token".to_string()));
        }
        let chat_id = owner
            .telegram_chat_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PortError::NotConfigured("Telegram chat id".to_string()))?;

        let message = "Test message: your calendar reminders will arrive in this chat.";
        self.bounded(self.telegram.send(chat_id, message)).await
    }

    async fn attempt<F>(&self, channel: &str, send: F) -> ChannelOutcome
    where
        F: Future<Output = PortResult<()>>,
    {
        match self.bounded(send).await {
            Ok(()) => {
                info!("Delivered via {}", channel);
                ChannelOutcome::Sent
            }
            Err(e) => {
                warn!("Delivery via {} failed: {}", channel, e);
                ChannelOutcome::Failed(e.to_string())
            }
        }
    }

    async fn bounded<F>(&self, send: F) -> PortResult<()>
    where
        F: Future<Output = PortResult<()>>,
    {
        tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| PortError::Timeout(format!("no response after {:?}", self.timeout)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{owner, FakeEmail, FakeTelegram};

    fn message() -> RenderedMessage {
        RenderedMessage {
            text: "hello".into(),
            email_subject: "subject".into(),
            email_html: "<p>hello</p>".into(),
        }
    }

    fn channels(telegram: &Arc<FakeTelegram>, email: &Arc<FakeEmail>) -> Channels {
        Channels::new(telegram.clone(), email.clone(), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn one_channel_success_is_overall_success() {
        let telegram = Arc::new(FakeTelegram::working());
        let email = Arc::new(FakeEmail::failing());
        let outcome = channels(&telegram, &email).dispatch(&owner(), &message()).await;

        assert_eq!(outcome.telegram, ChannelOutcome::Sent);
        assert!(matches!(outcome.email, ChannelOutcome::Failed(_)));
        assert!(outcome.overall_success());
        assert_eq!(telegram.sent().len(), 1);
    }

    #[tokio::test]
    async fn all_failures_are_overall_failure() {
        let telegram = Arc::new(FakeTelegram::failing());
        let email = Arc::new(FakeEmail::failing());
        let outcome = channels(&telegram, &email).dispatch(&owner(), &message()).await;
        assert!(!outcome.overall_success());
    }

    #[tokio::test]
    async fn disabled_or_unconfigured_channels_are_skipped() {
        let telegram = Arc::new(FakeTelegram::unconfigured());
        let email = Arc::new(FakeEmail::working());
        let mut recipient = owner();
        recipient.email_notifications = false;

        let channels = channels(&telegram, &email);
        assert!(!channels.has_deliverable_channel(&recipient));

        let outcome = channels.dispatch(&recipient, &message()).await;
        assert_eq!(outcome.telegram, ChannelOutcome::NotConfigured);
        assert_eq!(outcome.email, ChannelOutcome::NotConfigured);
        assert!(!outcome.overall_success());
        assert!(email.sent().is_empty());
    }

    #[tokio::test]
    async fn blank_chat_id_disables_telegram() {
        let telegram = Arc::new(FakeTelegram::working());
        let email = Arc::new(FakeEmail::working());
        let mut recipient = owner();
        recipient.telegram_chat_id = Some("  ".into());

        assert!(channels(&telegram, &email).telegram_target(&recipient).is_none());
    }

    #[tokio::test]
    async fn stuck_channel_times_out() {
        let telegram = Arc::new(FakeTelegram::stalling(Duration::from_secs(5)));
        let email = Arc::new(FakeEmail::working());
        let outcome = channels(&telegram, &email).dispatch(&owner(), &message()).await;

        assert!(matches!(outcome.telegram, ChannelOutcome::Failed(_)));
        assert_eq!(outcome.email, ChannelOutcome::Sent);
    }

    #[tokio::test]
    async fn test_message_reports_missing_setup() {
        let telegram = Arc::new(FakeTelegram::unconfigured());
        let email = Arc::new(FakeEmail::working());
        let err = channels(&telegram, &email)
            .send_test_message(&owner())
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::NotConfigured(_)));

        let telegram = Arc::new(FakeTelegram::failing());
        let err = channels(&telegram, &email)
            .send_test_message(&owner())
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Unexpected(_)));
    }
}
