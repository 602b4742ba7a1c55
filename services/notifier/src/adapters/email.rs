//! services/notifier/src/adapters/email.rs
//!
//! SMTP sender built on `lettre`. Each reminder is a multipart/alternative
//! message carrying both the plain-text and the HTML rendering.

use crate::config::SmtpConfig;
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use lunar_notify_core::ports::{EmailSender, PortError, PortResult};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct SmtpEmailAdapter {
    mailer: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from_address: Option<String>,
}

impl SmtpEmailAdapter {
    /// Builds the transport when host and username are both present; otherwise
    /// the adapter reports itself unconfigured.
    pub fn new(config: &SmtpConfig, timeout: Duration) -> PortResult<Self> {
        let (Some(host), Some(username)) = (config.host.as_deref(), config.username.as_deref())
        else {
            if config.username.is_some() {
                warn!("SMTP_USERNAME is set but SMTP_HOST is missing; email disabled");
            }
            return Ok(Self {
                mailer: None,
                from_address: None,
            });
        };

        let credentials = Credentials::new(
            username.to_string(),
            config.password.clone().unwrap_or_default(),
        );
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| PortError::Unexpected(format!("SMTP relay: {}", e)))?
            .port(config.port)
            .credentials(credentials)
            .timeout(Some(timeout))
            .build();

        Ok(Self {
            mailer: Some(mailer),
            from_address: Some(
                config
                    .from_email
                    .clone()
                    .unwrap_or_else(|| username.to_string()),
            ),
        })
    }
}

fn build_message(
    from: &str,
    to: &str,
    subject: &str,
    html_body: &str,
    text_body: &str,
) -> PortResult<Message> {
    let from: Mailbox = from
        .parse()
        .map_err(|e| PortError::Unexpected(format!("Invalid sender address: {}", e)))?;
    let to: Mailbox = to
        .parse()
        .map_err(|e| PortError::Unexpected(format!("Invalid recipient address: {}", e)))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(text_body.to_string()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(html_body.to_string()),
                ),
        )
        .map_err(|e| PortError::Unexpected(format!("Build email: {}", e)))
}

#[async_trait]
impl EmailSender for SmtpEmailAdapter {
    fn is_configured(&self) -> bool {
        self.mailer.is_some()
    }

    async fn send(
        &self,
        to_address: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> PortResult<()> {
        let (Some(mailer), Some(from)) = (self.mailer.as_ref(), self.from_address.as_deref()) else {
            return Err(PortError::NotConfigured("SMTP credentials".to_string()));
        };

        let email = build_message(from, to_address, subject, html_body, text_body)?;
        mailer
            .send(email)
            .await
            .map_err(|e| PortError::Unexpected(format!("SMTP send: {}", e)))?;
        debug!("Email delivered to {}", to_address);
        Ok(())
    }
}
