//! services/notifier/src/adapters/telegram.rs
//!
//! Telegram Bot API sender: one `sendMessage` call per reminder.

use crate::config::TelegramConfig;
use async_trait::async_trait;
use lunar_notify_core::ports::{PortError, PortResult, TelegramSender};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Bot API rejects texts longer than this many characters.
const MAX_MESSAGE_CHARS: usize = 4096;

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Clone)]
pub struct TelegramBotAdapter {
    client: reqwest::Client,
    bot_token: Option<String>,
    api_url: String,
}

impl TelegramBotAdapter {
    pub fn new(config: &TelegramConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            bot_token: config.bot_token.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn method_url(&self, token: &str, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, token, method)
    }
}

fn truncate(message: &str) -> &str {
    match message.char_indices().nth(MAX_MESSAGE_CHARS) {
        Some((cut, _)) => &message[..cut],
        None => message,
    }
}

#[async_trait]
impl TelegramSender for TelegramBotAdapter {
    fn is_configured(&self) -> bool {
        self.bot_token.is_some()
    }

    async fn send(&self, chat_id: &str, message: &str) -> PortResult<()> {
        let token = self
            .bot_token
            .as_deref()
            .ok_or_else(|| PortError::NotConfigured("Telegram bot token".to_string()))?;

        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": truncate(message),
            "disable_web_page_preview": true,
        });

        let response = self
            .client
            .post(self.method_url(token, "sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PortError::Timeout(format!("sendMessage: {}", e.without_url()))
                } else {
                    PortError::Unexpected(format!("sendMessage failed: {}", e.without_url()))
                }
            })?;

        let status = response.status();
        let result: ApiResponse = response.json().await.map_err(|e| {
            PortError::Unexpected(format!("Invalid sendMessage response ({}): {}", status, e.without_url()))
        })?;

        if !result.ok {
            return Err(PortError::Unexpected(format!(
                "Telegram rejected the message: {}",
                result.description.unwrap_or_else(|| status.to_string())
            )));
        }
        debug!("Telegram message delivered to chat {}", chat_id);
        Ok(())
    }
}
