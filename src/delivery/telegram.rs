use super::DeliveryError;
use crate::settings::TelegramSettings;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";
/// Longest text the Bot API accepts in one message.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// A remote chat that receives compact answers.
pub trait MessageSink: Send + Sync {
    fn send(&self, text: &str) -> Result<(), DeliveryError>;
}

#[derive(Deserialize)]
struct SendMessageResponse {
    #[serde(default)]
    ok: bool,
    description: Option<String>,
}

pub struct TelegramSink {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramSink {
    /// `fallback_chat_id` is used when the settings name no chat, e.g. the
    /// chat stored with the local session.
    pub fn new(
        settings: &TelegramSettings,
        fallback_chat_id: Option<String>,
    ) -> Result<Self, DeliveryError> {
        let bot_token = settings
            .bot_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or(DeliveryError::NotConfigured("TELEGRAM_BOT_TOKEN is missing"))?;
        let chat_id = settings
            .chat_id
            .clone()
            .or(fallback_chat_id)
            .filter(|c| !c.trim().is_empty())
            .ok_or(DeliveryError::NotConfigured("TELEGRAM_CHAT_ID is missing"))?;
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            bot_token,
            chat_id,
        })
    }
}

/// Cut `text` to the Bot API message limit.
pub fn clip_message(text: &str) -> &str {
    match text.char_indices().nth(MAX_MESSAGE_CHARS) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

impl MessageSink for TelegramSink {
    fn send(&self, text: &str) -> Result<(), DeliveryError> {
        if text.trim().is_empty() {
            return Err(DeliveryError::Empty);
        }
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let payload = json!({
            "chat_id": self.chat_id,
            "text": clip_message(text),
            "parse_mode": "Markdown",
        });
        let resp = self.client.post(url).json(&payload).send()?;
        let status = resp.status();
        let body = resp.text()?;
        tracing::debug!(status = status.as_u16(), "telegram response: {body}");
        if status.as_u16() != 200 {
            return Err(DeliveryError::Http {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: SendMessageResponse = serde_json::from_str(&body)
            .map_err(|e| DeliveryError::Rejected(format!("malformed response: {e}")))?;
        if !parsed.ok {
            return Err(DeliveryError::Rejected(
                parsed.description.unwrap_or_else(|| "ok=false".into()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_messages_are_clipped_by_characters() {
        let text = "я".repeat(MAX_MESSAGE_CHARS + 10);
        assert_eq!(clip_message(&text).chars().count(), MAX_MESSAGE_CHARS);
        assert_eq!(clip_message("short"), "short");
    }

    #[test]
    fn missing_credentials_are_reported() {
        let settings = TelegramSettings::default();
        assert!(matches!(
            TelegramSink::new(&settings, None),
            Err(DeliveryError::NotConfigured(_))
        ));
        let settings = TelegramSettings {
            bot_token: Some("123:abc".into()),
            ..Default::default()
        };
        assert!(TelegramSink::new(&settings, None).is_err());
        assert!(TelegramSink::new(&settings, Some("42".into())).is_ok());
    }
}
