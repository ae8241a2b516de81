use concierge_core::error::{ConciergeError, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::types::*;

const MAX_MESSAGE_LENGTH: usize = 4096;

/// Minimal Telegram Bot API client: long polling and plain-text replies.
pub struct TelegramBot {
    client: Client,
    base_url: String,
}

impl TelegramBot {
    pub fn new(token: String) -> Self {
        let base_url = format!("https://api.telegram.org/bot{token}");
        Self {
            client: Client::new(),
            base_url,
        }
    }

    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", &serde_json::json!({})).await
    }

    pub async fn get_updates(&self, offset: i64, timeout: u32) -> Result<Vec<Update>> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": timeout,
            "allowed_updates": ["message"],
        });
        self.call("getUpdates", &body).await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        for chunk in split_message(text) {
            let body = serde_json::json!({
                "chat_id": chat_id,
                "text": chunk,
            });
            self.call::<serde_json::Value>("sendMessage", &body).await?;
        }
        Ok(())
    }

    /// Send a message quoting `reply_to`. Only the first chunk carries the quote.
    pub async fn send_reply(&self, chat_id: i64, text: &str, reply_to: i64) -> Result<()> {
        for (i, chunk) in split_message(text).into_iter().enumerate() {
            let mut body = serde_json::json!({
                "chat_id": chat_id,
                "text": chunk,
            });
            if i == 0 {
                body["reply_parameters"] = serde_json::json!({
                    "message_id": reply_to,
                    "allow_sending_without_reply": true,
                });
            }
            self.call::<serde_json::Value>("sendMessage", &body).await?;
        }
        Ok(())
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &serde_json::Value) -> Result<T> {
        let url = format!("{}/{method}", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ConciergeError::Telegram(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConciergeError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let telegram_response: TelegramResponse<T> = response
            .json()
            .await
            .map_err(|e| ConciergeError::Telegram(e.to_string()))?;

        if !telegram_response.ok {
            return Err(ConciergeError::Telegram(
                telegram_response
                    .description
                    .unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        telegram_response
            .result
            .ok_or_else(|| ConciergeError::Telegram(format!("missing result in {method} response")))
    }
}

/// Split text into chunks of at most `MAX_MESSAGE_LENGTH` bytes, preferring
/// line breaks and never cutting a UTF-8 sequence.
fn split_message(text: &str) -> Vec<String> {
    if text.len() <= MAX_MESSAGE_LENGTH {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= MAX_MESSAGE_LENGTH {
            chunks.push(remaining.to_string());
            break;
        }

        let mut limit = MAX_MESSAGE_LENGTH;
        while !remaining.is_char_boundary(limit) {
            limit -= 1;
        }

        let split_pos = match remaining[..limit].rfind('\n') {
            Some(pos) => pos + 1,
            None => limit,
        };

        chunks.push(remaining[..split_pos].to_string());
        remaining = &remaining[split_pos..];
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_message_single_chunk() {
        assert_eq!(split_message("hello"), vec!["hello".to_string()]);
    }

    #[test]
    fn test_split_prefers_newlines() {
        let line = "a".repeat(3000);
        let text = format!("{line}\n{line}");
        let chunks = split_message(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], format!("{line}\n"));
        assert_eq!(chunks[1], line);
    }

    #[test]
    fn test_split_keeps_utf8_intact() {
        // Two bytes per char, no newlines: 4096 is a boundary only by luck, so use an odd offset.
        let text = format!("x{}", "ж".repeat(3000));
        let chunks = split_message(&text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= MAX_MESSAGE_LENGTH));
        assert_eq!(chunks.concat(), text);
    }
}
