use async_trait::async_trait;
use concierge_core::error::Result;
use concierge_telegram::bot::TelegramBot;

/// Outbound side of the chat transport.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;

    /// Send `text` as a reply to the user's message `reply_to`.
    async fn send_reply(&self, chat_id: i64, text: &str, reply_to: i64) -> Result<()>;
}

#[async_trait]
impl Messenger for TelegramBot {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        TelegramBot::send_message(self, chat_id, text).await
    }

    async fn send_reply(&self, chat_id: i64, text: &str, reply_to: i64) -> Result<()> {
        TelegramBot::send_reply(self, chat_id, text, reply_to).await
    }
}
