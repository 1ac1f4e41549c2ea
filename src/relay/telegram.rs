//! Telegram client using teloxide.

use std::path::Path;

use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{FileId, MessageId, ReplyParameters};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::relay::error::RelayError;
use crate::relay::transport::ChatTransport;

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn telegram_error(context: &str, e: impl std::fmt::Display) -> RelayError {
    let msg = format!("{context}: {e}");
    warn!("{}", msg);
    RelayError::Telegram(msg)
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn send_text(&self, chat_id: i64, text: &str, reply_to: Option<i32>) -> Result<(), RelayError> {
        // Plain text: model output is relayed as-is, no HTML/Markdown parsing.
        let mut request = self.bot.send_message(ChatId(chat_id), text);

        if let Some(msg_id) = reply_to {
            request = request.reply_parameters(ReplyParameters::new(MessageId(msg_id)));
        }

        request
            .await
            .map(|_| ())
            .map_err(|e| telegram_error("Failed to send", e))
    }

    async fn resolve_file(&self, file_id: &str) -> Result<String, RelayError> {
        let file = self
            .bot
            .get_file(FileId(file_id.to_string()))
            .await
            .map_err(|e| telegram_error("Failed to get file info", e))?;

        Ok(file.path)
    }

    async fn download(&self, remote_path: &str, dest: &Path) -> Result<(), RelayError> {
        let io_error = |source| RelayError::Io {
            path: dest.to_path_buf(),
            source,
        };

        let mut file = tokio::fs::File::create(dest).await.map_err(io_error)?;

        self.bot
            .download_file(remote_path, &mut file)
            .await
            .map_err(|e| telegram_error("Failed to download file", e))?;

        file.flush().await.map_err(io_error)?;

        info!("📥 File saved as {}", dest.display());
        Ok(())
    }
}
