//! The relay context and the per-message voice pipeline.
//!
//! One voice note goes through: acknowledge, resolve and download to a
//! temporary artifact, upload to the model, generate, reply. Any failure
//! along the way is logged and turned into one fixed apology; the artifact
//! is removed on every exit path.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::relay::artifact::{AudioFormat, TempArtifact};
use crate::relay::error::RelayError;
use crate::relay::gemini::TRANSCRIBE_PROMPT;
use crate::relay::transport::{ChatTransport, SpeechModel};

pub const GREETING: &str =
    "Привет! Отправь мне голосовое сообщение, и я его транскрибирую и сделаю summary.";
pub const ACKNOWLEDGMENT: &str = "Голосовое сообщение получено. Начинаю обработку...";
pub const FAILURE_REPLY: &str =
    "К сожалению, произошла ошибка при обработке вашего сообщения. Попробуйте еще раз позже.";

/// Telegram's limit on the length of one text message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// A voice note as seen by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceNote {
    pub chat_id: i64,
    /// The voice message itself; acknowledgment and apology reply to it.
    pub message_id: i32,
    pub file_id: String,
    pub mime_type: Option<String>,
}

/// Everything a handler needs, built once at startup and shared by all handlers.
pub struct Relay {
    transport: Arc<dyn ChatTransport>,
    model: Arc<dyn SpeechModel>,
    work_dir: PathBuf,
}

impl Relay {
    pub fn new(transport: Arc<dyn ChatTransport>, model: Arc<dyn SpeechModel>, work_dir: PathBuf) -> Self {
        Self {
            transport,
            model,
            work_dir,
        }
    }

    /// Answer `/start` with the greeting.
    pub async fn handle_start(&self, chat_id: i64) {
        if let Err(e) = self.transport.send_text(chat_id, GREETING, None).await {
            warn!("Failed to send greeting to {chat_id}: {e}");
        }
    }

    /// Run the voice pipeline for one message. Never fails: errors end in the apology.
    pub async fn handle_voice(&self, voice: VoiceNote) {
        let format = AudioFormat::from_mime(voice.mime_type.as_deref());
        let artifact = TempArtifact::reserve(&self.work_dir, format.extension);

        if let Err(e) = self.process(&voice, &artifact, format).await {
            error!("Failed to process voice message {} in chat {}: {e}", voice.message_id, voice.chat_id);
            if let Err(e) = self
                .transport
                .send_text(voice.chat_id, FAILURE_REPLY, Some(voice.message_id))
                .await
            {
                warn!("Failed to deliver failure reply to {}: {e}", voice.chat_id);
            }
        }
        // `artifact` drops here and removes the downloaded file.
    }

    async fn process(&self, voice: &VoiceNote, artifact: &TempArtifact, format: AudioFormat) -> Result<(), RelayError> {
        self.transport
            .send_text(voice.chat_id, ACKNOWLEDGMENT, Some(voice.message_id))
            .await?;

        let remote_path = self.transport.resolve_file(&voice.file_id).await?;
        self.transport.download(&remote_path, artifact.path()).await?;

        let file = self.model.upload(artifact.path(), format.mime_type).await?;
        let text = self.model.generate(TRANSCRIBE_PROMPT, &file).await?;

        for chunk in split_message(&text, MAX_MESSAGE_CHARS) {
            self.transport.send_text(voice.chat_id, chunk, None).await?;
        }
        info!("Result sent to chat {}", voice.chat_id);
        Ok(())
    }
}

/// Split `text` into consecutive pieces of at most `max_chars` characters.
///
/// Prefers to cut right after a newline. Concatenating the pieces gives
/// back `text` unchanged.
pub fn split_message(text: &str, max_chars: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > max_chars {
        // Byte offset just past the `max_chars`-th character.
        let hard_end = rest
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());

        let end = match rest[..hard_end].rfind('\n') {
            Some(nl) if nl > 0 => nl + 1,
            _ => hard_end,
        };

        let (head, tail) = rest.split_at(end);
        chunks.push(head);
        rest = tail;
    }

    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest);
    }
    chunks
}
