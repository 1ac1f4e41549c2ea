//! Dispatch of incoming Telegram updates to the relay.

use std::sync::Arc;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::info;

use crate::relay::pipeline::{Relay, VoiceNote};

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    #[command(description = "greeting and usage")]
    Start,
}

/// Extract the pipeline's view of a voice message, if `msg` carries one.
pub fn voice_note(msg: &Message) -> Option<VoiceNote> {
    let voice = msg.voice()?;
    Some(VoiceNote {
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
        file_id: voice.file.id.0.clone(),
        mime_type: voice.mime_type.as_ref().map(|m| m.to_string()),
    })
}

/// Update tree: `/start` goes to the greeting, voice notes to the pipeline,
/// everything else is dropped.
pub fn schema() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(dptree::filter_map(|msg: Message| voice_note(&msg)).endpoint(handle_voice))
}

async fn handle_command(msg: Message, cmd: Command, relay: Arc<Relay>) -> ResponseResult<()> {
    match cmd {
        Command::Start => {
            info!("👋 /start from chat {}", msg.chat.id);
            relay.handle_start(msg.chat.id.0).await;
        }
    }
    Ok(())
}

async fn handle_voice(voice: VoiceNote, relay: Arc<Relay>) -> ResponseResult<()> {
    info!("🎤 Voice message {} from chat {}", voice.message_id, voice.chat_id);
    relay.handle_voice(voice).await;
    Ok(())
}
