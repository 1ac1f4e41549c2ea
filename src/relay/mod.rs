//! Relay module - voice notes from Telegram to Gemini and back.

pub mod artifact;
pub mod error;
pub mod gemini;
pub mod pipeline;
pub mod router;
pub mod telegram;
pub mod transport;


pub use error::RelayError;
pub use gemini::GeminiClient;
pub use pipeline::{Relay, VoiceNote};
pub use telegram::TelegramClient;
pub use transport::{ChatTransport, RemoteFile, SpeechModel};
