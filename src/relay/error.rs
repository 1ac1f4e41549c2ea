use std::path::PathBuf;

use crate::relay::gemini::GeminiError;

/// Anything that can go wrong while relaying one voice message.
///
/// None of these reach the chat: the pipeline logs them and answers
/// with a fixed failure text.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("telegram: {0}")]
    Telegram(String),
    #[error("local file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("gemini: {0}")]
    Gemini(#[from] GeminiError),
}
