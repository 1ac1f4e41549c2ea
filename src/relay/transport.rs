//! Seams between the pipeline and the two external services.

use std::path::Path;

use async_trait::async_trait;

use crate::relay::error::RelayError;

/// Chat side: the bot transport.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send plain text to a chat, optionally as a reply to one of its messages.
    async fn send_text(&self, chat_id: i64, text: &str, reply_to: Option<i32>) -> Result<(), RelayError>;

    /// Resolve a file reference to a server-side download path.
    async fn resolve_file(&self, file_id: &str) -> Result<String, RelayError>;

    /// Fetch the file at `remote_path` into a new local file at `dest`.
    async fn download(&self, remote_path: &str, dest: &Path) -> Result<(), RelayError>;
}

/// Model side: file ingestion plus a single completion call.
#[async_trait]
pub trait SpeechModel: Send + Sync {
    async fn upload(&self, path: &Path, mime_type: &str) -> Result<RemoteFile, RelayError>;

    async fn generate(&self, prompt: &str, file: &RemoteFile) -> Result<String, RelayError>;
}

/// Handle to a file already ingested by the model service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Resource name, e.g. `files/abc123`.
    pub name: String,
    pub uri: String,
    pub mime_type: String,
}
