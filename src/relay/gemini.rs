//! Gemini API client: File API upload plus generateContent.

use std::path::Path;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::relay::error::RelayError;
use crate::relay::transport::{RemoteFile, SpeechModel};

/// Instruction sent alongside every voice note.
pub const TRANSCRIBE_PROMPT: &str = "Твоя задача — послушать аудио, сделать полную транскрипцию текста, \
     а затем выделить 3-4 ключевых пункта (summary). Ответь на русском языке.";

#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),
    #[error("API error {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("failed to parse response: {0}")]
    Parse(String),
    #[error("upload session URL missing from response")]
    MissingUploadUrl,
    #[error("prompt blocked: {0}")]
    Blocked(String),
    #[error("no text in response")]
    Empty,
}

impl From<reqwest::Error> for GeminiError {
    /// Request URLs carry upload session ids; keep them out of logs.
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.without_url())
    }
}

pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct StartUpload<'a> {
    file: UploadMetadata<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadMetadata<'a> {
    display_name: &'a str,
}

#[derive(Deserialize, Debug)]
struct UploadResponse {
    file: UploadedFile,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct UploadedFile {
    name: String,
    uri: String,
    mime_type: Option<String>,
    state: Option<String>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum Part<'a> {
    Text(&'a str),
    FileData(FileData<'a>),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData<'a> {
    mime_type: &'a str,
    file_uri: &'a str,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(client: reqwest::Client, api_key: String, model: String, base_url: String) -> Self {
        Self {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Upload file contents through the resumable File API.
    pub async fn upload_file(
        &self,
        display_name: &str,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> Result<RemoteFile, GeminiError> {
        debug!("Starting upload of {display_name} ({} bytes, {mime_type})", bytes.len());

        let start = self
            .client
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&StartUpload { file: UploadMetadata { display_name } })
            .send()
            .await?;

        let status = start.status();
        if !status.is_success() {
            let body = start.text().await.unwrap_or_default();
            return Err(GeminiError::Api { status, body });
        }

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(GeminiError::MissingUploadUrl)?;

        let response = self
            .client
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GeminiError::Api { status, body });
        }

        let parsed: UploadResponse =
            serde_json::from_str(&body).map_err(|e| GeminiError::Parse(e.to_string()))?;

        debug!("Uploaded {} (state: {:?})", parsed.file.name, parsed.file.state);

        Ok(RemoteFile {
            name: parsed.file.name,
            uri: parsed.file.uri,
            mime_type: parsed.file.mime_type.unwrap_or_else(|| mime_type.to_string()),
        })
    }

    /// Single non-streaming completion over a prompt and one uploaded file.
    pub async fn generate_content(&self, prompt: &str, file: &RemoteFile) -> Result<String, GeminiError> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::Text(prompt),
                    Part::FileData(FileData {
                        mime_type: &file.mime_type,
                        file_uri: &file.uri,
                    }),
                ],
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        debug!("Gemini response status: {status}");

        if !status.is_success() {
            return Err(GeminiError::Api { status, body });
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).map_err(|e| GeminiError::Parse(e.to_string()))?;

        extract_text(parsed)
    }
}

fn extract_text(response: GenerateResponse) -> Result<String, GeminiError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(GeminiError::Blocked(reason));
    }

    let text: String = response
        .candidates
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(GeminiError::Empty);
    }
    Ok(text)
}

#[async_trait]
impl SpeechModel for GeminiClient {
    async fn upload(&self, path: &Path, mime_type: &str) -> Result<RemoteFile, RelayError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| RelayError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let display_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("voice");

        let file = self.upload_file(display_name, bytes, mime_type).await?;
        info!("File {} uploaded to Gemini as {}", path.display(), file.name);
        Ok(file)
    }

    async fn generate(&self, prompt: &str, file: &RemoteFile) -> Result<String, RelayError> {
        Ok(self.generate_content(prompt, file).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GeminiClient {
        GeminiClient::new(
            reqwest::Client::new(),
            "test-key".into(),
            "gemini-2.5-flash".into(),
            server.uri(),
        )
    }

    fn remote_file() -> RemoteFile {
        RemoteFile {
            name: "files/abc123".into(),
            uri: "https://generativelanguage.googleapis.com/v1beta/files/abc123".into(),
            mime_type: "audio/ogg".into(),
        }
    }

    #[test]
    fn test_request_shape() {
        let file = remote_file();
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::Text("listen"),
                    Part::FileData(FileData { mime_type: &file.mime_type, file_uri: &file.uri }),
                ],
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "listen");
        assert_eq!(json["contents"][0]["parts"][1]["fileData"]["mimeType"], "audio/ogg");
        assert_eq!(json["contents"][0]["parts"][1]["fileData"]["fileUri"], file.uri);
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let response: GenerateResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "Транскрипция: привет. "}, {"text": "Summary: 1) привет"}]}}]
        }))
        .unwrap();
        assert_eq!(extract_text(response).unwrap(), "Транскрипция: привет. Summary: 1) привет");
    }

    #[test]
    fn test_extract_text_blocked() {
        let response: GenerateResponse = serde_json::from_value(serde_json::json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        assert!(matches!(extract_text(response), Err(GeminiError::Blocked(r)) if r == "SAFETY"));
    }

    #[test]
    fn test_extract_text_empty() {
        let response: GenerateResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"content": {"parts": []}}]
        }))
        .unwrap();
        assert!(matches!(extract_text(response), Err(GeminiError::Empty)));

        let response: GenerateResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(matches!(extract_text(response), Err(GeminiError::Empty)));
    }

    #[tokio::test]
    async fn test_upload_file_resumable() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/upload/v1beta/files"))
            .and(header("x-goog-api-key", "test-key"))
            .and(header("X-Goog-Upload-Protocol", "resumable"))
            .and(header("X-Goog-Upload-Command", "start"))
            .and(header("X-Goog-Upload-Header-Content-Type", "audio/ogg"))
            .and(header("X-Goog-Upload-Header-Content-Length", "4"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-goog-upload-url", format!("{}/upload-session/1", server.uri()).as_str()),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/upload-session/1"))
            .and(header("X-Goog-Upload-Offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "file": {
                    "name": "files/abc123",
                    "uri": "https://generativelanguage.googleapis.com/v1beta/files/abc123",
                    "mimeType": "audio/ogg",
                    "state": "ACTIVE"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let file = client(&server)
            .upload_file("voice.ogg", b"OggS".to_vec(), "audio/ogg")
            .await
            .unwrap();
        assert_eq!(file, remote_file());
    }

    #[tokio::test]
    async fn test_upload_without_session_url() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/upload/v1beta/files"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let result = client(&server)
            .upload_file("voice.ogg", b"OggS".to_vec(), "audio/ogg")
            .await;
        assert!(matches!(result, Err(GeminiError::MissingUploadUrl)));
    }

    #[tokio::test]
    async fn test_upload_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
            .mount(&server)
            .await;

        let result = client(&server)
            .upload_file("voice.ogg", b"OggS".to_vec(), "audio/ogg")
            .await;
        match result {
            Err(GeminiError::Api { status, body }) => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert!(body.contains("API key"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_upload_through_trait_reads_local_file() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/upload/v1beta/files"))
            .and(header("X-Goog-Upload-Header-Content-Length", "11"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-goog-upload-url", format!("{}/upload-session/2", server.uri()).as_str()),
            )
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/upload-session/2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "file": {"name": "files/xyz", "uri": "https://example.test/files/xyz"}
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("voice.mp3");
        std::fs::write(&audio, b"ID3 payload").unwrap();

        let file = client(&server).upload(&audio, "audio/mpeg").await.unwrap();
        assert_eq!(file.name, "files/xyz");
        // Falls back to the declared type when the API omits it.
        assert_eq!(file.mime_type, "audio/mpeg");
    }

    #[tokio::test]
    async fn test_upload_missing_local_file() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        let result = client(&server).upload(&dir.path().join("gone.ogg"), "audio/ogg").await;
        assert!(matches!(result, Err(RelayError::Io { .. })));
    }

    #[tokio::test]
    async fn test_generate_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "contents": [{"parts": [{"text": TRANSCRIBE_PROMPT}, {"fileData": {"mimeType": "audio/ogg"}}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "Транскрипция: ... Summary: 1) ... 2) ..."}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client(&server)
            .generate_content(TRANSCRIBE_PROMPT, &remote_file())
            .await
            .unwrap();
        assert_eq!(text, "Транскрипция: ... Summary: 1) ... 2) ...");
    }

    #[tokio::test]
    async fn test_generate_content_server_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
            .mount(&server)
            .await;

        let result = client(&server).generate_content(TRANSCRIBE_PROMPT, &remote_file()).await;
        assert!(matches!(result, Err(GeminiError::Api { status, .. }) if status == StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn test_transport_errors_do_not_expose_api_key() {
        let base = {
            let server = MockServer::start().await;
            server.uri()
        };
        let client = GeminiClient::new(
            reqwest::Client::new(),
            "SECRET-KEY-123".into(),
            "gemini-2.5-flash".into(),
            base,
        );

        let generate_err = client
            .generate_content(TRANSCRIBE_PROMPT, &remote_file())
            .await
            .unwrap_err();
        let upload_err = client
            .upload_file("voice.ogg", b"OggS".to_vec(), "audio/ogg")
            .await
            .unwrap_err();

        for err in [generate_err, upload_err] {
            assert!(matches!(err, GeminiError::Http(_)));
            let relayed = RelayError::from(err);
            for text in [relayed.to_string(), format!("{relayed:?}")] {
                assert!(!text.contains("SECRET-KEY-123"), "key leaked: {text}");
            }
        }
    }
}
