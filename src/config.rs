use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use teloxide::types::ChatId;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_IPINFO_URL: &str = "https://ipinfo.io/json";

/// Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric.
static TOKEN_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+:[A-Za-z0-9_-]+$").expect("token regex is valid"));

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is absent or blank.
    #[error("{0} must be set (environment or .env file)")]
    Missing(&'static str),
    /// A variable is present but malformed.
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_api_base: String,
    pub ipinfo_url: String,
    /// Downloaded voice notes live here while they are processed.
    pub data_dir: PathBuf,
    /// Chat that receives forwarded log lines, if any.
    pub log_chat_id: Option<ChatId>,
    /// Optional HTTP timeout for Gemini and ipinfo calls. Off unless configured.
    pub request_timeout: Option<Duration>,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN").ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;
        let gemini_api_key = get("GEMINI_API_KEY").ok_or(ConfigError::Missing("GEMINI_API_KEY"))?;

        if !TOKEN_FORMAT.is_match(&telegram_bot_token) {
            return Err(ConfigError::Invalid {
                var: "TELEGRAM_BOT_TOKEN",
                reason: "expected format 123456789:ABCdefGHI...".into(),
            });
        }

        let log_chat_id = get("LOG_CHAT_ID")
            .map(|raw| {
                raw.parse::<i64>().map(ChatId).map_err(|e| ConfigError::Invalid {
                    var: "LOG_CHAT_ID",
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let request_timeout = match get("REQUEST_TIMEOUT_SECS") {
            None => None,
            Some(raw) => match raw.parse::<u64>() {
                Ok(0) => None,
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        var: "REQUEST_TIMEOUT_SECS",
                        reason: e.to_string(),
                    });
                }
            },
        };

        Ok(Self {
            telegram_bot_token,
            gemini_api_key,
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            gemini_api_base: get("GEMINI_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string()),
            ipinfo_url: get("IPINFO_URL").unwrap_or_else(|| DEFAULT_IPINFO_URL.to_string()),
            data_dir: get("DATA_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")),
            log_chat_id,
            request_timeout,
        })
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}
