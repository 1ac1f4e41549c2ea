//! Forwards log lines to a Telegram chat.
//!
//! WARN and ERROR go out immediately, INFO is batched.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ChatId;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use crate::relay::pipeline::MAX_MESSAGE_CHARS;

const FLUSH_INTERVAL: Duration = Duration::from_secs(5);
const MAX_BUFFERED_LINES: usize = 50;

#[derive(Debug, PartialEq, Eq)]
enum LogLine {
    Urgent(String),
    Info(String),
}

impl LogLine {
    /// Map a tracing event to a chat line. DEBUG and TRACE are not forwarded.
    fn classify(level: Level, message: String) -> Option<Self> {
        match level {
            Level::ERROR => Some(Self::Urgent(format!("❌ {message}"))),
            Level::WARN => Some(Self::Urgent(format!("⚠️ {message}"))),
            Level::INFO => Some(Self::Info(message)),
            _ => None,
        }
    }
}

pub struct TelegramLogLayer {
    tx: mpsc::UnboundedSender<LogLine>,
}

impl TelegramLogLayer {
    /// Spawns the sender task; must be called inside a tokio runtime.
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<LogLine>();

        tokio::spawn(async move {
            let mut buffer: Vec<String> = Vec::new();
            let mut interval = tokio::time::interval(FLUSH_INTERVAL);

            loop {
                tokio::select! {
                    line = rx.recv() => match line {
                        Some(LogLine::Urgent(text)) => send_line(&bot, chat_id, &text).await,
                        Some(LogLine::Info(text)) => {
                            buffer.push(text);
                            if buffer.len() >= MAX_BUFFERED_LINES {
                                flush(&bot, chat_id, &mut buffer).await;
                            }
                        }
                        None => {
                            flush(&bot, chat_id, &mut buffer).await;
                            break;
                        }
                    },
                    _ = interval.tick() => flush(&bot, chat_id, &mut buffer).await,
                }
            }
        });

        Self { tx }
    }
}

fn fit_message(text: &str) -> String {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return text.to_string();
    }
    let truncated: String = text.chars().take(MAX_MESSAGE_CHARS - 3).collect();
    format!("{truncated}...")
}

async fn send_line(bot: &Bot, chat_id: ChatId, text: &str) {
    if let Err(e) = bot.send_message(chat_id, fit_message(text)).await {
        // Not a tracing call: that would feed back into this layer.
        eprintln!("Failed to forward log to Telegram: {e}");
    }
}

async fn flush(bot: &Bot, chat_id: ChatId, buffer: &mut Vec<String>) {
    if buffer.is_empty() {
        return;
    }
    let combined = buffer.join("\n");
    buffer.clear();
    send_line(bot, chat_id, &combined).await;
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else if self.message.is_empty() {
            self.message = format!("{} = {:?}", field.name(), value);
        } else {
            self.message.push_str(&format!(", {} = {:?}", field.name(), value));
        }
    }
}

impl<S: Subscriber> Layer<S> for TelegramLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        if level > Level::INFO {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        if let Some(line) = LogLine::classify(level, visitor.message)
            && self.tx.send(line).is_err()
        {
            eprintln!("Log channel closed, message dropped");
        }
    }
}
