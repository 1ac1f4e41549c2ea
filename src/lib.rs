//! Telegram bot that transcribes and summarizes voice notes with Gemini.

pub mod config;
pub mod geo;
pub mod relay;
pub mod telegram_log;
