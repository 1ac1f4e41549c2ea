use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use teloxide::prelude::*;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;

use voicebrief::config::Config;
use voicebrief::geo;
use voicebrief::relay::{router, GeminiClient, Relay, TelegramClient};
use voicebrief::telegram_log::TelegramLogLayer;

fn init_logging(config: &Config, bot: &Bot) -> std::io::Result<WorkerGuard> {
    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("voicebrief.log"))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);

    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        );

    if let Some(log_chat_id) = config.log_chat_id {
        registry.with(TelegramLogLayer::new(bot.clone(), log_chat_id)).init();
    } else {
        registry.init();
    }

    Ok(guard)
}

fn http_client(timeout: Option<Duration>) -> reqwest::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let bot = Bot::new(&config.telegram_bot_token);

    let _guard = match init_logging(&config, &bot) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to set up logging in {}: {e}", config.log_dir().display());
            return ExitCode::FAILURE;
        }
    };

    let http = match http_client(config.request_timeout) {
        Ok(http) => http,
        Err(e) => {
            eprintln!("Failed to build HTTP client: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!("🚀 Starting voicebrief...");
    info!("Gemini model: {}", config.gemini_model);
    if let Some(timeout) = config.request_timeout {
        info!("HTTP timeout: {}s", timeout.as_secs());
    }

    match bot.get_me().await {
        Ok(me) => info!("Bot user ID: {}, username: @{}", me.id, me.username()),
        Err(e) => warn!("Failed to get bot info: {e}"),
    }

    geo::log_region_advisory(&http, &config.ipinfo_url).await;

    let gemini = GeminiClient::new(
        http,
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
        config.gemini_api_base.clone(),
    );
    let relay = Arc::new(Relay::new(
        Arc::new(TelegramClient::new(bot.clone())),
        Arc::new(gemini),
        config.data_dir.clone(),
    ));

    Dispatcher::builder(bot, router::schema())
        .dependencies(dptree::deps![relay])
        // Every update runs concurrently; a slow voice note never holds back the chat.
        .distribution_function(|_| None::<std::convert::Infallible>)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Stopped");
    ExitCode::SUCCESS
}
