
mod adapters;
mod config;
mod conversation_manager;
mod discord_manager;
mod dispatcher;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use chrono::Utc;
use dotenvy::dotenv;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::adapters::{http_client, GoogleTranslateClient, NewsApiClient, OpenTriviaClient};
use crate::config::config_from_env;
use crate::conversation_manager::ConversationManager;
use crate::discord_manager::DiscordManager;
use crate::dispatcher::Dispatcher;

const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Periodically drops sessions nobody has talked to for `max_idle`.
fn spawn_session_sweeper(sessions: Arc<ConversationManager>, max_idle: chrono::Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(EVICTION_INTERVAL);
        loop {
            interval.tick().await;
            let evicted = sessions.evict_idle(Utc::now(), max_idle);
            if evicted > 0 {
                debug!(evicted, remaining = sessions.len(), "Evicted idle sessions.");
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A .env file is optional; the real environment wins
    dotenv().ok();
    init_logging();

    let config = config_from_env()?;

    let http = http_client(config.upstream_timeout).context("Failed to build HTTP client")?;

    let mut news = NewsApiClient::new(http.clone(), &config.news_api_key, &config.news_country);
    if let Some(url) = &config.news_api_url {
        news = news.with_endpoint(url);
    }
    let mut translator = GoogleTranslateClient::new(http.clone());
    if let Some(url) = &config.translate_api_url {
        translator = translator.with_endpoint(url);
    }
    let mut trivia = OpenTriviaClient::new(http);
    if let Some(url) = &config.trivia_api_url {
        trivia = trivia.with_endpoint(url);
    }

    let dispatcher = Dispatcher::new(
        Arc::new(news),
        Arc::new(translator),
        Arc::new(trivia),
        &config.translate_target,
        config.upstream_timeout,
    )
    .with_command_prefix(&config.command_prefix);

    let sessions = Arc::new(ConversationManager::new());
    spawn_session_sweeper(sessions.clone(), config.session_idle);

    let mut discord = DiscordManager::new(&config.discord_token, Arc::new(dispatcher), sessions)
        .await
        .context("Failed to initialize the Discord client")?;

    info!(
        country = %config.news_country,
        language = %config.translate_target,
        "Bot started, waiting for Discord events..."
    );

    discord
        .start()
        .await
        .context("An error occurred while running the client")?;

    Ok(())
}
