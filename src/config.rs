use std::env;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_NEWS_COUNTRY: &str = "us";
const DEFAULT_TARGET_LANGUAGE: &str = "en";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SESSION_IDLE_MINUTES: u64 = 60;
const DEFAULT_COMMAND_PREFIX: &str = "!";
const MAX_UPSTREAM_TIMEOUT_SECS: u64 = 300;
const MAX_SESSION_IDLE_MINUTES: u64 = 7 * 24 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Expected {0} in the environment")]
    Missing(&'static str),
    #[error("Invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct RelayBotConfig {
    pub discord_token: String,
    pub news_api_key: String,
    pub news_country: String,
    pub translate_target: String,
    pub upstream_timeout: Duration,
    pub session_idle: chrono::Duration,
    pub command_prefix: String,
    pub news_api_url: Option<String>,
    pub translate_api_url: Option<String>,
    pub trivia_api_url: Option<String>,
}

pub fn config_from_env() -> Result<RelayBotConfig, ConfigError> {
    config_from_lookup(|key| env::var(key).ok())
}

/// Builds the configuration from any key lookup, so tests never touch the
/// process environment.
///
/// The two credentials are required; everything else falls back to a default.
/// Blank values count as absent.
pub fn config_from_lookup<F>(lookup: F) -> Result<RelayBotConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let discord_token = get("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;
    let news_api_key = get("NEWS_API_KEY").ok_or(ConfigError::Missing("NEWS_API_KEY"))?;

    let news_country = get("NEWS_COUNTRY")
        .unwrap_or_else(|| DEFAULT_NEWS_COUNTRY.to_string())
        .to_lowercase();
    let translate_target = get("TRANSLATE_TARGET_LANG")
        .unwrap_or_else(|| DEFAULT_TARGET_LANGUAGE.to_string())
        .to_lowercase();

    let timeout_secs = match get("UPSTREAM_TIMEOUT_SECS") {
        Some(value) => parse_bounded("UPSTREAM_TIMEOUT_SECS", &value, MAX_UPSTREAM_TIMEOUT_SECS)?,
        None => DEFAULT_UPSTREAM_TIMEOUT_SECS,
    };
    let idle_minutes = match get("SESSION_IDLE_MINUTES") {
        Some(value) => parse_bounded("SESSION_IDLE_MINUTES", &value, MAX_SESSION_IDLE_MINUTES)?,
        None => DEFAULT_SESSION_IDLE_MINUTES,
    };

    let command_prefix = get("COMMAND_PREFIX").unwrap_or_else(|| DEFAULT_COMMAND_PREFIX.to_string());

    Ok(RelayBotConfig {
        discord_token,
        news_api_key,
        news_country,
        translate_target,
        upstream_timeout: Duration::from_secs(timeout_secs),
        session_idle: chrono::Duration::minutes(idle_minutes as i64),
        command_prefix,
        news_api_url: get("NEWS_API_URL"),
        translate_api_url: get("TRANSLATE_API_URL"),
        trivia_api_url: get("TRIVIA_API_URL"),
    })
}

fn parse_bounded(key: &'static str, value: &str, max: u64) -> Result<u64, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason,
    };

    let parsed = value.parse::<u64>().map_err(|e| invalid(e.to_string()))?;
    if parsed == 0 {
        return Err(invalid("must be greater than zero".to_string()));
    }
    if parsed > max {
        return Err(invalid(format!("must be at most {}", max)));
    }
    Ok(parsed)
}
