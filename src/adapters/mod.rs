//! Thin clients for the three upstream services the bot relays to.
//!
//! Each adapter exposes a trait so the dispatcher can be driven by fakes, a
//! reqwest-backed implementation, and a `*_reply` function that turns the
//! outcome of a call into the text shown to the user.

pub mod news;
pub mod translate;
pub mod trivia;

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use news::{NewsApiClient, NewsSource};
pub use translate::{GoogleTranslateClient, Translator};
pub use trivia::{OpenTriviaClient, TriviaSource};

/// Failure of a single upstream call.
///
/// `Empty` and `Malformed` are data problems, the rest are transport problems.
/// Both classes end up as a polite reply; the variant is only visible in logs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error("upstream request failed: {0}")]
    Transport(String),
    #[error("upstream did not answer in time")]
    Timeout,
    #[error("upstream answered with status {0}")]
    Status(u16),
    #[error("malformed upstream payload: {0}")]
    Malformed(String),
    #[error("upstream returned no results")]
    Empty,
}

impl AdapterError {
    pub fn kind(&self) -> &'static str {
        match self {
            AdapterError::Transport(_) => "transport",
            AdapterError::Timeout => "timeout",
            AdapterError::Status(_) => "status",
            AdapterError::Malformed(_) => "malformed",
            AdapterError::Empty => "empty",
        }
    }

    /// True when the upstream answered but had nothing usable for us.
    pub fn is_data_error(&self) -> bool {
        matches!(self, AdapterError::Malformed(_) | AdapterError::Empty)
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout
        } else if err.is_decode() {
            AdapterError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            AdapterError::Status(status.as_u16())
        } else {
            AdapterError::Transport(err.to_string())
        }
    }
}

/// Shared client for all adapters. Connections are pooled; every request is
/// still bounded by `timeout`.
pub fn http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}

async fn fetch_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, AdapterError> {
    let response = request.send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(AdapterError::Status(status.as_u16()));
    }

    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| AdapterError::Malformed(e.to_string()))
}
