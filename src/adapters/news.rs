use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use super::{fetch_json, AdapterError};

const TOP_HEADLINES_URL: &str = "https://newsapi.org/v2/top-headlines";

pub const NEWS_NOT_FOUND: &str = "I couldn't find any news.";
pub const NEWS_UNAVAILABLE: &str = "The news service is unavailable right now. Please try again later.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headline {
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub source: Option<String>,
    pub published_at: Option<String>,
}

#[async_trait]
pub trait NewsSource: Send + Sync {
    /// The first top headline for the configured locale.
    async fn top_headline(&self) -> Result<Headline, AdapterError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeadlinesResponse {
    status: Option<String>,
    message: Option<String>,
    articles: Option<Vec<Article>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Article {
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    published_at: Option<String>,
    source: Option<ArticleSource>,
}

#[derive(Debug, Deserialize)]
struct ArticleSource {
    name: Option<String>,
}

pub struct NewsApiClient {
    client: Client,
    endpoint: String,
    api_key: String,
    country: String,
}

impl NewsApiClient {
    pub fn new(client: Client, api_key: &str, country: &str) -> Self {
        Self {
            client,
            endpoint: TOP_HEADLINES_URL.to_string(),
            api_key: api_key.to_string(),
            country: country.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }
}

#[async_trait]
impl NewsSource for NewsApiClient {
    async fn top_headline(&self) -> Result<Headline, AdapterError> {
        let request = self.client.get(&self.endpoint).query(&[
            ("country", self.country.as_str()),
            ("pageSize", "1"),
            ("apiKey", self.api_key.as_str()),
        ]);

        let body: serde_json::Value = fetch_json(request).await?;
        parse_headline(body)
    }
}

/// Picks the first article out of a NewsAPI `top-headlines` payload.
pub fn parse_headline(body: serde_json::Value) -> Result<Headline, AdapterError> {
    let response: HeadlinesResponse =
        serde_json::from_value(body).map_err(|e| AdapterError::Malformed(e.to_string()))?;

    if response.status.as_deref() == Some("error") {
        let message = response.message.unwrap_or_else(|| "unspecified error".to_string());
        return Err(AdapterError::Malformed(message));
    }

    let articles = response
        .articles
        .ok_or_else(|| AdapterError::Malformed("missing articles".to_string()))?;
    let article = articles.into_iter().next().ok_or(AdapterError::Empty)?;

    let title = article
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AdapterError::Malformed("article without title".to_string()))?;

    Ok(Headline {
        title,
        description: article.description.filter(|d| !d.trim().is_empty()),
        url: article.url.unwrap_or_default(),
        source: article.source.and_then(|s| s.name),
        published_at: article.published_at,
    })
}

pub fn format_headline(headline: &Headline) -> String {
    let mut text = format!("Top story: {}", headline.title);

    if let Some(description) = &headline.description {
        text.push('\n');
        text.push_str(description);
    }

    match (&headline.source, headline.published_at.as_deref().and_then(published_label)) {
        (Some(source), Some(published)) => text.push_str(&format!("\n{} ({})", source, published)),
        (Some(source), None) => text.push_str(&format!("\n{}", source)),
        (None, Some(published)) => text.push_str(&format!("\n{}", published)),
        (None, None) => {}
    }

    if !headline.url.is_empty() {
        text.push_str(&format!("\nRead more: {}", headline.url));
    }

    text
}

fn published_label(raw: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|published| published.with_timezone(&Utc).format("%Y-%m-%d %H:%M UTC").to_string())
}

/// User-facing text for a news lookup. Never fails.
pub fn headline_reply(outcome: Result<Headline, AdapterError>) -> String {
    match outcome {
        Ok(headline) => format_headline(&headline),
        Err(err) if err.is_data_error() => {
            warn!(kind = err.kind(), "No usable headline: {}", err);
            NEWS_NOT_FOUND.to_string()
        }
        Err(err) => {
            warn!(kind = err.kind(), "News lookup failed: {}", err);
            NEWS_UNAVAILABLE.to_string()
        }
    }
}
