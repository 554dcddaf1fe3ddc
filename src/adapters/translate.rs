use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::warn;

use super::{fetch_json, AdapterError};

const GOOGLE_TRANSLATE_URL: &str = "https://translate.googleapis.com/translate_a/single";

pub const TRANSLATION_FAILED: &str = "I couldn't translate that text.";
pub const TRANSLATION_UNAVAILABLE: &str =
    "The translation service is unavailable right now. Please try again later.";

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, AdapterError>;
}

pub struct GoogleTranslateClient {
    client: Client,
    endpoint: String,
}

impl GoogleTranslateClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            endpoint: GOOGLE_TRANSLATE_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }
}

#[async_trait]
impl Translator for GoogleTranslateClient {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, AdapterError> {
        let request = self.client.get(&self.endpoint).query(&[
            ("client", "gtx"),
            ("sl", "auto"),
            ("tl", target_language),
            ("dt", "t"),
            ("q", text),
        ]);

        let body: Value = fetch_json(request).await?;
        parse_translation(&body)
    }
}

/// The endpoint answers with nested arrays; the first element holds one
/// `[translated, original, ...]` entry per sentence.
pub fn parse_translation(body: &Value) -> Result<String, AdapterError> {
    let segments = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| AdapterError::Malformed("missing translation segments".to_string()))?;

    let translated: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect();

    if translated.trim().is_empty() {
        return Err(AdapterError::Empty);
    }
    Ok(translated)
}

pub fn translation_reply(outcome: Result<String, AdapterError>) -> String {
    match outcome {
        Ok(translated) => format!("Translated: {}", translated),
        Err(err) if err.is_data_error() => {
            warn!(kind = err.kind(), "No usable translation: {}", err);
            TRANSLATION_FAILED.to_string()
        }
        Err(err) => {
            warn!(kind = err.kind(), "Translation failed: {}", err);
            TRANSLATION_UNAVAILABLE.to_string()
        }
    }
}
