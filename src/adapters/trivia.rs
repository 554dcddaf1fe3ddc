use async_trait::async_trait;
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::{Captures, Regex};
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use super::{fetch_json, AdapterError};

const OPEN_TRIVIA_URL: &str = "https://opentdb.com/api.php";

pub const TRIVIA_NOT_FOUND: &str = "I couldn't find a trivia question.";
pub const TRIVIA_UNAVAILABLE: &str = "The trivia service is unavailable right now. Please try again later.";

const SLOT_LABELS: [char; 4] = ['A', 'B', 'C', 'D'];

/// A multiple-choice question with its options already shuffled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriviaQuestion {
    pub question: String,
    pub category: Option<String>,
    pub options: [String; 4],
    pub correct_slot: usize,
}

impl TriviaQuestion {
    /// Places the correct answer uniformly at random among the four slots.
    pub fn shuffled<R: Rng + ?Sized>(
        question: String,
        category: Option<String>,
        correct_answer: String,
        incorrect_answers: [String; 3],
        rng: &mut R,
    ) -> Self {
        let [first, second, third] = incorrect_answers;
        let mut slots = [
            (true, correct_answer),
            (false, first),
            (false, second),
            (false, third),
        ];
        slots.shuffle(rng);

        let correct_slot = slots.iter().position(|(correct, _)| *correct).unwrap_or(0);
        let [a, b, c, d] = slots;

        Self {
            question,
            category,
            options: [a.1, b.1, c.1, d.1],
            correct_slot,
        }
    }

    pub fn correct_label(&self) -> char {
        SLOT_LABELS[self.correct_slot]
    }

    pub fn correct_answer(&self) -> &str {
        &self.options[self.correct_slot]
    }
}

#[async_trait]
pub trait TriviaSource: Send + Sync {
    async fn question(&self) -> Result<TriviaQuestion, AdapterError>;
}

#[derive(Debug, Deserialize)]
struct TriviaResponse {
    #[serde(default)]
    response_code: u8,
    #[serde(default)]
    results: Vec<RawQuestion>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    question: String,
    correct_answer: String,
    incorrect_answers: Vec<String>,
    category: Option<String>,
}

pub struct OpenTriviaClient {
    client: Client,
    endpoint: String,
}

impl OpenTriviaClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            endpoint: OPEN_TRIVIA_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }
}

#[async_trait]
impl TriviaSource for OpenTriviaClient {
    async fn question(&self) -> Result<TriviaQuestion, AdapterError> {
        let request = self
            .client
            .get(&self.endpoint)
            .query(&[("amount", "1"), ("type", "multiple")]);

        let body: serde_json::Value = fetch_json(request).await?;
        parse_question(body, &mut rand::thread_rng())
    }
}

/// Turns an Open Trivia DB payload into a shuffled question.
///
/// `response_code` 1 means the database had nothing for the query; any other
/// non-zero code is treated as a broken answer.
pub fn parse_question<R: Rng + ?Sized>(
    body: serde_json::Value,
    rng: &mut R,
) -> Result<TriviaQuestion, AdapterError> {
    let response: TriviaResponse =
        serde_json::from_value(body).map_err(|e| AdapterError::Malformed(e.to_string()))?;

    match response.response_code {
        0 => {}
        1 => return Err(AdapterError::Empty),
        code => return Err(AdapterError::Malformed(format!("response_code {}", code))),
    }

    let raw = response.results.into_iter().next().ok_or(AdapterError::Empty)?;

    let incorrect: [String; 3] = raw
        .incorrect_answers
        .into_iter()
        .map(|answer| decode_html(&answer))
        .collect::<Vec<_>>()
        .try_into()
        .map_err(|answers: Vec<String>| {
            AdapterError::Malformed(format!("expected 3 incorrect answers, got {}", answers.len()))
        })?;

    Ok(TriviaQuestion::shuffled(
        decode_html(&raw.question),
        raw.category.map(|c| decode_html(&c)),
        decode_html(&raw.correct_answer),
        incorrect,
        rng,
    ))
}

pub fn format_question(question: &TriviaQuestion) -> String {
    let mut text = String::new();
    if let Some(category) = &question.category {
        text.push_str(&format!("[{}]\n", category));
    }
    text.push_str(&question.question);

    for (label, option) in SLOT_LABELS.iter().zip(question.options.iter()) {
        text.push_str(&format!("\n{}) {}", label, option));
    }

    // Spoiler keeps the answer hidden until the user clicks it.
    text.push_str(&format!(
        "\nAnswer: ||{}) {}||",
        question.correct_label(),
        question.correct_answer()
    ));
    text
}

pub fn trivia_reply(outcome: Result<TriviaQuestion, AdapterError>) -> String {
    match outcome {
        Ok(question) => format_question(&question),
        Err(err) if err.is_data_error() => {
            warn!(kind = err.kind(), "No usable trivia question: {}", err);
            TRIVIA_NOT_FOUND.to_string()
        }
        Err(err) => {
            warn!(kind = err.kind(), "Trivia lookup failed: {}", err);
            TRIVIA_UNAVAILABLE.to_string()
        }
    }
}

static ENTITY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").unwrap());

/// Open Trivia DB HTML-encodes its text by default.
pub fn decode_html(text: &str) -> String {
    ENTITY_PATTERN
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(entity)
            };

            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    let c = match name {
        "quot" => '"',
        "amp" => '&',
        "apos" => '\'',
        "lt" => '<',
        "gt" => '>',
        "nbsp" => '\u{a0}',
        "shy" => '\u{ad}',
        "hellip" => '…',
        "ndash" => '–',
        "mdash" => '—',
        "lsquo" => '‘',
        "rsquo" => '’',
        "ldquo" => '“',
        "rdquo" => '”',
        "deg" => '°',
        "eacute" => 'é',
        "egrave" => 'è',
        "aacute" => 'á',
        "agrave" => 'à',
        "iacute" => 'í',
        "oacute" => 'ó',
        "ouml" => 'ö',
        "uacute" => 'ú',
        "uuml" => 'ü',
        "auml" => 'ä',
        "ntilde" => 'ñ',
        "ccedil" => 'ç',
        "szlig" => 'ß',
        "pi" => 'π',
        _ => return None,
    };
    Some(c)
}
