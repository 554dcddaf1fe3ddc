use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use crate::adapters::news::headline_reply;
use crate::adapters::translate::translation_reply;
use crate::adapters::trivia::trivia_reply;
use crate::adapters::{AdapterError, NewsSource, Translator, TriviaSource};
use crate::conversation_manager::{ConversationManager, ConversationState, PendingOperation, SessionId};

pub const MENU_PROMPT: &str = "Hi! I'm your virtual assistant. Choose what you want to do:";
pub const TRANSLATE_PROMPT: &str = "Send me the text you want to translate.";
pub const NOTHING_TO_TRANSLATE: &str = "There was no text to translate. Pick Translate from the menu to try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonTag {
    News,
    Translate,
    Trivia,
}

impl ButtonTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ButtonTag::News => "news",
            ButtonTag::Translate => "translate",
            ButtonTag::Trivia => "trivia",
        }
    }

    /// Parses the `custom_id` a menu button was created with.
    pub fn from_custom_id(custom_id: &str) -> Option<Self> {
        match custom_id {
            "news" => Some(ButtonTag::News),
            "translate" => Some(ButtonTag::Translate),
            "trivia" => Some(ButtonTag::Trivia),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ButtonTag::News => "News",
            ButtonTag::Translate => "Translate",
            ButtonTag::Trivia => "Trivia",
        }
    }

    pub fn all() -> [ButtonTag; 3] {
        [ButtonTag::News, ButtonTag::Translate, ButtonTag::Trivia]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Command(String),
    ButtonPress(ButtonTag),
    TextMessage(String),
}

/// Ordered buttons, each bound to a callback tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyboard {
    pub buttons: Vec<ButtonTag>,
}

impl Keyboard {
    pub fn main_menu() -> Self {
        Self {
            buttons: ButtonTag::all().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// New message in the session's channel.
    Send,
    /// Replace the message the pressed button belongs to.
    EditLast,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<Keyboard>,
    pub delivery: Delivery,
}

impl Reply {
    fn send(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
            delivery: Delivery::Send,
        }
    }

    fn edit(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
            delivery: Delivery::EditLast,
        }
    }

    fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    ShowMenu,
    FetchNews,
    PromptTranslation,
    Translate(String),
    NothingToTranslate,
    FetchTrivia,
    UseMenu,
    UnknownCommand(String),
}

/// The transition table. Pure: no I/O, no clock.
///
/// Every (state, event) pair has an entry, so nothing is ever dropped. Menu
/// selections always overwrite the pending slot, the start command clears it,
/// and a text message consumes it.
pub fn plan(pending: PendingOperation, event: InboundEvent) -> (Action, PendingOperation) {
    use PendingOperation::{AwaitingTranslationInput, None as Idle};

    match (pending, event) {
        (_, InboundEvent::Command(name)) if name == "start" => (Action::ShowMenu, Idle),
        (state, InboundEvent::Command(name)) => (Action::UnknownCommand(name), state),

        (_, InboundEvent::ButtonPress(ButtonTag::News)) => (Action::FetchNews, Idle),
        (_, InboundEvent::ButtonPress(ButtonTag::Translate)) => (Action::PromptTranslation, AwaitingTranslationInput),
        (_, InboundEvent::ButtonPress(ButtonTag::Trivia)) => (Action::FetchTrivia, Idle),

        (AwaitingTranslationInput, InboundEvent::TextMessage(body)) if body.trim().is_empty() => {
            (Action::NothingToTranslate, Idle)
        }
        (AwaitingTranslationInput, InboundEvent::TextMessage(body)) => (Action::Translate(body), Idle),
        (Idle, InboundEvent::TextMessage(_)) => (Action::UseMenu, Idle),
    }
}

/// Turns inbound events into exactly one reply each, calling out to the
/// adapters when the transition asks for it.
pub struct Dispatcher {
    news: Arc<dyn NewsSource>,
    translator: Arc<dyn Translator>,
    trivia: Arc<dyn TriviaSource>,
    target_language: String,
    upstream_timeout: Duration,
    command_prefix: String,
}

impl Dispatcher {
    pub fn new(
        news: Arc<dyn NewsSource>,
        translator: Arc<dyn Translator>,
        trivia: Arc<dyn TriviaSource>,
        target_language: &str,
        upstream_timeout: Duration,
    ) -> Self {
        Self {
            news,
            translator,
            trivia,
            target_language: target_language.to_string(),
            upstream_timeout,
            command_prefix: "!".to_string(),
        }
    }

    pub fn with_command_prefix(mut self, prefix: &str) -> Self {
        self.command_prefix = prefix.to_string();
        self
    }

    pub fn command_prefix(&self) -> &str {
        &self.command_prefix
    }

    /// Locks the session for the whole event and dispatches against it.
    pub async fn handle(&self, sessions: &ConversationManager, session: SessionId, event: InboundEvent) -> Reply {
        let handle = sessions.session(session);
        let mut state = handle.lock().await;
        self.dispatch(&mut state, event).await
    }

    /// The slot is written before any upstream call, so a failing or slow
    /// adapter can never leave an operation pending.
    pub async fn dispatch(&self, state: &mut ConversationState, event: InboundEvent) -> Reply {
        state.touch(Utc::now());

        let current = state.pending();
        let (action, next) = plan(current, event);
        if next != current {
            debug!(from = ?current, to = ?next, "Pending operation changed.");
        }
        state.set_pending(next);

        self.perform(action).await
    }

    async fn perform(&self, action: Action) -> Reply {
        match action {
            Action::ShowMenu => Reply::send(MENU_PROMPT).with_keyboard(Keyboard::main_menu()),
            Action::FetchNews => {
                let outcome = self.bounded(self.news.top_headline()).await;
                Reply::edit(format!("News:\n{}", headline_reply(outcome)))
            }
            Action::PromptTranslation => Reply::edit(TRANSLATE_PROMPT),
            Action::Translate(body) => {
                info!(chars = body.chars().count(), language = %self.target_language, "Translating message.");
                let outcome = self
                    .bounded(self.translator.translate(&body, &self.target_language))
                    .await;
                Reply::send(translation_reply(outcome))
            }
            Action::NothingToTranslate => Reply::send(NOTHING_TO_TRANSLATE),
            Action::FetchTrivia => {
                let outcome = self.bounded(self.trivia.question()).await;
                Reply::edit(format!("Trivia:\n{}", trivia_reply(outcome)))
            }
            Action::UseMenu => Reply::send(self.use_menu_text()),
            Action::UnknownCommand(name) => Reply::send(format!(
                "I don't know the command {}{}. Send {}start to open the menu.",
                self.command_prefix, name, self.command_prefix
            )),
        }
    }

    /// Reply for input that matches nothing, including stale buttons.
    pub fn use_menu_text(&self) -> String {
        format!(
            "Please choose an action from the menu. Send {}start to open it.",
            self.command_prefix
        )
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, AdapterError>
    where
        F: Future<Output = Result<T, AdapterError>>,
    {
        match tokio::time::timeout(self.upstream_timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AdapterError::Timeout),
        }
    }
}
