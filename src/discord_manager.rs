use std::sync::Arc;

use serenity::builder::CreateComponents;
use serenity::client::Client;
use serenity::model::application::component::ButtonStyle;
use serenity::model::application::interaction::message_component::MessageComponentInteraction;
use serenity::model::application::interaction::{Interaction, InteractionResponseType};
use serenity::model::id::ChannelId;
use serenity::{
    async_trait,
    model::{channel::Message, gateway::Ready},
    prelude::*,
};
use tracing::{debug, error, info, warn};

use crate::conversation_manager::{ConversationManager, SessionId};
use crate::dispatcher::{ButtonTag, Delivery, Dispatcher, InboundEvent, Keyboard, Reply};

/// Discord rejects message content longer than this many characters.
pub const MESSAGE_LIMIT: usize = 2000;

struct Handler {
    dispatcher: Arc<Dispatcher>,
    sessions: Arc<ConversationManager>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, context: Context, msg: Message) {
        // Ignore bot's own messages
        if msg.author.bot {
            return;
        }

        // Only direct messages are conversations with the bot
        if msg.guild_id.is_some() {
            return;
        }

        debug!(user = msg.author.id.0, "Message received from {}", msg.author.name);

        let event = parse_message(&msg.content, self.dispatcher.command_prefix());
        let session = SessionId(msg.author.id.0);
        let reply = self.dispatcher.handle(&self.sessions, session, event).await;

        send_reply(&context, msg.channel_id, &reply).await;
    }

    async fn interaction_create(&self, context: Context, interaction: Interaction) {
        if let Interaction::MessageComponent(component) = interaction {
            self.button_pressed(&context, &component).await;
        }
    }

    async fn ready(&self, _: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);
    }
}

impl Handler {
    async fn button_pressed(&self, context: &Context, component: &MessageComponentInteraction) {
        // Acknowledge right away; upstream calls can outlast Discord's deadline
        let acknowledged = component
            .create_interaction_response(&context.http, |response| {
                response.kind(InteractionResponseType::DeferredUpdateMessage)
            })
            .await;
        if let Err(why) = &acknowledged {
            warn!("Error acknowledging button press: {:?}", why);
        }

        let reply = match ButtonTag::from_custom_id(&component.data.custom_id) {
            Some(tag) => {
                let session = SessionId(component.user.id.0);
                self.dispatcher
                    .handle(&self.sessions, session, InboundEvent::ButtonPress(tag))
                    .await
            }
            None => {
                warn!(custom_id = %component.data.custom_id, "Unknown button pressed.");
                Reply {
                    text: self.dispatcher.use_menu_text(),
                    keyboard: None,
                    delivery: Delivery::Send,
                }
            }
        };

        if reply.delivery == Delivery::EditLast && acknowledged.is_ok() {
            let text = truncate_for_discord(&reply.text);
            let components = reply.keyboard.as_ref().map(keyboard_components).unwrap_or_default();
            let edited = component
                .edit_original_interaction_response(&context.http, |response| {
                    response.content(text).set_components(components)
                })
                .await;

            match edited {
                Ok(_) => return,
                Err(why) => warn!("Error editing menu message, sending instead: {:?}", why),
            }
        }

        send_reply(context, component.channel_id, &reply).await;
    }
}

pub struct DiscordManager {
    discord_client: Client,
}

impl DiscordManager {
    pub async fn new(
        token: &str,
        dispatcher: Arc<Dispatcher>,
        sessions: Arc<ConversationManager>,
    ) -> Result<Self, SerenityError> {
        let intents = GatewayIntents::DIRECT_MESSAGES | GatewayIntents::MESSAGE_CONTENT;
        let discord_client = Client::builder(token, intents)
            .event_handler(Handler { dispatcher, sessions })
            .await?;

        Ok(Self { discord_client })
    }

    pub async fn start(&mut self) -> Result<(), SerenityError> {
        self.discord_client.start().await
    }
}

/// Maps raw message text onto an inbound event.
///
/// `!start` and `/start` are both commands; the name is the first word after
/// the prefix, lower-cased.
pub fn parse_message(content: &str, prefix: &str) -> InboundEvent {
    let trimmed = content.trim();

    for candidate in [prefix, "/"] {
        if candidate.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix(candidate) {
            let name: String = rest
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            if !name.is_empty() {
                return InboundEvent::Command(name.to_lowercase());
            }
        }
    }

    InboundEvent::TextMessage(content.to_string())
}

pub fn truncate_for_discord(text: &str) -> String {
    if text.chars().count() <= MESSAGE_LIMIT {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(MESSAGE_LIMIT - 1).collect();
    truncated.push('…');
    truncated
}

fn keyboard_components(keyboard: &Keyboard) -> CreateComponents {
    let mut components = CreateComponents::default();
    // One button per row, in menu order
    for tag in &keyboard.buttons {
        components.create_action_row(|row| {
            row.create_button(|button| {
                button
                    .custom_id(tag.as_str())
                    .label(tag.label())
                    .style(ButtonStyle::Primary)
            })
        });
    }
    components
}

async fn send_reply(context: &Context, channel_id: ChannelId, reply: &Reply) {
    let text = truncate_for_discord(&reply.text);
    let sent = channel_id
        .send_message(&context.http, |message| {
            message.content(text);
            if let Some(keyboard) = &reply.keyboard {
                message.set_components(keyboard_components(keyboard));
            }
            message
        })
        .await;

    if let Err(why) = sent {
        error!("Error sending message: {:?}", why);
    }
}
