// Sticky messages - a note that stays at the bottom of a channel.
//
// Each new guild message in a sticky channel deletes the previous sticky post
// and re-posts it. The channel's record is locked for the whole
// delete/post/save sequence so concurrent messages cannot double-post.

use crate::core::actions::arguments::{required, rest_text};
use crate::core::actions::{ActionError, ActionHandler, ActionReply};
use crate::core::dispatch::InvocationContext;
use crate::core::platform::{OutgoingMessage, PlatformError};
use crate::core::services::Services;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickyRecord {
    pub content: String,
    /// The sticky post currently in the channel.
    pub last_message_id: Option<u64>,
    pub set_by: u64,
}

fn record_key(channel_id: u64) -> String {
    format!("sticky:{channel_id}")
}

fn render(content: &str) -> OutgoingMessage {
    OutgoingMessage::text(format!("📌 {content}"))
}

async fn remove_post(services: &Services, channel_id: u64, message_id: Option<u64>) {
    let Some(message_id) = message_id else {
        return;
    };
    match services.platform.delete_message(channel_id, message_id).await {
        Ok(()) | Err(PlatformError::NotFound(_)) => {}
        Err(e) => tracing::warn!(channel_id, "Failed to delete old sticky post: {}", e),
    }
}

/// Re-post the channel's sticky message, if it has one.
pub async fn repost(services: &Services, guild_id: u64, channel_id: u64) -> Result<bool, ActionError> {
    let key = record_key(channel_id);
    let _guard = services.config.lock(guild_id, &key).await;

    let Some(mut record) = services
        .config
        .get::<StickyRecord>(guild_id, &key)
        .await?
    else {
        return Ok(false);
    };

    remove_post(services, channel_id, record.last_message_id).await;
    let posted = services
        .platform
        .send_message(channel_id, render(&record.content))
        .await?;

    record.last_message_id = Some(posted.id);
    services.config.put(guild_id, &key, &record).await?;
    Ok(true)
}

#[derive(Default)]
pub struct StickyHandler;

const USAGE: &str = "sticky set <text> | sticky clear";

#[async_trait]
impl ActionHandler for StickyHandler {
    async fn handle(
        &self,
        ctx: &InvocationContext,
        services: &Services,
    ) -> Result<ActionReply, ActionError> {
        let guild_id = ctx.guild_id()?;
        let channel_id = ctx.source.channel_id;
        let tokens = ctx.arguments.tokens();
        let key = record_key(channel_id);

        match required(tokens, 0, USAGE)?.to_lowercase().as_str() {
            "set" => {
                let content = rest_text(tokens, 1, USAGE)?;

                let _guard = services.config.lock(guild_id, &key).await;
                let previous = services
                    .config
                    .get::<StickyRecord>(guild_id, &key)
                    .await?;
                remove_post(services, channel_id, previous.and_then(|r| r.last_message_id)).await;

                let posted = services
                    .platform
                    .send_message(channel_id, render(&content))
                    .await?;
                let record = StickyRecord {
                    content,
                    last_message_id: Some(posted.id),
                    set_by: ctx.actor.id,
                };
                services.config.put(guild_id, &key, &record).await?;

                tracing::info!(guild_id, channel_id, "Sticky message set");
                Ok(ActionReply::ephemeral("📌 Sticky message set for this channel."))
            }
            "clear" | "remove" => {
                let _guard = services.config.lock(guild_id, &key).await;
                let Some(record) = services
                    .config
                    .get::<StickyRecord>(guild_id, &key)
                    .await?
                else {
                    return Err(ActionError::NotFound(
                        "This channel has no sticky message.".into(),
                    ));
                };
                services.config.remove(guild_id, &key).await?;
                remove_post(services, channel_id, record.last_message_id).await;

                Ok(ActionReply::ephemeral("🗑️ Sticky message cleared."))
            }
            _ => Err(ActionError::input(format!("Usage: {USAGE}"))),
        }
    }
}
