// Welcome cards and on-demand profile cards.
//
// Both go through the image renderer, which is slow. The welcome path is
// event driven and degrades to a plain text greeting if rendering fails;
// the card action reports a collaborator failure instead.

use crate::core::actions::{ActionError, ActionHandler, ActionReply};
use crate::core::dispatch::InvocationContext;
use crate::core::media::ProfileCard;
use crate::core::platform::{FileAttachment, OutgoingMessage, UserProfile};
use crate::core::services::Services;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const CONFIG_KEY: &str = "welcome";
const DEFAULT_GREETING: &str = "Welcome to the server, {user}!";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WelcomeRecord {
    pub channel_id: u64,
    /// `{user}` is replaced with a mention of the new member.
    pub message: Option<String>,
}

impl WelcomeRecord {
    pub fn greeting(&self, user_id: u64) -> String {
        self.message
            .as_deref()
            .unwrap_or(DEFAULT_GREETING)
            .replace("{user}", &format!("<@{user_id}>"))
    }
}

fn card_for(profile: &UserProfile, headline: impl Into<String>, subtitle: Option<String>) -> ProfileCard {
    ProfileCard {
        user_id: profile.id,
        username: profile.name.clone(),
        display_name: profile.display_name.clone(),
        avatar_url: profile.avatar_url.clone(),
        headline: headline.into(),
        subtitle,
    }
}

/// Post the welcome greeting for a member who just joined. Returns `false`
/// when the guild has no welcome channel.
pub async fn greet_member(services: &Services, guild_id: u64, user_id: u64) -> Result<bool, ActionError> {
    let Some(record) = services
        .config
        .get::<WelcomeRecord>(guild_id, CONFIG_KEY)
        .await?
    else {
        return Ok(false);
    };

    let mut payload = OutgoingMessage::text(record.greeting(user_id));

    let profile = services.platform.fetch_user(user_id).await?;
    let card = card_for(&profile, "Welcome!", Some(format!("Say hi to {}", profile.display_name)));
    match services.images.render_card(&card).await {
        Ok(bytes) => {
            payload = payload.with_attachment(FileAttachment {
                filename: "welcome.png".to_string(),
                bytes,
            })
        }
        Err(e) => tracing::warn!(guild_id, user_id, "Welcome card failed, sending text only: {}", e),
    }

    services
        .platform
        .send_message(record.channel_id, payload)
        .await?;
    tracing::info!(guild_id, user_id, "Welcomed new member");
    Ok(true)
}

#[derive(Default)]
pub struct SetWelcomeHandler;

#[async_trait]
impl ActionHandler for SetWelcomeHandler {
    async fn handle(
        &self,
        ctx: &InvocationContext,
        services: &Services,
    ) -> Result<ActionReply, ActionError> {
        let guild_id = ctx.guild_id()?;
        let args = &ctx.arguments;

        if args.option("disable") == Some(&crate::core::actions::OptionValue::Boolean(true)) {
            let existed = services.config.remove(guild_id, CONFIG_KEY).await?;
            return Ok(ActionReply::ephemeral(if existed {
                "Welcome messages disabled."
            } else {
                "Welcome messages were not enabled."
            }));
        }

        let Some(channel_id) = args.option_channel("channel") else {
            return Err(ActionError::input("Pick a channel for welcome messages."));
        };
        let record = WelcomeRecord {
            channel_id,
            message: args
                .option_str("message")
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string),
        };
        services.config.put(guild_id, CONFIG_KEY, &record).await?;

        Ok(ActionReply::ephemeral(format!(
            "👋 New members will be welcomed in <#{channel_id}>.\nPreview: {}",
            record.greeting(ctx.actor.id)
        )))
    }
}

#[derive(Default)]
pub struct CardHandler;

#[async_trait]
impl ActionHandler for CardHandler {
    async fn handle(
        &self,
        ctx: &InvocationContext,
        services: &Services,
    ) -> Result<ActionReply, ActionError> {
        let user_id = ctx.arguments.option_user("user").unwrap_or(ctx.actor.id);

        ctx.responder.provisional("🎨 Rendering card...").await?;

        let profile = services.platform.fetch_user(user_id).await?;
        let subtitle = profile.is_bot.then(|| "Bot".to_string());
        let card = card_for(&profile, profile.display_name.clone(), subtitle);
        let bytes = services.images.render_card(&card).await?;

        Ok(ActionReply::payload(OutgoingMessage::default().with_attachment(
            FileAttachment {
                filename: "card.png".to_string(),
                bytes,
            },
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::actions::{ErrorClass, OptionValue};
    use crate::core::dispatch::RawArguments;
    use crate::core::permissions::ADMINISTRATOR;
    use crate::core::test_support::{actor, MockPlatform, PlatformCall, TestBed};
    use std::collections::BTreeMap;

    fn welcome_options(channel_id: u64, message: &str) -> RawArguments {
        let mut options = BTreeMap::new();
        options.insert("channel".to_string(), OptionValue::Channel(channel_id));
        options.insert("message".to_string(), OptionValue::String(message.into()));
        RawArguments::Options(options)
    }

    fn platform() -> MockPlatform {
        MockPlatform::new().with_channel(30).with_user(42, "newbie")
    }

    #[tokio::test]
    async fn joined_member_gets_card_and_greeting() {
        let bed = TestBed::builder().platform(platform()).build();
        bed.invoke(
            &SetWelcomeHandler,
            actor(5, &[ADMINISTRATOR]),
            welcome_options(30, "Hello {user}, grab a role!"),
        )
        .await
        .0
        .unwrap();

        assert!(greet_member(&bed.services, TestBed::GUILD_ID, 42).await.unwrap());

        let calls = bed.platform.calls();
        let [PlatformCall::Send {
            channel_id: 30,
            payload,
        }] = calls.as_slice()
        else {
            panic!("unexpected calls: {calls:?}");
        };
        assert_eq!(payload.content.as_deref(), Some("Hello <@42>, grab a role!"));
        assert_eq!(payload.attachment.as_ref().unwrap().filename, "welcome.png");
    }

    #[tokio::test]
    async fn renderer_failure_falls_back_to_text() {
        let bed = TestBed::builder()
            .platform(platform())
            .failing_renderer()
            .build();
        bed.services
            .config
            .put(
                TestBed::GUILD_ID,
                CONFIG_KEY,
                &WelcomeRecord {
                    channel_id: 30,
                    message: None,
                },
            )
            .await
            .unwrap();

        assert!(greet_member(&bed.services, TestBed::GUILD_ID, 42).await.unwrap());
        assert_eq!(
            bed.platform.sent_texts(),
            vec!["Welcome to the server, <@42>!".to_string()]
        );
    }

    #[tokio::test]
    async fn no_welcome_channel_means_no_post() {
        let bed = TestBed::builder().platform(platform()).build();
        assert!(!greet_member(&bed.services, TestBed::GUILD_ID, 42).await.unwrap());
        assert!(bed.platform.calls().is_empty());
    }

    #[tokio::test]
    async fn card_posts_provisional_reply_first() {
        let bed = TestBed::builder().platform(platform()).build();
        let mut options = BTreeMap::new();
        options.insert("user".to_string(), OptionValue::User(42));

        let (reply, responder) = bed
            .invoke(&CardHandler, actor(5, &[]), RawArguments::Options(options))
            .await;

        assert_eq!(responder.provisional().len(), 1);
        let ActionReply::Message { payload, .. } = reply.unwrap() else {
            panic!("expected a card");
        };
        assert_eq!(payload.attachment.unwrap().filename, "card.png");
        assert_eq!(bed.renderer.rendered.lock().unwrap()[0].username, "newbie");
    }

    #[tokio::test]
    async fn card_renderer_failure_is_a_collaborator_error() {
        let bed = TestBed::builder()
            .platform(platform())
            .failing_renderer()
            .build();
        let (reply, _) = bed
            .invoke(&CardHandler, actor(42, &[]), RawArguments::Options(BTreeMap::new()))
            .await;

        assert_eq!(reply.unwrap_err().class(), ErrorClass::Collaborator);
    }
}
