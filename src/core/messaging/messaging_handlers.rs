// Posting as the bot: say, embed, edit, announce and quote.

use crate::core::actions::arguments::{
    parse_channel_id, parse_color, parse_http_url, parse_message_id, required, rest_text,
};
use crate::core::actions::{ActionError, ActionHandler, ActionReply};
use crate::core::dispatch::{InvocationContext, TargetRef};
use crate::core::flows::PromptOutcome;
use crate::core::platform::{EmbedSpec, OutgoingMessage};
use crate::core::services::Services;
use async_trait::async_trait;

/// Discord's limit for a message body.
const MAX_CONTENT: usize = 2000;

fn check_length(text: &str) -> Result<(), ActionError> {
    if text.chars().count() > MAX_CONTENT {
        return Err(ActionError::input(format!(
            "That message is too long ({} characters, limit {MAX_CONTENT}).",
            text.chars().count()
        )));
    }
    Ok(())
}

// ============================================================================
// SAY / EDIT
// ============================================================================

#[derive(Default)]
pub struct SayHandler;

#[async_trait]
impl ActionHandler for SayHandler {
    async fn handle(
        &self,
        ctx: &InvocationContext,
        services: &Services,
    ) -> Result<ActionReply, ActionError> {
        const USAGE: &str = "say <#channel> <text>";
        let tokens = ctx.arguments.tokens();
        let channel_id = parse_channel_id(required(tokens, 0, USAGE)?)?;
        let text = rest_text(tokens, 1, USAGE)?;
        check_length(&text)?;

        services
            .platform
            .send_message(channel_id, OutgoingMessage::text(text))
            .await?;
        Ok(ActionReply::ephemeral(format!("✅ Sent to <#{channel_id}>.")))
    }
}

#[derive(Default)]
pub struct EditMessageHandler;

#[async_trait]
impl ActionHandler for EditMessageHandler {
    async fn handle(
        &self,
        ctx: &InvocationContext,
        services: &Services,
    ) -> Result<ActionReply, ActionError> {
        const USAGE: &str = "editmsg <#channel> <message id or link> <new text>";
        let tokens = ctx.arguments.tokens();
        let channel_id = parse_channel_id(required(tokens, 0, USAGE)?)?;
        let message_id = parse_message_id(required(tokens, 1, USAGE)?)?;
        let text = rest_text(tokens, 2, USAGE)?;
        check_length(&text)?;

        // Fetch first so a wrong id reads as "not found" rather than "forbidden".
        services
            .platform
            .fetch_message(channel_id, message_id)
            .await?;
        services
            .platform
            .edit_message(channel_id, message_id, OutgoingMessage::text(text))
            .await?;

        Ok(ActionReply::ephemeral("✅ Message edited."))
    }
}

// ============================================================================
// EMBED
// ============================================================================

#[derive(Default)]
pub struct EmbedHandler;

#[async_trait]
impl ActionHandler for EmbedHandler {
    async fn handle(
        &self,
        ctx: &InvocationContext,
        services: &Services,
    ) -> Result<ActionReply, ActionError> {
        let args = &ctx.arguments;
        let channel_id = args
            .option_channel("channel")
            .unwrap_or(ctx.source.channel_id);

        let title = args.option_str("title").map(str::to_string);
        let description = args.option_str("description").map(str::to_string);
        if title.is_none() && description.is_none() {
            return Err(ActionError::input("An embed needs a title or a description."));
        }

        let color = args.option_str("color").map(parse_color).transpose()?;
        let image_url = args
            .option_str("image")
            .map(|raw| parse_http_url(raw).map(String::from))
            .transpose()?;

        let embed = EmbedSpec {
            title,
            description,
            color,
            image_url,
            footer: args.option_str("footer").map(str::to_string),
        };

        services
            .platform
            .send_message(channel_id, OutgoingMessage::embed(embed))
            .await?;
        Ok(ActionReply::ephemeral(format!(
            "✅ Embed posted in <#{channel_id}>."
        )))
    }
}

// ============================================================================
// ANNOUNCE
// ============================================================================

/// Asks for the announcement text, then posts it. The prompt is answered by
/// the actor's next message in the same channel.
#[derive(Default)]
pub struct AnnounceHandler;

#[async_trait]
impl ActionHandler for AnnounceHandler {
    async fn handle(
        &self,
        ctx: &InvocationContext,
        services: &Services,
    ) -> Result<ActionReply, ActionError> {
        const USAGE: &str = "announce <#channel>";
        let target = parse_channel_id(required(ctx.arguments.tokens(), 0, USAGE)?)?;
        let follow_ups = &services.follow_ups;

        ctx.responder
            .provisional(&format!(
                "📝 What should the announcement in <#{target}> say? Reply within {} seconds, or say `cancel`.",
                follow_ups.timeout().as_secs()
            ))
            .await?;

        let text = match follow_ups
            .await_reply(ctx.source.channel_id, ctx.actor.id)
            .await
        {
            PromptOutcome::Reply(text) => text,
            PromptOutcome::TimedOut => {
                return Ok(ActionReply::text(
                    "⌛ No reply received, announcement cancelled.",
                ))
            }
            PromptOutcome::Superseded => return Ok(ActionReply::Silent),
        };

        if text.trim().eq_ignore_ascii_case("cancel") {
            return Ok(ActionReply::text("Announcement cancelled."));
        }
        check_length(&text)?;

        let embed = EmbedSpec {
            title: Some("📢 Announcement".to_string()),
            description: Some(text),
            color: Some(0x5865F2),
            footer: Some(format!("Posted by {}", ctx.actor.name)),
            ..Default::default()
        };
        services
            .platform
            .send_message(target, OutgoingMessage::embed(embed))
            .await?;

        tracing::info!(channel_id = target, actor_id = ctx.actor.id, "Announcement posted");
        Ok(ActionReply::text(format!("✅ Announcement posted in <#{target}>.")))
    }
}

// ============================================================================
// QUOTE (message context action)
// ============================================================================

#[derive(Default)]
pub struct QuoteHandler;

#[async_trait]
impl ActionHandler for QuoteHandler {
    async fn handle(
        &self,
        ctx: &InvocationContext,
        services: &Services,
    ) -> Result<ActionReply, ActionError> {
        let Some(TargetRef::Message(message_id)) = ctx.arguments.target() else {
            return Err(ActionError::input("Use this on a message."));
        };

        let message = services
            .platform
            .fetch_message(ctx.source.channel_id, message_id)
            .await?;

        let description = if message.content.is_empty() {
            "*(no text)*".to_string()
        } else {
            message.content
        };
        let embed = EmbedSpec {
            description: Some(description),
            footer: Some(format!("Quoted from {}", message.author_name)),
            ..Default::default()
        };
        Ok(ActionReply::payload(OutgoingMessage::embed(embed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::actions::{ActionDescriptor, ActionKind, ActionRegistry, ErrorClass};
    use crate::core::dispatch::{DispatchOutcome, DispatchState, RawArguments};
    use crate::core::permissions::MANAGE_MESSAGES;
    use crate::core::test_support::{
        actor, message_event, short_prompts, tokens, MockPlatform, PlatformCall,
        RecordingResponder, TestBed,
    };
    use std::sync::Arc;

    #[tokio::test]
    async fn say_posts_to_the_channel() {
        let bed = TestBed::builder()
            .platform(MockPlatform::new().with_channel(20))
            .build();
        let (reply, _) = bed
            .invoke(&SayHandler, actor(5, &[MANAGE_MESSAGES]), tokens("<#20> hello   world"))
            .await;

        assert!(reply.is_ok());
        assert_eq!(bed.platform.sent_texts(), vec!["hello world".to_string()]);
    }

    #[tokio::test]
    async fn say_to_unknown_channel_is_not_found() {
        let bed = TestBed::builder().build();
        let (reply, _) = bed.invoke(&SayHandler, actor(5, &[]), tokens("<#404> hi")).await;
        assert_eq!(reply.unwrap_err().class(), ErrorClass::NotFound);
    }

    #[tokio::test]
    async fn edit_requires_an_existing_message() {
        let bed = TestBed::builder()
            .platform(MockPlatform::new().with_message(20, 300, 0, "old"))
            .build();

        let (reply, _) = bed
            .invoke(&EditMessageHandler, actor(5, &[]), tokens("<#20> 301 new text"))
            .await;
        assert_eq!(reply.unwrap_err().class(), ErrorClass::NotFound);

        let (reply, _) = bed
            .invoke(
                &EditMessageHandler,
                actor(5, &[]),
                tokens("<#20> https://discord.com/channels/1/20/300 new text"),
            )
            .await;
        assert!(reply.is_ok());
        assert!(matches!(
            bed.platform.calls().as_slice(),
            [PlatformCall::Edit { message_id: 300, .. }]
        ));
    }

    #[tokio::test]
    async fn embed_validates_color() {
        let bed = TestBed::builder().build();
        let mut options = std::collections::BTreeMap::new();
        options.insert(
            "description".to_string(),
            crate::core::actions::OptionValue::String("hi".into()),
        );
        options.insert(
            "color".to_string(),
            crate::core::actions::OptionValue::String("blue".into()),
        );

        let (reply, _) = bed
            .invoke(&EmbedHandler, actor(5, &[]), RawArguments::Options(options))
            .await;
        assert_eq!(reply.unwrap_err().class(), ErrorClass::UserInput);
        assert!(bed.platform.calls().is_empty());
    }

    fn announce_bed(short_timeout: bool) -> TestBed {
        let mut registry = ActionRegistry::new();
        registry
            .register(ActionDescriptor::new(
                "announce",
                ActionKind::TextCommand,
                Arc::new(AnnounceHandler),
            ))
            .unwrap();
        let builder = TestBed::builder()
            .registry(registry)
            .platform(MockPlatform::new().with_channel(10).with_channel(20));
        if short_timeout {
            builder.settings(short_prompts).build()
        } else {
            builder.build()
        }
    }

    #[tokio::test]
    async fn announce_waits_for_the_follow_up() {
        let bed = Arc::new(announce_bed(false));
        let responder = Arc::new(RecordingResponder::default());

        let flow = {
            let bed = Arc::clone(&bed);
            let responder = responder.clone();
            tokio::spawn(async move {
                bed.dispatcher
                    .dispatch(message_event(actor(5, &[]), ".announce <#20>"), responder)
                    .await
            })
        };
        while bed.services.follow_ups.waiting() == 0 {
            tokio::task::yield_now().await;
        }

        // The answer is consumed by the prompt, not dispatched.
        let answer = bed
            .dispatcher
            .dispatch(
                message_event(actor(5, &[]), "Server maintenance at noon"),
                Arc::new(RecordingResponder::default()),
            )
            .await;
        assert_eq!(answer.outcome, DispatchOutcome::Ignored);

        let report = flow.await.unwrap();
        assert_eq!(report.final_state(), DispatchState::Completed);
        assert_eq!(responder.provisional().len(), 1);

        let calls = bed.platform.calls();
        let [PlatformCall::Send {
            channel_id: 20,
            payload,
        }] = calls.as_slice()
        else {
            panic!("unexpected calls: {calls:?}");
        };
        assert_eq!(
            payload.embed.as_ref().unwrap().description.as_deref(),
            Some("Server maintenance at noon")
        );
    }

    #[tokio::test]
    async fn announce_times_out_without_posting() {
        let bed = announce_bed(true);
        let responder = Arc::new(RecordingResponder::default());

        let report = bed
            .dispatcher
            .dispatch(message_event(actor(5, &[]), ".announce <#20>"), responder.clone())
            .await;

        assert_eq!(report.final_state(), DispatchState::Completed);
        assert!(responder.texts()[0].contains("cancelled"));
        assert!(bed.platform.calls().is_empty());
        assert_eq!(bed.services.follow_ups.waiting(), 0);
    }

    #[tokio::test]
    async fn quote_fetches_the_target_message() {
        let bed = TestBed::builder()
            .platform(MockPlatform::new().with_message(TestBed::CHANNEL_ID, 42, 7, "well said"))
            .build();
        let (reply, _) = bed
            .invoke(
                &QuoteHandler,
                actor(5, &[]),
                RawArguments::Target(TargetRef::Message(42)),
            )
            .await;

        let ActionReply::Message { payload, .. } = reply.unwrap() else {
            panic!("expected a message");
        };
        let embed = payload.embed.unwrap();
        assert_eq!(embed.description.as_deref(), Some("well said"));
        assert_eq!(embed.footer.as_deref(), Some("Quoted from user7"));
    }
}
