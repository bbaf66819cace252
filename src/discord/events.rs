// Gateway events in, core calls out.
//
// Every event is converted into plain ids and core models here; nothing
// below this file sees serenity types.

use crate::core::dispatch::{
    Actor, InboundEvent, InboundInteraction, InboundMessage, InteractionData, Responder,
    SourceLocation,
};
use crate::core::actions::OptionValue;
use crate::core::anti_spam::MessageSample;
use crate::core::permissions::{Capability, CapabilitySet, MANAGE_MESSAGES};
use crate::core::platform::{MemberSummary, RoleMutation};
use crate::core::{reaction_roles, sticky, welcome};
use crate::discord::capabilities;
use crate::discord::presence;
use crate::discord::responders::{InteractionResponder, MessageResponder};
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;
use std::collections::BTreeMap;
use std::sync::Arc;

pub async fn handle_event(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Ready { data_about_bot } => {
            tracing::info!("Connected as {}", data_about_bot.user.name);
            presence::on_ready(ctx, &data.dispatcher.services().settings.command_prefix);
        }

        serenity::FullEvent::Message { new_message } => on_message(ctx, data, new_message).await,

        serenity::FullEvent::InteractionCreate {
            interaction: serenity::Interaction::Command(command),
        } => on_command(ctx, data, command),

        serenity::FullEvent::GuildMemberAddition { new_member } => {
            if new_member.user.bot {
                return Ok(());
            }
            let services = data.dispatcher.services();
            if let Err(e) =
                welcome::greet_member(services, new_member.guild_id.get(), new_member.user.id.get())
                    .await
            {
                tracing::warn!("Failed to greet {}: {}", new_member.user.id, e);
            }
        }

        serenity::FullEvent::GuildMemberUpdate { new: Some(member), .. } => {
            let summary = MemberSummary {
                user_id: member.user.id.get(),
                display_name: member.display_name().to_string(),
                role_ids: member.roles.iter().map(|r| r.get()).collect(),
                is_bot: member.user.bot,
            };
            let services = data.dispatcher.services();
            if let Err(e) = services
                .tag_sweep
                .apply_to_member(services.platform.as_ref(), member.guild_id.get(), &summary)
                .await
            {
                tracing::warn!("Tag check for {} failed: {}", member.user.id, e);
            }
        }

        serenity::FullEvent::ReactionAdd { add_reaction } => {
            on_reaction(ctx, data, add_reaction, RoleMutation::Add).await
        }

        serenity::FullEvent::ReactionRemove { removed_reaction } => {
            on_reaction(ctx, data, removed_reaction, RoleMutation::Remove).await
        }

        _ => {}
    }

    Ok(())
}

async fn on_message(ctx: &serenity::Context, data: &Data, message: &serenity::Message) {
    // Bots (including ourselves) never trigger screening, stickies or commands.
    if message.author.bot {
        return;
    }
    let services = data.dispatcher.services();

    let capabilities = match message.guild_id {
        Some(guild_id) => {
            let roles = message
                .member
                .as_ref()
                .map(|m| m.roles.as_slice())
                .unwrap_or(&[]);
            capabilities::for_member(&ctx.cache, guild_id, message.author.id, roles)
        }
        None => CapabilitySet::new(),
    };

    if let Some(guild_id) = message.guild_id {
        let sample = MessageSample {
            guild_id: guild_id.get(),
            channel_id: message.channel_id.get(),
            message_id: message.id.get(),
            author_id: message.author.id.get(),
            content: message.content.clone(),
            mention_count: (message.mentions.len() + message.mention_roles.len()) as u32,
            exempt: capabilities.contains(&Capability::new(MANAGE_MESSAGES)),
        };
        match services
            .anti_spam
            .screen(services.platform.as_ref(), &sample)
            .await
        {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => tracing::error!("Spam check failed: {}", e),
        }
    }

    let event = InboundEvent::Message(InboundMessage {
        actor: Actor {
            id: message.author.id.get(),
            name: message.author.name.clone(),
            is_bot: message.author.bot,
            capabilities,
        },
        source: SourceLocation {
            guild_id: message.guild_id.map(|g| g.get()),
            channel_id: message.channel_id.get(),
        },
        message_id: message.id.get(),
        content: message.content.clone(),
        attachment_urls: message.attachments.iter().map(|a| a.url.clone()).collect(),
    });
    let responder: Arc<dyn Responder> = Arc::new(MessageResponder::new(
        ctx.http.clone(),
        message.channel_id.get(),
        message.id.get(),
    ));
    let dispatcher = Arc::clone(&data.dispatcher);
    tokio::spawn(async move {
        dispatcher.dispatch(event, responder).await;
    });

    if let Some(guild_id) = message.guild_id {
        if let Err(e) = sticky::repost(services, guild_id.get(), message.channel_id.get()).await {
            tracing::warn!("Sticky repost in {} failed: {}", message.channel_id, e);
        }
    }
}

fn option_value(value: &serenity::ResolvedValue<'_>) -> Option<OptionValue> {
    Some(match value {
        serenity::ResolvedValue::String(s) => OptionValue::String(s.to_string()),
        serenity::ResolvedValue::Integer(i) => OptionValue::Integer(*i),
        serenity::ResolvedValue::Number(n) => OptionValue::Number(*n),
        serenity::ResolvedValue::Boolean(b) => OptionValue::Boolean(*b),
        serenity::ResolvedValue::User(user, _) => OptionValue::User(user.id.get()),
        serenity::ResolvedValue::Channel(channel) => OptionValue::Channel(channel.id.get()),
        serenity::ResolvedValue::Role(role) => OptionValue::Role(role.id.get()),
        _ => return None,
    })
}

fn interaction_data(command: &serenity::CommandInteraction) -> Option<InteractionData> {
    let target = command.data.target_id.map(|t| t.get());
    match command.data.kind {
        serenity::CommandType::ChatInput => {
            let options: BTreeMap<String, OptionValue> = command
                .data
                .options()
                .iter()
                .filter_map(|o| option_value(&o.value).map(|v| (o.name.to_string(), v)))
                .collect();
            Some(InteractionData::Command { options })
        }
        serenity::CommandType::User => target.map(|user_id| InteractionData::UserTarget { user_id }),
        serenity::CommandType::Message => {
            target.map(|message_id| InteractionData::MessageTarget { message_id })
        }
        _ => None,
    }
}

fn on_command(ctx: &serenity::Context, data: &Data, command: &serenity::CommandInteraction) {
    let Some(interaction_data) = interaction_data(command) else {
        tracing::debug!("Ignoring unsupported command type for {}", command.data.name);
        return;
    };

    let capabilities = command
        .member
        .as_ref()
        .and_then(|m| m.permissions)
        .map(capabilities::from_permissions)
        .unwrap_or_default();

    let event = InboundEvent::Interaction(InboundInteraction {
        actor: Actor {
            id: command.user.id.get(),
            name: command.user.name.clone(),
            is_bot: command.user.bot,
            capabilities,
        },
        source: SourceLocation {
            guild_id: command.guild_id.map(|g| g.get()),
            channel_id: command.channel_id.get(),
        },
        name: command.data.name.clone(),
        data: interaction_data,
    });
    let responder: Arc<dyn Responder> =
        Arc::new(InteractionResponder::new(ctx.http.clone(), command.clone()));
    let dispatcher = Arc::clone(&data.dispatcher);
    tokio::spawn(async move {
        dispatcher.dispatch(event, responder).await;
    });
}

fn emoji_key(emoji: &serenity::ReactionType) -> String {
    match emoji {
        serenity::ReactionType::Custom { id, .. } => id.get().to_string(),
        other => other.to_string(),
    }
}

async fn on_reaction(
    ctx: &serenity::Context,
    data: &Data,
    reaction: &serenity::Reaction,
    mutation: RoleMutation,
) {
    let (Some(guild_id), Some(user_id)) = (reaction.guild_id, reaction.user_id) else {
        return;
    };
    if user_id == ctx.cache.current_user().id {
        return;
    }

    let services = data.dispatcher.services();
    match reaction_roles::on_reaction(
        services,
        guild_id.get(),
        reaction.message_id.get(),
        user_id.get(),
        &emoji_key(&reaction.emoji),
        mutation,
    )
    .await
    {
        Ok(_) => {}
        Err(e) => tracing::warn!("Reaction role for {} failed: {}", user_id, e),
    }
}
