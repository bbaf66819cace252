// Serenity-backed implementation of the platform port.

use crate::core::actions::{ActionDescriptor, ActionKind, ContextTarget, OptionKind};
use crate::core::platform::{
    MemberSummary, OutgoingMessage, PlatformClient, PlatformError, PlatformMessage, RoleMutation,
    UserProfile,
};
use crate::discord::render::{create_message, edit_message, platform_error, platform_message};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;
use std::sync::Arc;

const MEMBER_PAGE: u64 = 1000;

pub struct SerenityPlatform {
    http: Arc<serenity::Http>,
}

impl SerenityPlatform {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

fn option_type(kind: OptionKind) -> serenity::CommandOptionType {
    match kind {
        OptionKind::String => serenity::CommandOptionType::String,
        OptionKind::Integer => serenity::CommandOptionType::Integer,
        OptionKind::Number => serenity::CommandOptionType::Number,
        OptionKind::Boolean => serenity::CommandOptionType::Boolean,
        OptionKind::User => serenity::CommandOptionType::User,
        OptionKind::Channel => serenity::CommandOptionType::Channel,
        OptionKind::Role => serenity::CommandOptionType::Role,
    }
}

/// Builds the application command for a descriptor. Text commands have none.
pub fn command_for(descriptor: &ActionDescriptor) -> Option<serenity::CreateCommand> {
    match descriptor.kind {
        ActionKind::TextCommand => None,
        ActionKind::StructuredCommand => {
            let description = if descriptor.description.is_empty() {
                descriptor.primary_name.clone()
            } else {
                descriptor.description.chars().take(100).collect()
            };
            let mut command =
                serenity::CreateCommand::new(&descriptor.primary_name).description(description);
            for option in &descriptor.options {
                command = command.add_option(
                    serenity::CreateCommandOption::new(
                        option_type(option.kind),
                        &option.name,
                        &option.description,
                    )
                    .required(option.required),
                );
            }
            Some(command)
        }
        ActionKind::ContextAction(target) => {
            let kind = match target {
                ContextTarget::User => serenity::CommandType::User,
                ContextTarget::Message => serenity::CommandType::Message,
            };
            Some(serenity::CreateCommand::new(&descriptor.primary_name).kind(kind))
        }
    }
}

#[async_trait]
impl PlatformClient for SerenityPlatform {
    async fn fetch_message(
        &self,
        channel_id: u64,
        message_id: u64,
    ) -> Result<PlatformMessage, PlatformError> {
        let message = serenity::ChannelId::new(channel_id)
            .message(&self.http, serenity::MessageId::new(message_id))
            .await
            .map_err(|e| platform_error("message", e))?;
        Ok(platform_message(&message))
    }

    async fn send_message(
        &self,
        channel_id: u64,
        payload: OutgoingMessage,
    ) -> Result<PlatformMessage, PlatformError> {
        let message = serenity::ChannelId::new(channel_id)
            .send_message(&self.http, create_message(&payload))
            .await
            .map_err(|e| platform_error("channel", e))?;
        Ok(platform_message(&message))
    }

    async fn edit_message(
        &self,
        channel_id: u64,
        message_id: u64,
        payload: OutgoingMessage,
    ) -> Result<PlatformMessage, PlatformError> {
        let message = serenity::ChannelId::new(channel_id)
            .edit_message(
                &self.http,
                serenity::MessageId::new(message_id),
                edit_message(&payload),
            )
            .await
            .map_err(|e| platform_error("message", e))?;
        Ok(platform_message(&message))
    }

    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<(), PlatformError> {
        serenity::ChannelId::new(channel_id)
            .delete_message(&self.http, serenity::MessageId::new(message_id))
            .await
            .map_err(|e| platform_error("message", e))
    }

    async fn mutate_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
        mutation: RoleMutation,
    ) -> Result<(), PlatformError> {
        let guild = serenity::GuildId::new(guild_id);
        let user = serenity::UserId::new(user_id);
        let role = serenity::RoleId::new(role_id);
        let result = match mutation {
            RoleMutation::Add => self.http.add_member_role(guild, user, role, None).await,
            RoleMutation::Remove => self.http.remove_member_role(guild, user, role, None).await,
        };
        result.map_err(|e| platform_error("role", e))
    }

    async fn ban_member(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
    ) -> Result<(), PlatformError> {
        serenity::GuildId::new(guild_id)
            .ban_with_reason(&self.http, serenity::UserId::new(user_id), 0, reason)
            .await
            .map_err(|e| platform_error("member", e))
    }

    async fn kick_member(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
    ) -> Result<(), PlatformError> {
        serenity::GuildId::new(guild_id)
            .kick_with_reason(&self.http, serenity::UserId::new(user_id), reason)
            .await
            .map_err(|e| platform_error("member", e))
    }

    async fn timeout_member(
        &self,
        guild_id: u64,
        user_id: u64,
        until: DateTime<Utc>,
    ) -> Result<(), PlatformError> {
        let until = serenity::Timestamp::from_unix_timestamp(until.timestamp())
            .map_err(|e| PlatformError::Unavailable(e.to_string()))?;
        serenity::GuildId::new(guild_id)
            .edit_member(
                &self.http,
                serenity::UserId::new(user_id),
                serenity::EditMember::new().disable_communication_until_datetime(until),
            )
            .await
            .map(|_| ())
            .map_err(|e| platform_error("member", e))
    }

    async fn fetch_user(&self, user_id: u64) -> Result<UserProfile, PlatformError> {
        let user = self
            .http
            .get_user(serenity::UserId::new(user_id))
            .await
            .map_err(|e| platform_error("user", e))?;
        Ok(UserProfile {
            id: user.id.get(),
            display_name: user.global_name.clone().unwrap_or_else(|| user.name.clone()),
            avatar_url: user.face(),
            is_bot: user.bot,
            name: user.name,
        })
    }

    async fn list_members(&self, guild_id: u64) -> Result<Vec<MemberSummary>, PlatformError> {
        let guild = serenity::GuildId::new(guild_id);
        let mut members = Vec::new();
        let mut after: Option<u64> = None;

        loop {
            let page = self
                .http
                .get_guild_members(guild, Some(MEMBER_PAGE), after)
                .await
                .map_err(|e| platform_error("guild", e))?;
            let count = page.len() as u64;
            after = page.last().map(|m| m.user.id.get());

            members.extend(page.iter().map(|member| MemberSummary {
                user_id: member.user.id.get(),
                display_name: member.display_name().to_string(),
                role_ids: member.roles.iter().map(|r| r.get()).collect(),
                is_bot: member.user.bot,
            }));

            if count < MEMBER_PAGE || after.is_none() {
                break;
            }
        }

        Ok(members)
    }

    async fn sync_commands(
        &self,
        guild_id: Option<u64>,
        actions: &[Arc<ActionDescriptor>],
    ) -> Result<usize, PlatformError> {
        let commands: Vec<serenity::CreateCommand> =
            actions.iter().filter_map(|a| command_for(a)).collect();
        let count = commands.len();

        match guild_id {
            Some(id) => {
                serenity::GuildId::new(id)
                    .set_commands(&self.http, commands)
                    .await
                    .map_err(|e| platform_error("guild commands", e))?;
            }
            None => {
                serenity::Command::set_global_commands(&self.http, commands)
                    .await
                    .map_err(|e| platform_error("global commands", e))?;
            }
        }

        tracing::info!("Published {} application commands", count);
        Ok(count)
    }
}
