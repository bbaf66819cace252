// Member moderation actions: ban, kick, role add/remove.
//
// The gate has already checked the actor's capability. What can still fail
// here is the bot's own standing (role hierarchy, missing permission), which
// comes back from the platform as Forbidden.

use crate::core::actions::arguments::{parse_role_id, parse_user_id, required};
use crate::core::actions::{ActionError, ActionHandler, ActionReply};
use crate::core::dispatch::InvocationContext;
use crate::core::platform::RoleMutation;
use crate::core::services::Services;
use async_trait::async_trait;

const DEFAULT_REASON: &str = "No reason provided";

/// `<user> [reason...]`, shared by ban and kick.
fn target_and_reason(ctx: &InvocationContext, usage: &str) -> Result<(u64, String), ActionError> {
    let tokens = ctx.arguments.tokens();
    let user_id = parse_user_id(required(tokens, 0, usage)?)?;
    if user_id == ctx.actor.id {
        return Err(ActionError::input("You can't use this on yourself."));
    }
    let reason = match tokens.get(1..) {
        Some(rest) if !rest.is_empty() => rest.join(" "),
        _ => DEFAULT_REASON.to_string(),
    };
    Ok((user_id, reason))
}

#[derive(Default)]
pub struct BanHandler;

#[async_trait]
impl ActionHandler for BanHandler {
    async fn handle(
        &self,
        ctx: &InvocationContext,
        services: &Services,
    ) -> Result<ActionReply, ActionError> {
        let guild_id = ctx.guild_id()?;
        let (user_id, reason) = target_and_reason(ctx, "ban <user> [reason]")?;

        services
            .platform
            .ban_member(guild_id, user_id, &reason)
            .await?;

        tracing::info!(guild_id, user_id, moderator_id = ctx.actor.id, "Member banned");
        Ok(ActionReply::text(format!(
            "🔨 Banned <@{user_id}>. Reason: {reason}"
        )))
    }
}

#[derive(Default)]
pub struct KickHandler;

#[async_trait]
impl ActionHandler for KickHandler {
    async fn handle(
        &self,
        ctx: &InvocationContext,
        services: &Services,
    ) -> Result<ActionReply, ActionError> {
        let guild_id = ctx.guild_id()?;
        let (user_id, reason) = target_and_reason(ctx, "kick <user> [reason]")?;

        services
            .platform
            .kick_member(guild_id, user_id, &reason)
            .await?;

        tracing::info!(guild_id, user_id, moderator_id = ctx.actor.id, "Member kicked");
        Ok(ActionReply::text(format!(
            "👢 Kicked <@{user_id}>. Reason: {reason}"
        )))
    }
}

#[derive(Default)]
pub struct RoleHandler;

const ROLE_USAGE: &str = "role add|remove <user> <role>";

#[async_trait]
impl ActionHandler for RoleHandler {
    async fn handle(
        &self,
        ctx: &InvocationContext,
        services: &Services,
    ) -> Result<ActionReply, ActionError> {
        let guild_id = ctx.guild_id()?;
        let tokens = ctx.arguments.tokens();

        let mutation = match required(tokens, 0, ROLE_USAGE)?.to_lowercase().as_str() {
            "add" | "give" => RoleMutation::Add,
            "remove" | "take" => RoleMutation::Remove,
            _ => return Err(ActionError::input(format!("Usage: {ROLE_USAGE}"))),
        };
        let user_id = parse_user_id(required(tokens, 1, ROLE_USAGE)?)?;
        let role_id = parse_role_id(required(tokens, 2, ROLE_USAGE)?)?;

        services
            .platform
            .mutate_role(guild_id, user_id, role_id, mutation)
            .await?;

        let text = match mutation {
            RoleMutation::Add => format!("✅ Gave <@&{role_id}> to <@{user_id}>."),
            RoleMutation::Remove => format!("✅ Removed <@&{role_id}> from <@{user_id}>."),
        };
        Ok(ActionReply::text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::actions::ErrorClass;
    use crate::core::permissions::{KICK_MEMBERS, MANAGE_ROLES};
    use crate::core::test_support::{actor, tokens, MockPlatform, PlatformCall, TestBed};

    #[tokio::test]
    async fn kick_defaults_the_reason() {
        let bed = TestBed::builder().build();
        let (reply, _) = bed
            .invoke(&KickHandler, actor(5, &[KICK_MEMBERS]), tokens("<@!42>"))
            .await;

        assert!(reply.is_ok());
        assert_eq!(
            bed.platform.calls(),
            vec![PlatformCall::Kick {
                guild_id: TestBed::GUILD_ID,
                user_id: 42,
                reason: DEFAULT_REASON.into()
            }]
        );
    }

    #[tokio::test]
    async fn self_targeting_is_rejected() {
        let bed = TestBed::builder().build();
        let (reply, _) = bed.invoke(&BanHandler, actor(5, &[]), tokens("5 oops")).await;

        assert_eq!(reply.unwrap_err().class(), ErrorClass::UserInput);
        assert!(bed.platform.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_target_shows_usage() {
        let bed = TestBed::builder().build();
        let (reply, _) = bed.invoke(&BanHandler, actor(5, &[]), tokens("")).await;

        let err = reply.unwrap_err();
        assert!(err.user_message().contains("Usage: ban"));
    }

    #[tokio::test]
    async fn role_add_and_remove() {
        let bed = TestBed::builder().build();
        let mod_actor = actor(5, &[MANAGE_ROLES]);

        bed.invoke(&RoleHandler, mod_actor.clone(), tokens("add <@42> <@&77>"))
            .await
            .0
            .unwrap();
        bed.invoke(&RoleHandler, mod_actor.clone(), tokens("remove 42 77"))
            .await
            .0
            .unwrap();

        assert_eq!(
            bed.platform.calls(),
            vec![
                PlatformCall::Role {
                    guild_id: TestBed::GUILD_ID,
                    user_id: 42,
                    role_id: 77,
                    mutation: RoleMutation::Add
                },
                PlatformCall::Role {
                    guild_id: TestBed::GUILD_ID,
                    user_id: 42,
                    role_id: 77,
                    mutation: RoleMutation::Remove
                },
            ]
        );

        let (reply, _) = bed.invoke(&RoleHandler, mod_actor, tokens("swap 42 77")).await;
        assert_eq!(reply.unwrap_err().class(), ErrorClass::UserInput);
    }

    #[tokio::test]
    async fn bot_lacking_permission_surfaces_as_denied() {
        let bed = TestBed::builder()
            .platform(MockPlatform::new().forbid_role(77))
            .build();
        let (reply, _) = bed
            .invoke(&RoleHandler, actor(5, &[MANAGE_ROLES]), tokens("add 42 77"))
            .await;

        assert_eq!(reply.unwrap_err().class(), ErrorClass::PermissionDenied);
    }
}
