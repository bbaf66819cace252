// Reaction roles - reacting to a bound message grants a role, removing the
// reaction takes it away again.

use crate::core::actions::arguments::{parse_channel_id, parse_message_id, parse_role_id, required};
use crate::core::actions::{ActionError, ActionHandler, ActionReply};
use crate::core::dispatch::InvocationContext;
use crate::core::platform::RoleMutation;
use crate::core::services::Services;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const CONFIG_KEY: &str = "reaction_roles";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionRoleBinding {
    pub channel_id: u64,
    pub message_id: u64,
    /// Normalized with `normalize_emoji`.
    pub emoji: String,
    pub role_id: u64,
}

/// Custom emoji (`<:name:id>`, `<a:name:id>`, `name:id`) become their id;
/// unicode emoji lose the variation selector.
pub fn normalize_emoji(raw: &str) -> String {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(trimmed);

    if let Some((_, id)) = inner.rsplit_once(':') {
        if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
            return id.to_string();
        }
    }
    trimmed.replace('\u{FE0F}', "")
}

/// Apply the binding for a reaction, if there is one.
pub async fn on_reaction(
    services: &Services,
    guild_id: u64,
    message_id: u64,
    user_id: u64,
    emoji: &str,
    mutation: RoleMutation,
) -> Result<bool, ActionError> {
    let emoji = normalize_emoji(emoji);
    let bindings = services
        .config
        .get::<Vec<ReactionRoleBinding>>(guild_id, CONFIG_KEY)
        .await?
        .unwrap_or_default();

    let Some(binding) = bindings
        .iter()
        .find(|b| b.message_id == message_id && b.emoji == emoji)
    else {
        return Ok(false);
    };

    services
        .platform
        .mutate_role(guild_id, user_id, binding.role_id, mutation)
        .await?;
    tracing::debug!(guild_id, user_id, role_id = binding.role_id, ?mutation, "Reaction role applied");
    Ok(true)
}

#[derive(Default)]
pub struct ReactionRoleHandler;

const USAGE: &str =
    "reactionrole <#channel> <message id> <emoji> <role> | reactionrole remove <message id> <emoji>";

#[async_trait]
impl ActionHandler for ReactionRoleHandler {
    async fn handle(
        &self,
        ctx: &InvocationContext,
        services: &Services,
    ) -> Result<ActionReply, ActionError> {
        let guild_id = ctx.guild_id()?;
        let tokens = ctx.arguments.tokens();

        if required(tokens, 0, USAGE)?.eq_ignore_ascii_case("remove") {
            let message_id = parse_message_id(required(tokens, 1, USAGE)?)?;
            let emoji = normalize_emoji(required(tokens, 2, USAGE)?);

            let mut removed = false;
            services
                .config
                .update::<Vec<ReactionRoleBinding>, _>(guild_id, CONFIG_KEY, |current| {
                    let mut bindings = current.unwrap_or_default();
                    let before = bindings.len();
                    bindings.retain(|b| !(b.message_id == message_id && b.emoji == emoji));
                    removed = bindings.len() != before;
                    (!bindings.is_empty()).then_some(bindings)
                })
                .await?;

            return if removed {
                Ok(ActionReply::ephemeral("🗑️ Reaction role removed."))
            } else {
                Err(ActionError::NotFound(
                    "No reaction role is bound to that emoji on that message.".into(),
                ))
            };
        }

        let channel_id = parse_channel_id(required(tokens, 0, USAGE)?)?;
        let message_id = parse_message_id(required(tokens, 1, USAGE)?)?;
        let emoji = normalize_emoji(required(tokens, 2, USAGE)?);
        let role_id = parse_role_id(required(tokens, 3, USAGE)?)?;

        // The message has to exist before anyone can react to it.
        services
            .platform
            .fetch_message(channel_id, message_id)
            .await?;

        let binding = ReactionRoleBinding {
            channel_id,
            message_id,
            emoji,
            role_id,
        };
        services
            .config
            .update::<Vec<ReactionRoleBinding>, _>(guild_id, CONFIG_KEY, |current| {
                let mut bindings = current.unwrap_or_default();
                bindings.retain(|b| !(b.message_id == binding.message_id && b.emoji == binding.emoji));
                bindings.push(binding.clone());
                Some(bindings)
            })
            .await?;

        Ok(ActionReply::ephemeral(format!(
            "✅ Reacting with {} on that message now grants <@&{role_id}>.",
            required(tokens, 2, USAGE)?
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::actions::ErrorClass;
    use crate::core::permissions::MANAGE_ROLES;
    use crate::core::test_support::{actor, tokens, MockPlatform, PlatformCall, TestBed};

    #[test]
    fn emoji_normalization() {
        assert_eq!(normalize_emoji("<:party:123456>"), "123456");
        assert_eq!(normalize_emoji("<a:dance:99>"), "99");
        assert_eq!(normalize_emoji("party:123456"), "123456");
        assert_eq!(normalize_emoji("❤️"), "❤");
        assert_eq!(normalize_emoji(" 👍 "), "👍");
    }

    fn bed() -> TestBed {
        TestBed::builder()
            .platform(MockPlatform::new().with_message(20, 300, 1, "React for roles"))
            .build()
    }

    #[tokio::test]
    async fn bound_reactions_toggle_the_role() {
        let bed = bed();
        bed.invoke(
            &ReactionRoleHandler,
            actor(5, &[MANAGE_ROLES]),
            tokens("<#20> 300 <:gamer:555> <@&77>"),
        )
        .await
        .0
        .unwrap();

        let guild = TestBed::GUILD_ID;
        assert!(on_reaction(&bed.services, guild, 300, 42, "555", RoleMutation::Add)
            .await
            .unwrap());
        assert!(on_reaction(&bed.services, guild, 300, 42, "555", RoleMutation::Remove)
            .await
            .unwrap());
        // Unbound emoji / message.
        assert!(!on_reaction(&bed.services, guild, 300, 42, "👍", RoleMutation::Add)
            .await
            .unwrap());
        assert!(!on_reaction(&bed.services, guild, 301, 42, "555", RoleMutation::Add)
            .await
            .unwrap());

        assert_eq!(
            bed.platform.calls(),
            vec![
                PlatformCall::Role {
                    guild_id: guild,
                    user_id: 42,
                    role_id: 77,
                    mutation: RoleMutation::Add
                },
                PlatformCall::Role {
                    guild_id: guild,
                    user_id: 42,
                    role_id: 77,
                    mutation: RoleMutation::Remove
                },
            ]
        );
    }

    #[tokio::test]
    async fn binding_requires_an_existing_message() {
        let bed = bed();
        let (reply, _) = bed
            .invoke(&ReactionRoleHandler, actor(5, &[]), tokens("<#20> 999 👍 77"))
            .await;
        assert_eq!(reply.unwrap_err().class(), ErrorClass::NotFound);
    }

    #[tokio::test]
    async fn remove_unbinds() {
        let bed = bed();
        let mod_actor = actor(5, &[MANAGE_ROLES]);
        bed.invoke(&ReactionRoleHandler, mod_actor.clone(), tokens("<#20> 300 👍 77"))
            .await
            .0
            .unwrap();

        bed.invoke(&ReactionRoleHandler, mod_actor.clone(), tokens("remove 300 👍"))
            .await
            .0
            .unwrap();
        let (reply, _) = bed
            .invoke(&ReactionRoleHandler, mod_actor, tokens("remove 300 👍"))
            .await;
        assert_eq!(reply.unwrap_err().class(), ErrorClass::NotFound);

        assert!(!on_reaction(&bed.services, TestBed::GUILD_ID, 300, 42, "👍", RoleMutation::Add)
            .await
            .unwrap());
    }
}
