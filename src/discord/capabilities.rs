// Translates Discord permission bits into core capabilities.

use crate::core::permissions::{
    CapabilitySet, ADMINISTRATOR, BAN_MEMBERS, KICK_MEMBERS, MANAGE_GUILD, MANAGE_MESSAGES,
    MANAGE_ROLES, MODERATE_MEMBERS,
};
use poise::serenity_prelude as serenity;

const MAPPING: &[(serenity::Permissions, &str)] = &[
    (serenity::Permissions::MANAGE_MESSAGES, MANAGE_MESSAGES),
    (serenity::Permissions::MANAGE_ROLES, MANAGE_ROLES),
    (serenity::Permissions::MANAGE_GUILD, MANAGE_GUILD),
    (serenity::Permissions::BAN_MEMBERS, BAN_MEMBERS),
    (serenity::Permissions::KICK_MEMBERS, KICK_MEMBERS),
    (serenity::Permissions::MODERATE_MEMBERS, MODERATE_MEMBERS),
];

/// Administrators hold every capability.
pub fn from_permissions(permissions: serenity::Permissions) -> CapabilitySet {
    let admin = permissions.contains(serenity::Permissions::ADMINISTRATOR);
    let mut set = CapabilitySet::new();
    if admin {
        set.insert(ADMINISTRATOR);
    }
    for (bit, capability) in MAPPING {
        if admin || permissions.contains(*bit) {
            set.insert(*capability);
        }
    }
    set
}

/// Guild-level permissions: @everyone plus each held role. The guild owner
/// gets everything.
pub fn combine(
    is_guild_owner: bool,
    everyone: serenity::Permissions,
    roles: impl IntoIterator<Item = serenity::Permissions>,
) -> serenity::Permissions {
    if is_guild_owner {
        return serenity::Permissions::all();
    }
    roles.into_iter().fold(everyone, |acc, p| acc | p)
}

/// Resolves a member's capabilities from the cached guild. Empty when the
/// guild is not cached; the gate then only lets unrestricted actions through.
pub fn for_member(
    cache: &serenity::Cache,
    guild_id: serenity::GuildId,
    user_id: serenity::UserId,
    role_ids: &[serenity::RoleId],
) -> CapabilitySet {
    let permissions = {
        let Some(guild) = cache.guild(guild_id) else {
            tracing::debug!("Guild {} not cached, no capabilities resolved", guild_id);
            return CapabilitySet::new();
        };
        // The @everyone role shares the guild's id.
        let everyone = guild
            .roles
            .get(&serenity::RoleId::new(guild_id.get()))
            .map(|r| r.permissions)
            .unwrap_or_else(serenity::Permissions::empty);
        combine(
            guild.owner_id == user_id,
            everyone,
            role_ids
                .iter()
                .filter_map(|id| guild.roles.get(id).map(|r| r.permissions)),
        )
    };
    from_permissions(permissions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::permissions::Capability;

    #[test]
    fn bits_map_to_capabilities() {
        let set = from_permissions(
            serenity::Permissions::BAN_MEMBERS | serenity::Permissions::SEND_MESSAGES,
        );
        assert!(set.contains(&Capability::new(BAN_MEMBERS)));
        assert!(!set.contains(&Capability::new(KICK_MEMBERS)));
        assert!(!set.contains(&Capability::new(ADMINISTRATOR)));
    }

    #[test]
    fn administrator_implies_everything() {
        let set = from_permissions(serenity::Permissions::ADMINISTRATOR);
        for capability in [ADMINISTRATOR, MANAGE_ROLES, MODERATE_MEMBERS, MANAGE_GUILD] {
            assert!(set.contains(&Capability::new(capability)));
        }
    }

    #[test]
    fn roles_stack_on_everyone() {
        let everyone = serenity::Permissions::SEND_MESSAGES;
        let combined = combine(false, everyone, [serenity::Permissions::KICK_MEMBERS]);
        assert!(combined.contains(serenity::Permissions::SEND_MESSAGES));
        assert!(combined.contains(serenity::Permissions::KICK_MEMBERS));
        assert!(!combined.contains(serenity::Permissions::BAN_MEMBERS));

        let owner = combine(true, serenity::Permissions::empty(), []);
        assert!(owner.contains(serenity::Permissions::ADMINISTRATOR));
    }
}
