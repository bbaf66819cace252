// The core module contains all business logic.
// Each feature gets its own submodule; nothing in here touches serenity.

#[path = "actions/mod.rs"]
pub mod actions;

#[path = "anti_spam/mod.rs"]
pub mod anti_spam;

#[path = "config_store/config_store.rs"]
pub mod config_store;

#[path = "dispatch/mod.rs"]
pub mod dispatch;

#[path = "flows/mod.rs"]
pub mod flows;

#[path = "media/media_ports.rs"]
pub mod media;

#[path = "messaging/mod.rs"]
pub mod messaging;

#[path = "moderation/mod.rs"]
pub mod moderation;

#[path = "permissions/permission_gate.rs"]
pub mod permissions;

#[path = "platform/platform_client.rs"]
pub mod platform;

#[path = "reaction_roles/mod.rs"]
pub mod reaction_roles;

#[path = "services.rs"]
pub mod services;

#[path = "settings.rs"]
pub mod settings;

#[path = "sticky/mod.rs"]
pub mod sticky;

#[path = "tag_sweep/mod.rs"]
pub mod tag_sweep;

#[path = "utility/mod.rs"]
pub mod utility;

#[path = "verification/mod.rs"]
pub mod verification;

#[path = "welcome/mod.rs"]
pub mod welcome;

#[cfg(test)]
#[path = "test_support.rs"]
pub mod test_support;
