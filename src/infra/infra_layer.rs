// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "config/mod.rs"]
pub mod config;

#[path = "media/mod.rs"]
pub mod media;

#[path = "env_settings.rs"]
pub mod env_settings;
