// Core moderation module - ban, kick and role management actions.

pub mod moderation_handlers;

pub use moderation_handlers::{BanHandler, KickHandler, RoleHandler};
