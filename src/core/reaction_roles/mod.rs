pub mod reaction_roles_service;

pub use reaction_roles_service::{normalize_emoji, on_reaction, ReactionRoleBinding, ReactionRoleHandler};
