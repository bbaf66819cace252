// Compiled-in handler table. Manifests refer to handlers by these keys; a
// manifest naming a key that is not here is rejected at load time.

use super::action_models::ActionHandler;
use crate::core::{
    anti_spam, messaging, moderation, reaction_roles, sticky, tag_sweep, utility, verification,
    welcome,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a fresh handler instance; called once per descriptor at load.
pub type HandlerFactory = fn() -> Arc<dyn ActionHandler>;

/// Factory for unit handlers.
pub fn factory<H: ActionHandler + Default + 'static>() -> Arc<dyn ActionHandler> {
    Arc::new(H::default())
}

#[derive(Clone, Default)]
pub struct HandlerCatalog {
    factories: HashMap<&'static str, HandlerFactory>,
}

impl HandlerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &'static str, factory: HandlerFactory) -> Self {
        self.factories.insert(key, factory);
        self
    }

    pub fn instantiate(&self, key: &str) -> Option<Arc<dyn ActionHandler>> {
        self.factories.get(key).map(|factory| factory())
    }

    /// Every handler the bot ships with.
    pub fn builtin() -> Self {
        Self::new()
            .with("help", factory::<utility::HelpHandler>)
            .with("ping", factory::<utility::PingHandler>)
            .with("avatar", factory::<utility::AvatarHandler>)
            .with("reload", factory::<utility::ReloadHandler>)
            .with("ban", factory::<moderation::BanHandler>)
            .with("kick", factory::<moderation::KickHandler>)
            .with("role", factory::<moderation::RoleHandler>)
            .with("say", factory::<messaging::SayHandler>)
            .with("embed", factory::<messaging::EmbedHandler>)
            .with("edit_message", factory::<messaging::EditMessageHandler>)
            .with("announce", factory::<messaging::AnnounceHandler>)
            .with("quote", factory::<messaging::QuoteHandler>)
            .with("sticky", factory::<sticky::StickyHandler>)
            .with("set_welcome", factory::<welcome::SetWelcomeHandler>)
            .with("card", factory::<welcome::CardHandler>)
            .with("verify_setup", factory::<verification::VerifySetupHandler>)
            .with("verify", factory::<verification::VerifyHandler>)
            .with("reaction_role", factory::<reaction_roles::ReactionRoleHandler>)
            .with("antispam", factory::<anti_spam::AntiSpamHandler>)
            .with("tag_sweep", factory::<tag_sweep::TagSweepHandler>)
    }
}
