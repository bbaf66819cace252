// General purpose actions: help, ping, avatar and the owner-only reload.

use crate::core::actions::{
    ActionDescriptor, ActionError, ActionHandler, ActionKind, ActionReply,
};
use crate::core::actions::arguments::parse_user_id;
use crate::core::dispatch::{InvocationContext, TargetRef};
use crate::core::permissions::{check, GateDecision};
use crate::core::platform::{EmbedSpec, OutgoingMessage};
use crate::core::services::Services;
use async_trait::async_trait;
use std::fmt::Write;

/// How many load warnings a reload reply lists before summarizing.
const MAX_LISTED_WARNINGS: usize = 10;

fn invocation(descriptor: &ActionDescriptor, prefix: &str) -> String {
    match descriptor.kind {
        ActionKind::TextCommand => format!("`{prefix}{}`", descriptor.primary_name),
        ActionKind::StructuredCommand => format!("`/{}`", descriptor.primary_name),
        ActionKind::ContextAction(_) => format!("**{}**", descriptor.primary_name),
    }
}

// ============================================================================
// HELP
// ============================================================================

#[derive(Default)]
pub struct HelpHandler;

#[async_trait]
impl ActionHandler for HelpHandler {
    async fn handle(
        &self,
        ctx: &InvocationContext,
        services: &Services,
    ) -> Result<ActionReply, ActionError> {
        let registry = services.registry.snapshot();
        let prefix = &services.settings.command_prefix;
        let allowed = |d: &ActionDescriptor| {
            check(d.required_capability.as_ref(), &ctx.actor.capabilities, ctx.is_owner)
                == GateDecision::Allow
        };

        // `help <action>` shows one action in detail.
        if let Some(name) = ctx.arguments.tokens().first() {
            let descriptor = registry
                .resolve(name)
                .filter(|d| allowed(d))
                .ok_or_else(|| ActionError::NotFound(format!("There is no action called `{name}`.")))?;

            let mut text = format!("{} ({})\n", invocation(&descriptor, prefix), descriptor.kind.label());
            if !descriptor.description.is_empty() {
                let _ = writeln!(text, "{}", descriptor.description);
            }
            if let Some(usage) = &descriptor.usage {
                let _ = writeln!(text, "Usage: `{prefix}{usage}`");
            }
            if !descriptor.aliases.is_empty() {
                let _ = writeln!(text, "Aliases: {}", descriptor.aliases.join(", "));
            }
            return Ok(ActionReply::ephemeral(text.trim_end()));
        }

        let mut text = String::from("**Available actions**\n");
        for descriptor in registry.actions().iter().filter(|d| allowed(d)) {
            let _ = write!(text, "{}", invocation(descriptor, prefix));
            if !descriptor.aliases.is_empty() {
                let _ = write!(text, " ({})", descriptor.aliases.join(", "));
            }
            if !descriptor.description.is_empty() {
                let _ = write!(text, ": {}", descriptor.description);
            }
            text.push('\n');
        }
        let _ = write!(text, "Use `{prefix}help <action>` for details.");

        Ok(ActionReply::ephemeral(text))
    }
}

// ============================================================================
// PING / AVATAR
// ============================================================================

#[derive(Default)]
pub struct PingHandler;

#[async_trait]
impl ActionHandler for PingHandler {
    async fn handle(
        &self,
        _ctx: &InvocationContext,
        _services: &Services,
    ) -> Result<ActionReply, ActionError> {
        Ok(ActionReply::text("🏓 Pong!"))
    }
}

#[derive(Default)]
pub struct AvatarHandler;

#[async_trait]
impl ActionHandler for AvatarHandler {
    async fn handle(
        &self,
        ctx: &InvocationContext,
        services: &Services,
    ) -> Result<ActionReply, ActionError> {
        let args = &ctx.arguments;
        let user_id = match args.target() {
            Some(TargetRef::User(id)) => id,
            Some(TargetRef::Message(_)) => return Err(ActionError::input("Use this on a user.")),
            None => match (args.option_user("user"), args.tokens().first()) {
                (Some(id), _) => id,
                (None, Some(raw)) => parse_user_id(raw)?,
                (None, None) => ctx.actor.id,
            },
        };

        let profile = services.platform.fetch_user(user_id).await?;
        let embed = EmbedSpec {
            title: Some(format!("{}'s avatar", profile.display_name)),
            image_url: Some(profile.avatar_url.clone()),
            description: Some(format!("[Open in browser]({})", profile.avatar_url)),
            ..Default::default()
        };
        Ok(ActionReply::Message {
            payload: OutgoingMessage::embed(embed),
            ephemeral: true,
        })
    }
}

// ============================================================================
// RELOAD
// ============================================================================

#[derive(Default)]
pub struct ReloadHandler;

#[async_trait]
impl ActionHandler for ReloadHandler {
    async fn handle(
        &self,
        _ctx: &InvocationContext,
        services: &Services,
    ) -> Result<ActionReply, ActionError> {
        let registry = services.registry.reload();

        let mut text = format!("🔄 Reloaded {} actions.", registry.len());

        let scope = services.settings.primary_guild_id;
        match services
            .platform
            .sync_commands(scope, registry.actions())
            .await
        {
            Ok(published) => {
                let _ = write!(text, " Published {published} slash/menu commands.");
            }
            Err(e) => {
                tracing::warn!("Command sync after reload failed: {}", e);
                text.push_str(" ⚠️ Publishing slash commands failed, see logs.");
            }
        }

        let warnings = registry.warnings();
        if !warnings.is_empty() {
            let _ = write!(text, "\n**{} manifest(s) skipped:**", warnings.len());
            for warning in warnings.iter().take(MAX_LISTED_WARNINGS) {
                let _ = write!(text, "\n• {warning}");
            }
            if warnings.len() > MAX_LISTED_WARNINGS {
                let _ = write!(text, "\n…and {} more", warnings.len() - MAX_LISTED_WARNINGS);
            }
        }

        Ok(ActionReply::ephemeral(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::actions::{ActionRegistry, ContextTarget, ErrorClass};
    use crate::core::dispatch::{DispatchState, RawArguments};
    use crate::core::moderation::BanHandler;
    use crate::core::permissions::{BAN_MEMBERS, OWNER};
    use crate::core::test_support::{actor, message_event, tokens, MockPlatform, PlatformCall, TestBed};
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn registry() -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        let mut help = ActionDescriptor::new("help", ActionKind::TextCommand, Arc::new(HelpHandler))
            .with_aliases(["commands"]);
        help.description = "List actions".into();
        help.usage = Some("help [action]".into());
        registry.register(help).unwrap();
        registry
            .register(
                ActionDescriptor::new("ban", ActionKind::TextCommand, Arc::new(BanHandler))
                    .requiring(BAN_MEMBERS),
            )
            .unwrap();
        registry
            .register(ActionDescriptor::new(
                "Show Avatar",
                ActionKind::ContextAction(ContextTarget::User),
                Arc::new(AvatarHandler),
            ))
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn help_lists_only_permitted_actions() {
        let bed = TestBed::builder().registry(registry()).build();

        let (reply, _) = bed.invoke(&HelpHandler, actor(5, &[]), tokens("")).await;
        let text = reply.unwrap().content().unwrap().to_string();
        assert!(text.contains("`.help` (commands): List actions"));
        assert!(text.contains("**Show Avatar**"));
        assert!(!text.contains("ban"));

        let (reply, _) = bed.invoke(&HelpHandler, actor(5, &[BAN_MEMBERS]), tokens("")).await;
        assert!(reply.unwrap().content().unwrap().contains("`.ban`"));
    }

    #[tokio::test]
    async fn help_for_one_action() {
        let bed = TestBed::builder().registry(registry()).build();

        let (reply, _) = bed.invoke(&HelpHandler, actor(5, &[]), tokens("COMMANDS")).await;
        assert!(reply.unwrap().content().unwrap().contains("Usage: `.help [action]`"));

        // Hidden actions look like unknown ones.
        let (reply, _) = bed.invoke(&HelpHandler, actor(5, &[]), tokens("ban")).await;
        assert_eq!(reply.unwrap_err().class(), ErrorClass::NotFound);
    }

    #[tokio::test]
    async fn avatar_from_context_menu() {
        let bed = TestBed::builder()
            .platform(MockPlatform::new().with_user(42, "zed"))
            .build();
        let (reply, _) = bed
            .invoke(&AvatarHandler, actor(5, &[]), RawArguments::Target(TargetRef::User(42)))
            .await;

        let ActionReply::Message { payload, .. } = reply.unwrap() else {
            panic!("expected an embed");
        };
        assert_eq!(
            payload.embed.unwrap().image_url.as_deref(),
            Some("https://cdn.example/avatars/42.png")
        );

        let (reply, _) = bed.invoke(&AvatarHandler, actor(5, &[]), tokens("<@43>")).await;
        assert_eq!(reply.unwrap_err().class(), ErrorClass::NotFound);
    }

    #[tokio::test]
    async fn reload_is_owner_only_and_swaps_the_registry() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("reload.json"),
            r#"{"name": "reload", "kind": "text", "handler": "reload", "requires": "owner", "silent_deny": true}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("ping.json"),
            r#"{"name": "ping", "kind": "structured", "handler": "ping"}"#,
        )
        .unwrap();
        fs::write(dir.path().join("broken.json"), "nope").unwrap();

        let mut registry = ActionRegistry::new();
        registry
            .register(
                ActionDescriptor::new("reload", ActionKind::TextCommand, Arc::new(ReloadHandler))
                    .requiring(OWNER)
                    .silent(),
            )
            .unwrap();

        let roots = vec![dir.path().to_path_buf()];
        let bed = TestBed::builder()
            .owner(1)
            .settings(|s| s.action_roots = roots)
            .registry(registry)
            .build();

        // Non-owner: silently rejected, nothing reloaded.
        let responder = Arc::new(crate::core::test_support::RecordingResponder::default());
        let report = bed
            .dispatcher
            .dispatch(message_event(actor(5, &[BAN_MEMBERS]), ".reload"), responder.clone())
            .await;
        assert_eq!(report.final_state(), DispatchState::Rejected);
        assert!(responder.texts().is_empty());
        assert!(bed.services.registry.snapshot().resolve("ping").is_none());

        let responder = Arc::new(crate::core::test_support::RecordingResponder::default());
        let report = bed
            .dispatcher
            .dispatch(message_event(actor(1, &[]), ".reload"), responder.clone())
            .await;
        assert_eq!(report.final_state(), DispatchState::Completed);

        let text = &responder.texts()[0];
        assert!(text.contains("Reloaded 2 actions"));
        assert!(text.contains("1 manifest(s) skipped"));
        assert!(bed.services.registry.snapshot().resolve("ping").is_some());
        assert!(bed
            .platform
            .calls()
            .contains(&PlatformCall::Sync { guild_id: None, count: 1 }));
    }
}
