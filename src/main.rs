// This is the entry point of the Discord bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (storage, HTTP services)
// - `discord/` = Discord-specific adapters (platform client, responders, events)
//
// This file's job is to:
// 1. Load configuration
// 2. Load the action registry
// 3. Wire services together once the Discord client is up
// 4. Route gateway events into the dispatcher

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::core::actions::{HandlerCatalog, RegistryHandle};
use crate::core::dispatch::Dispatcher;
use crate::core::services::Services;
use crate::core::settings::BotSettings;
use crate::core::tag_sweep::SweepOutcome;
use crate::discord::events::handle_event;
use crate::discord::platform::SerenityPlatform;
use crate::discord::{Data, Error};
use crate::infra::config::SqliteConfigStore;
use crate::infra::media::{HttpCardRenderer, HttpOcrClient};
use anyhow::Context as _;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use std::time::Duration;

const IMAGE_TIMEOUT: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let settings = BotSettings::from_env()?;

    // Keep runtime databases in a dedicated folder so the repo root stays tidy.
    std::fs::create_dir_all(&settings.data_dir).with_context(|| {
        format!("Failed to create data directory {}", settings.data_dir.display())
    })?;
    let db_path = settings.data_dir.join("config.db");
    let store = SqliteConfigStore::open(&db_path.to_string_lossy()).await?;

    let images = HttpCardRenderer::new(settings.image_service_url.clone(), IMAGE_TIMEOUT)?;
    let ocr = HttpOcrClient::new(
        settings.ocr_service_url.clone(),
        settings.ocr_api_key.clone(),
        settings.ocr_timeout,
    )?;

    let registry = RegistryHandle::load(settings.action_roots.clone(), HandlerCatalog::builtin());
    let snapshot = registry.snapshot();
    tracing::info!("Loaded {} actions", snapshot.len());
    for warning in snapshot.warnings() {
        tracing::warn!("{}", warning);
    }
    drop(snapshot);

    let token = settings.token.clone();

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================
    // Actions are not poise commands: every message and interaction goes
    // through the event handler and the dispatcher.

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required to read message content
        | serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_MESSAGE_REACTIONS;

    let framework = poise::Framework::<Data, Error>::builder()
        .options(poise::FrameworkOptions {
            commands: vec![],
            event_handler: |ctx, event, _framework, data| Box::pin(handle_event(ctx, event, data)),
            ..Default::default()
        })
        .setup(move |ctx, _ready, _framework| {
            Box::pin(async move {
                println!("🤖 Bot is starting up...");

                // The platform client needs the live HTTP handle, so the
                // composition root finishes here.
                let services = Arc::new(Services::new(
                    settings,
                    Arc::new(SerenityPlatform::new(ctx.http.clone())),
                    Arc::new(store),
                    Arc::new(images),
                    Arc::new(ocr),
                    Arc::new(registry),
                ));

                let published = services
                    .platform
                    .sync_commands(
                        services.settings.primary_guild_id,
                        services.registry.snapshot().actions(),
                    )
                    .await?;
                println!("✅ {} application commands registered!", published);

                spawn_tag_sweep(Arc::clone(&services));

                println!("🚀 Bot is ready!");
                Ok(Data {
                    dispatcher: Arc::new(Dispatcher::new(services)),
                })
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .context("Failed to create Discord client")?;

    client.start().await.context("Discord client stopped")?;
    Ok(())
}

/// Periodic display-name tag sweep. Overlapping runs are skipped by the sweeper.
fn spawn_tag_sweep(services: Arc<Services>) {
    if services.tag_sweep.config().is_none() {
        return;
    }
    let interval = services.settings.tag_sweep_interval;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match services.tag_sweep.run(services.platform.as_ref()).await {
                Ok(SweepOutcome::Completed(_)) | Ok(SweepOutcome::Disabled) => {}
                Ok(SweepOutcome::Skipped) => tracing::debug!("Previous tag sweep still running"),
                Err(e) => tracing::warn!("Tag sweep failed: {}", e),
            }
        }
    });
}
