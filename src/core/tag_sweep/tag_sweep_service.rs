// Tag sweep - members whose display name carries the server tag get the tag
// role; members who dropped the tag lose it.
//
// Runs periodically from main, on demand through the `tagsweep` action, and
// for a single member on member updates. Only one full sweep runs at a time.

use crate::core::actions::{ActionError, ActionHandler, ActionReply};
use crate::core::dispatch::InvocationContext;
use crate::core::flows::SingleFlight;
use crate::core::platform::{MemberSummary, PlatformClient, PlatformError, RoleMutation};
use crate::core::services::Services;
use crate::core::settings::TagSweepConfig;
use async_trait::async_trait;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub added: usize,
    pub removed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed(SweepReport),
    /// Another sweep was already running.
    Skipped,
    /// No tag or role configured.
    Disabled,
}

pub struct TagSweeper {
    config: Option<TagSweepConfig>,
    flight: SingleFlight,
}

impl TagSweeper {
    pub fn new(config: Option<TagSweepConfig>) -> Self {
        Self {
            config,
            flight: SingleFlight::new(),
        }
    }

    pub fn config(&self) -> Option<&TagSweepConfig> {
        self.config.as_ref()
    }

    fn desired(config: &TagSweepConfig, member: &MemberSummary) -> Option<RoleMutation> {
        if member.is_bot {
            return None;
        }
        let tagged = member
            .display_name
            .to_lowercase()
            .contains(&config.tag.to_lowercase());
        match (tagged, member.has_role(config.role_id)) {
            (true, false) => Some(RoleMutation::Add),
            (false, true) => Some(RoleMutation::Remove),
            _ => None,
        }
    }

    /// Bring one member in line. Returns the change made, if any.
    pub async fn apply_to_member(
        &self,
        platform: &dyn PlatformClient,
        guild_id: u64,
        member: &MemberSummary,
    ) -> Result<Option<RoleMutation>, PlatformError> {
        let Some(config) = self.config.as_ref().filter(|c| c.guild_id == guild_id) else {
            return Ok(None);
        };
        let Some(mutation) = Self::desired(config, member) else {
            return Ok(None);
        };
        platform
            .mutate_role(guild_id, member.user_id, config.role_id, mutation)
            .await?;
        Ok(Some(mutation))
    }

    /// Sweep every member of the configured guild.
    pub async fn run(&self, platform: &dyn PlatformClient) -> Result<SweepOutcome, PlatformError> {
        let Some(config) = self.config.as_ref() else {
            return Ok(SweepOutcome::Disabled);
        };
        let Some(_flight) = self.flight.try_begin() else {
            tracing::debug!("Tag sweep already in flight, skipping");
            return Ok(SweepOutcome::Skipped);
        };

        let members = platform.list_members(config.guild_id).await?;
        let mut report = SweepReport {
            scanned: members.len(),
            ..Default::default()
        };

        for member in &members {
            let Some(mutation) = Self::desired(config, member) else {
                continue;
            };
            match platform
                .mutate_role(config.guild_id, member.user_id, config.role_id, mutation)
                .await
            {
                Ok(()) => match mutation {
                    RoleMutation::Add => report.added += 1,
                    RoleMutation::Remove => report.removed += 1,
                },
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(user_id = member.user_id, "Tag sweep role update failed: {}", e);
                }
            }
        }

        tracing::info!(
            guild_id = config.guild_id,
            scanned = report.scanned,
            added = report.added,
            removed = report.removed,
            failed = report.failed,
            "Tag sweep finished"
        );
        Ok(SweepOutcome::Completed(report))
    }
}

#[derive(Default)]
pub struct TagSweepHandler;

#[async_trait]
impl ActionHandler for TagSweepHandler {
    async fn handle(
        &self,
        ctx: &InvocationContext,
        services: &Services,
    ) -> Result<ActionReply, ActionError> {
        ctx.responder.provisional("🔄 Sweeping member tags...").await?;

        match services.tag_sweep.run(services.platform.as_ref()).await? {
            SweepOutcome::Completed(report) => Ok(ActionReply::text(format!(
                "✅ Tag sweep done: {} members checked, {} roles added, {} removed{}.",
                report.scanned,
                report.added,
                report.removed,
                if report.failed > 0 {
                    format!(", {} failed", report.failed)
                } else {
                    String::new()
                }
            ))),
            SweepOutcome::Skipped => Ok(ActionReply::ephemeral(
                "⏳ A tag sweep is already running.",
            )),
            SweepOutcome::Disabled => Err(ActionError::input(
                "The tag sweep isn't configured (TAG_SWEEP_TAG and TAG_SWEEP_ROLE_ID).",
            )),
        }
    }
}
