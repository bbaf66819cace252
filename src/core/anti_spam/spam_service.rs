// Anti-spam service - spam detection plus enforcement.
//
// Handles:
// - Rate limiting (too many messages too quickly)
// - Duplicate content detection
// - Mention spam detection
// - Invite link filtering (opt-in)
// - Warning escalation (warn -> timeout)
//
// Settings are persisted per guild through GuildConfig. Message history,
// warnings and rate-limit blocks are short-lived and stay in memory.

use super::spam_models::{
    MessageRecord, MessageSample, SpamAction, SpamCheckResult, SpamConfig, SpamType,
};
use crate::core::actions::arguments::required;
use crate::core::actions::{ActionError, ActionHandler, ActionReply};
use crate::core::config_store::{GuildConfig, StoreError};
use crate::core::dispatch::InvocationContext;
use crate::core::platform::{OutgoingMessage, PlatformClient};
use crate::core::services::Services;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

pub const CONFIG_KEY: &str = "antispam";

/// Authors quiet for this long lose their history and expired blocks.
const IDLE_RETENTION_SECS: i64 = 600;

const INVITE_MARKERS: [&str; 3] = ["discord.gg/", "discord.com/invite/", "discordapp.com/invite/"];

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct AntiSpamService {
    config: Arc<GuildConfig>,
    /// (user, guild) -> recent messages inside the rate limit window.
    history: DashMap<(u64, u64), Vec<MessageRecord>>,
    warnings: DashMap<(u64, u64), u32>,
    blocked_until: DashMap<(u64, u64), DateTime<Utc>>,
    /// Unix seconds of the last idle sweep.
    last_prune: AtomicI64,
}

impl AntiSpamService {
    pub fn new(config: Arc<GuildConfig>) -> Self {
        Self {
            config,
            history: DashMap::new(),
            warnings: DashMap::new(),
            blocked_until: DashMap::new(),
            last_prune: AtomicI64::new(0),
        }
    }

    /// Drops expired blocks and histories with nothing recent, at most once
    /// per retention period. Returns whether a sweep ran.
    fn prune_idle(&self, now: DateTime<Utc>) -> bool {
        let last = self.last_prune.load(Ordering::Acquire);
        if now.timestamp() - last < IDLE_RETENTION_SECS {
            return false;
        }
        if self
            .last_prune
            .compare_exchange(last, now.timestamp(), Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let cutoff = now - chrono::Duration::seconds(IDLE_RETENTION_SECS);
        self.history
            .retain(|_, records| records.last().is_some_and(|r| r.timestamp >= cutoff));
        self.blocked_until.retain(|_, until| now < *until);
        true
    }

    /// Hash message content for duplicate detection.
    fn hash_content(content: &str) -> u64 {
        let normalized = content.trim().to_lowercase();
        let mut hasher = DefaultHasher::new();
        normalized.hash(&mut hasher);
        hasher.finish()
    }

    fn has_invite(content: &str) -> bool {
        let lowered = content.to_lowercase();
        INVITE_MARKERS.iter().any(|marker| lowered.contains(marker))
    }

    fn add_warning(&self, key: (u64, u64), config: &SpamConfig, spam_type: SpamType) -> SpamCheckResult {
        let count = {
            let mut entry = self.warnings.entry(key).or_insert(0);
            *entry += 1;
            *entry
        };
        if count >= config.warnings_before_timeout {
            self.warnings.remove(&key);
        }
        SpamCheckResult::escalate(spam_type, count, config)
    }

    /// Check a message for spam and decide what to do about it.
    pub async fn check_message(
        &self,
        user_id: u64,
        guild_id: u64,
        content: &str,
        mention_count: u32,
    ) -> Result<SpamCheckResult, StoreError> {
        let config = self.get_config(guild_id).await?;
        if !config.enabled {
            return Ok(SpamCheckResult::ok());
        }

        let key = (user_id, guild_id);
        let now = Utc::now();
        self.prune_idle(now);

        let blocked_until = self.blocked_until.get(&key).map(|until| *until);
        match blocked_until {
            Some(until) if now < until => {
                return Ok(SpamCheckResult::spam(
                    SpamType::RateLimit,
                    SpamAction::DeleteMessage {
                        reason: "You are temporarily rate limited".to_string(),
                    },
                ));
            }
            Some(_) => {
                self.blocked_until.remove(&key);
            }
            None => {}
        }

        // Single-message checks first.
        if mention_count > config.max_mentions_per_message {
            return Ok(self.add_warning(key, &config, SpamType::MentionSpam));
        }
        if config.block_invite_links && Self::has_invite(content) {
            return Ok(self.add_warning(key, &config, SpamType::InviteLink));
        }

        let window_start = now - chrono::Duration::seconds(config.rate_limit_window_secs as i64);
        let content_hash = Self::hash_content(content);

        let (recent, duplicates) = {
            let mut history = self.history.entry(key).or_default();
            history.retain(|record| record.timestamp >= window_start);
            let duplicates = history
                .iter()
                .filter(|record| record.content_hash == content_hash)
                .count();
            (history.len(), duplicates)
        };

        if recent >= config.max_messages_per_window as usize {
            let until = now + chrono::Duration::seconds(config.rate_limit_block_secs as i64);
            self.blocked_until.insert(key, until);
            return Ok(self.add_warning(key, &config, SpamType::RateLimit));
        }

        if duplicates >= config.max_duplicate_messages as usize {
            return Ok(self.add_warning(key, &config, SpamType::DuplicateContent));
        }

        if let Some(mut history) = self.history.get_mut(&key) {
            history.push(MessageRecord {
                content_hash,
                timestamp: now,
            });
        }

        Ok(SpamCheckResult::ok())
    }

    /// Check a guild message and apply the verdict.
    ///
    /// Returns `true` if the message was spam and was handled. Platform
    /// failures while enforcing are logged, not returned.
    pub async fn screen(
        &self,
        platform: &dyn PlatformClient,
        sample: &MessageSample,
    ) -> Result<bool, StoreError> {
        if sample.exempt {
            return Ok(false);
        }

        let result = self
            .check_message(
                sample.author_id,
                sample.guild_id,
                &sample.content,
                sample.mention_count,
            )
            .await?;

        if !result.is_spam {
            return Ok(false);
        }

        tracing::info!(
            guild_id = sample.guild_id,
            user_id = sample.author_id,
            spam_type = %result.spam_type,
            "Spam detected"
        );
        self.enforce(platform, sample, &result).await;
        Ok(true)
    }

    async fn delete_spam(platform: &dyn PlatformClient, sample: &MessageSample) {
        if let Err(e) = platform
            .delete_message(sample.channel_id, sample.message_id)
            .await
        {
            tracing::warn!("Failed to delete spam message: {}", e);
        }
    }

    async fn enforce(
        &self,
        platform: &dyn PlatformClient,
        sample: &MessageSample,
        result: &SpamCheckResult,
    ) {
        match &result.action {
            SpamAction::None => {}

            SpamAction::DeleteMessage { .. } => Self::delete_spam(platform, sample).await,

            SpamAction::Warn {
                reason,
                warning_count,
                warnings_before_timeout,
            } => {
                Self::delete_spam(platform, sample).await;

                let remaining = warnings_before_timeout.saturating_sub(*warning_count);
                let warning = format!(
                    "⚠️ <@{}> **Spam Warning** ({}/{}): {}\n\
                     You have {} warning{} remaining before timeout.",
                    sample.author_id,
                    warning_count,
                    warnings_before_timeout,
                    reason,
                    remaining,
                    if remaining == 1 { "" } else { "s" }
                );
                if let Err(e) = platform
                    .send_message(sample.channel_id, OutgoingMessage::text(warning))
                    .await
                {
                    tracing::warn!("Failed to send spam warning: {}", e);
                }
            }

            SpamAction::Timeout { duration, reason } => {
                Self::delete_spam(platform, sample).await;

                let until = Utc::now() + chrono::Duration::seconds(duration.as_secs() as i64);
                if let Err(e) = platform
                    .timeout_member(sample.guild_id, sample.author_id, until)
                    .await
                {
                    tracing::error!("Failed to timeout user: {}", e);
                    return;
                }

                let notice = format!(
                    "🔇 <@{}> has been timed out for {} minutes: {}",
                    sample.author_id,
                    duration.as_secs() / 60,
                    reason
                );
                if let Err(e) = platform
                    .send_message(sample.channel_id, OutgoingMessage::text(notice))
                    .await
                {
                    tracing::warn!("Failed to send timeout notification: {}", e);
                }
            }
        }
    }

    pub async fn get_config(&self, guild_id: u64) -> Result<SpamConfig, StoreError> {
        Ok(self
            .config
            .get::<SpamConfig>(guild_id, CONFIG_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Locked read-modify-write of the guild's settings.
    pub async fn modify_config<F>(&self, guild_id: u64, apply: F) -> Result<SpamConfig, StoreError>
    where
        F: FnOnce(&mut SpamConfig) + Send,
    {
        let updated = self
            .config
            .update::<SpamConfig, _>(guild_id, CONFIG_KEY, |current| {
                let mut config = current.unwrap_or_default();
                apply(&mut config);
                Some(config)
            })
            .await?;
        Ok(updated.unwrap_or_default())
    }

    pub fn clear_user_warnings(&self, user_id: u64, guild_id: u64) {
        self.warnings.remove(&(user_id, guild_id));
        self.blocked_until.remove(&(user_id, guild_id));
    }
}

// ============================================================================
// ACTION
// ============================================================================

const USAGE: &str = "antispam on | off | status | links on|off | pardon <user>";

fn parse_switch(raw: &str) -> Result<bool, ActionError> {
    match raw.to_lowercase().as_str() {
        "on" | "enable" | "true" => Ok(true),
        "off" | "disable" | "false" => Ok(false),
        _ => Err(ActionError::input(format!("Usage: {USAGE}"))),
    }
}

fn describe(config: &SpamConfig) -> String {
    format!(
        "🛡️ **Anti-spam is {}**\n\
         • {} messages per {}s, {}s block\n\
         • {} duplicates, {} mentions per message\n\
         • Invite links: {}\n\
         • {} warnings before a {} minute timeout",
        if config.enabled { "on" } else { "off" },
        config.max_messages_per_window,
        config.rate_limit_window_secs,
        config.rate_limit_block_secs,
        config.max_duplicate_messages,
        config.max_mentions_per_message,
        if config.block_invite_links { "blocked" } else { "allowed" },
        config.warnings_before_timeout,
        config.timeout_duration_secs / 60
    )
}

#[derive(Default)]
pub struct AntiSpamHandler;

#[async_trait]
impl ActionHandler for AntiSpamHandler {
    async fn handle(
        &self,
        ctx: &InvocationContext,
        services: &Services,
    ) -> Result<ActionReply, ActionError> {
        let guild_id = ctx.guild_id()?;
        let tokens = ctx.arguments.tokens();
        let anti_spam = &services.anti_spam;

        let subcommand = tokens
            .first()
            .map(|t| t.to_lowercase())
            .unwrap_or_else(|| "status".to_string());

        let config = match subcommand.as_str() {
            "status" => anti_spam.get_config(guild_id).await?,
            "on" | "off" => {
                let enabled = subcommand == "on";
                anti_spam
                    .modify_config(guild_id, move |c| c.enabled = enabled)
                    .await?
            }
            "links" => {
                let block = parse_switch(required(tokens, 1, USAGE)?)?;
                anti_spam
                    .modify_config(guild_id, move |c| c.block_invite_links = block)
                    .await?
            }
            "pardon" => {
                let user_id =
                    crate::core::actions::arguments::parse_user_id(required(tokens, 1, USAGE)?)?;
                anti_spam.clear_user_warnings(user_id, guild_id);
                return Ok(ActionReply::text(format!(
                    "✅ Cleared spam warnings for <@{user_id}>."
                )));
            }
            _ => return Err(ActionError::input(format!("Usage: {USAGE}"))),
        };

        tracing::info!(guild_id, enabled = config.enabled, "Anti-spam settings viewed or changed");
        Ok(ActionReply::text(describe(&config)))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::permissions::MANAGE_GUILD;
    use crate::core::test_support::{actor, tokens, MockPlatform, PlatformCall, TestBed};
    use crate::infra::config::InMemoryConfigStore;

    fn service() -> AntiSpamService {
        AntiSpamService::new(Arc::new(GuildConfig::new(Arc::new(InMemoryConfigStore::new()))))
    }

    #[tokio::test]
    async fn test_normal_message_not_spam() {
        let service = service();
        let result = service
            .check_message(123, 456, "Hello world!", 0)
            .await
            .unwrap();

        assert!(!result.is_spam);
        assert_eq!(result.spam_type, SpamType::None);
    }

    #[tokio::test]
    async fn test_mention_spam_detection() {
        let service = service();
        let result = service
            .check_message(123, 456, "Spamming mentions!", 11)
            .await
            .unwrap();

        assert!(result.is_spam);
        assert_eq!(result.spam_type, SpamType::MentionSpam);
    }

    #[tokio::test]
    async fn test_rate_limit_detection() {
        let service = service();
        for i in 0..5 {
            let result = service
                .check_message(123, 456, &format!("Message {}", i), 0)
                .await
                .unwrap();
            assert!(!result.is_spam, "Message {} should not be spam", i);
        }

        let result = service
            .check_message(123, 456, "One too many!", 0)
            .await
            .unwrap();
        assert_eq!(result.spam_type, SpamType::RateLimit);

        // Blocked afterwards.
        let result = service.check_message(123, 456, "hi", 0).await.unwrap();
        assert!(matches!(result.action, SpamAction::DeleteMessage { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_message_detection() {
        let service = service();
        let duplicate = "Buy my product now!";
        for _ in 0..3 {
            assert!(!service.check_message(123, 456, duplicate, 0).await.unwrap().is_spam);
        }

        let result = service.check_message(123, 456, duplicate, 0).await.unwrap();
        assert_eq!(result.spam_type, SpamType::DuplicateContent);
    }

    #[tokio::test]
    async fn test_warning_escalation() {
        let service = service();
        for _ in 0..2 {
            let result = service.check_message(123, 456, "Spam!", 11).await.unwrap();
            assert!(matches!(result.action, SpamAction::Warn { .. }));
        }

        let result = service.check_message(123, 456, "Spam!", 11).await.unwrap();
        assert!(matches!(result.action, SpamAction::Timeout { .. }));

        // Warnings start over after a timeout.
        let result = service.check_message(123, 456, "Spam!", 11).await.unwrap();
        assert!(matches!(
            result.action,
            SpamAction::Warn { warning_count: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_disabled_anti_spam() {
        let service = service();
        service.modify_config(456, |c| c.enabled = false).await.unwrap();

        let result = service.check_message(123, 456, "Spam!", 100).await.unwrap();
        assert!(!result.is_spam);
    }

    #[tokio::test]
    async fn invite_links_only_blocked_when_filter_on() {
        let service = service();
        let invite = "join us at https://discord.gg/abc123";

        assert!(!service.check_message(1, 456, invite, 0).await.unwrap().is_spam);

        service
            .modify_config(456, |c| c.block_invite_links = true)
            .await
            .unwrap();
        let result = service.check_message(2, 456, invite, 0).await.unwrap();
        assert_eq!(result.spam_type, SpamType::InviteLink);
    }

    #[tokio::test]
    async fn expired_block_is_forgotten_on_next_message() {
        let service = service();
        service
            .blocked_until
            .insert((123, 456), Utc::now() - chrono::Duration::seconds(1));

        let result = service.check_message(123, 456, "back again", 0).await.unwrap();

        assert!(!result.is_spam);
        assert!(service.blocked_until.is_empty());
    }

    #[test]
    fn idle_authors_are_pruned() {
        let service = service();
        let now = Utc::now();
        let stale = now - chrono::Duration::seconds(IDLE_RETENTION_SECS + 1);
        service.history.insert(
            (1, 456),
            vec![MessageRecord {
                content_hash: 1,
                timestamp: stale,
            }],
        );
        service.history.insert(
            (2, 456),
            vec![MessageRecord {
                content_hash: 2,
                timestamp: now,
            }],
        );
        service.history.insert((3, 456), Vec::new());
        service.blocked_until.insert((1, 456), stale);
        service
            .blocked_until
            .insert((2, 456), now + chrono::Duration::seconds(30));

        assert!(service.prune_idle(now));

        assert_eq!(service.history.len(), 1);
        assert!(service.history.contains_key(&(2, 456)));
        assert_eq!(service.blocked_until.len(), 1);
        assert!(service.blocked_until.contains_key(&(2, 456)));

        // Throttled until the retention period passes again.
        assert!(!service.prune_idle(now + chrono::Duration::seconds(1)));
        assert!(service.prune_idle(now + chrono::Duration::seconds(IDLE_RETENTION_SECS)));
    }

    fn sample(content: &str, mentions: u32, exempt: bool) -> MessageSample {
        MessageSample {
            guild_id: 456,
            channel_id: 10,
            message_id: 900,
            author_id: 123,
            content: content.into(),
            mention_count: mentions,
            exempt,
        }
    }

    #[tokio::test]
    async fn screen_deletes_and_warns() {
        let service = service();
        let platform = MockPlatform::new().with_channel(10);

        assert!(service.screen(&platform, &sample("@everyone", 20, false)).await.unwrap());

        let calls = platform.calls();
        assert_eq!(
            calls[0],
            PlatformCall::Delete {
                channel_id: 10,
                message_id: 900
            }
        );
        assert!(matches!(&calls[1], PlatformCall::Send { channel_id: 10, .. }));
    }

    #[tokio::test]
    async fn screen_times_out_on_escalation() {
        let service = service();
        let platform = MockPlatform::new().with_channel(10);

        for _ in 0..3 {
            service.screen(&platform, &sample("@everyone", 20, false)).await.unwrap();
        }

        assert!(platform.calls().contains(&PlatformCall::Timeout {
            guild_id: 456,
            user_id: 123
        }));
    }

    #[tokio::test]
    async fn moderators_are_exempt() {
        let service = service();
        let platform = MockPlatform::new().with_channel(10);

        assert!(!service.screen(&platform, &sample("@everyone", 50, true)).await.unwrap());
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn handler_toggles_settings() {
        let bed = TestBed::builder().build();
        let admin = actor(5, &[MANAGE_GUILD]);

        let (reply, _) = bed.invoke(&AntiSpamHandler, admin.clone(), tokens("off")).await;
        assert!(reply.unwrap().content().unwrap().contains("is off"));
        assert!(!bed.services.anti_spam.get_config(TestBed::GUILD_ID).await.unwrap().enabled);

        let (reply, _) = bed.invoke(&AntiSpamHandler, admin.clone(), tokens("links on")).await;
        assert!(reply.unwrap().content().unwrap().contains("blocked"));

        let (reply, _) = bed.invoke(&AntiSpamHandler, admin, tokens("links maybe")).await;
        assert_eq!(reply.unwrap_err().class(), crate::core::actions::ErrorClass::UserInput);
    }
}
