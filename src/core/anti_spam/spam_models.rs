// Anti-spam domain models.
//
// Pure domain types; the service turns a verdict into platform calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What should happen to a message (and its author).
#[derive(Debug, Clone, PartialEq)]
pub enum SpamAction {
    /// Not spam.
    None,
    /// Delete the message and warn the author.
    Warn {
        reason: String,
        warning_count: u32,
        warnings_before_timeout: u32,
    },
    /// Delete the message without further action.
    DeleteMessage { reason: String },
    /// Delete the message and time the author out.
    Timeout { duration: Duration, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpamType {
    /// Too many messages too quickly.
    RateLimit,
    /// The same message several times.
    DuplicateContent,
    /// Too many user/role mentions in one message.
    MentionSpam,
    /// A server invite while the link filter is on.
    InviteLink,
    None,
}

impl SpamType {
    fn reason(self) -> &'static str {
        match self {
            SpamType::RateLimit => "Sending messages too quickly",
            SpamType::DuplicateContent => "Sending duplicate messages",
            SpamType::MentionSpam => "Too many mentions in message",
            SpamType::InviteLink => "Posting server invites",
            SpamType::None => "Unknown",
        }
    }
}

impl std::fmt::Display for SpamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpamType::RateLimit => write!(f, "Rate Limit"),
            SpamType::DuplicateContent => write!(f, "Duplicate Content"),
            SpamType::MentionSpam => write!(f, "Mention Spam"),
            SpamType::InviteLink => write!(f, "Invite Link"),
            SpamType::None => write!(f, "None"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpamCheckResult {
    pub is_spam: bool,
    pub action: SpamAction,
    pub spam_type: SpamType,
}

impl SpamCheckResult {
    pub fn ok() -> Self {
        Self {
            is_spam: false,
            action: SpamAction::None,
            spam_type: SpamType::None,
        }
    }

    pub fn spam(spam_type: SpamType, action: SpamAction) -> Self {
        Self {
            is_spam: true,
            action,
            spam_type,
        }
    }

    pub(crate) fn escalate(spam_type: SpamType, warning_count: u32, config: &SpamConfig) -> Self {
        let reason = spam_type.reason();
        if warning_count >= config.warnings_before_timeout {
            Self::spam(
                spam_type,
                SpamAction::Timeout {
                    duration: Duration::from_secs(config.timeout_duration_secs),
                    reason: format!(
                        "{}. Received {} warnings.",
                        reason, config.warnings_before_timeout
                    ),
                },
            )
        } else {
            Self::spam(
                spam_type,
                SpamAction::Warn {
                    reason: reason.to_string(),
                    warning_count,
                    warnings_before_timeout: config.warnings_before_timeout,
                },
            )
        }
    }
}

/// A recent message, kept for rate limiting and duplicate detection.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub content_hash: u64,
    pub timestamp: DateTime<Utc>,
}

/// Per-guild anti-spam settings, stored under the `antispam` config key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpamConfig {
    pub enabled: bool,
    /// Maximum messages allowed in the rate limit window.
    pub max_messages_per_window: u32,
    pub rate_limit_window_secs: u64,
    /// How long further messages are deleted after hitting the rate limit.
    pub rate_limit_block_secs: u64,
    pub max_duplicate_messages: u32,
    pub max_mentions_per_message: u32,
    /// Delete messages carrying server invites.
    pub block_invite_links: bool,
    pub warnings_before_timeout: u32,
    pub timeout_duration_secs: u64,
}

impl Default for SpamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_messages_per_window: 5,
            rate_limit_window_secs: 5,
            rate_limit_block_secs: 30,
            max_duplicate_messages: 3,
            max_mentions_per_message: 10,
            block_invite_links: false,
            warnings_before_timeout: 3,
            timeout_duration_secs: 300,
        }
    }
}

/// One guild message, as the anti-spam screen sees it.
#[derive(Debug, Clone)]
pub struct MessageSample {
    pub guild_id: u64,
    pub channel_id: u64,
    pub message_id: u64,
    pub author_id: u64,
    pub content: String,
    /// Users plus roles mentioned.
    pub mention_count: u32,
    /// Moderators are never screened.
    pub exempt: bool,
}
