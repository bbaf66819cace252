// Platform port - everything handlers need from the chat platform.
//
// The core only sees plain ids and these small models. The serenity-backed
// implementation lives in the Discord layer; tests use an in-memory mock.

use crate::core::actions::ActionDescriptor;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Missing permission for {0}")]
    Forbidden(String),

    #[error("Platform request failed: {0}")]
    Unavailable(String),
}

// ============================================================================
// MODELS
// ============================================================================

/// A message as seen by the core.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformMessage {
    pub id: u64,
    pub channel_id: u64,
    pub author_id: u64,
    pub author_name: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub id: u64,
    pub name: String,
    pub display_name: String,
    pub avatar_url: String,
    pub is_bot: bool,
}

/// One guild member, as listed by a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberSummary {
    pub user_id: u64,
    pub display_name: String,
    pub role_ids: Vec<u64>,
    pub is_bot: bool,
}

impl MemberSummary {
    pub fn has_role(&self, role_id: u64) -> bool {
        self.role_ids.contains(&role_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleMutation {
    Add,
    Remove,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbedSpec {
    pub title: Option<String>,
    pub description: Option<String>,
    pub color: Option<u32>,
    pub image_url: Option<String>,
    pub footer: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileAttachment {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Minimal outgoing payload. Rendering is up to the platform implementation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutgoingMessage {
    pub content: Option<String>,
    pub embed: Option<EmbedSpec>,
    pub attachment: Option<FileAttachment>,
}

impl OutgoingMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn embed(embed: EmbedSpec) -> Self {
        Self {
            embed: Some(embed),
            ..Default::default()
        }
    }

    pub fn with_attachment(mut self, attachment: FileAttachment) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

// ============================================================================
// PORT
// ============================================================================

/// Chat platform operations. Every call is a suspension point and may fail
/// or time out; callers map failures through `ActionError`.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn fetch_message(
        &self,
        channel_id: u64,
        message_id: u64,
    ) -> Result<PlatformMessage, PlatformError>;

    async fn send_message(
        &self,
        channel_id: u64,
        payload: OutgoingMessage,
    ) -> Result<PlatformMessage, PlatformError>;

    async fn edit_message(
        &self,
        channel_id: u64,
        message_id: u64,
        payload: OutgoingMessage,
    ) -> Result<PlatformMessage, PlatformError>;

    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<(), PlatformError>;

    async fn mutate_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
        mutation: RoleMutation,
    ) -> Result<(), PlatformError>;

    async fn ban_member(&self, guild_id: u64, user_id: u64, reason: &str)
        -> Result<(), PlatformError>;

    async fn kick_member(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
    ) -> Result<(), PlatformError>;

    /// Mute a member until the given time.
    async fn timeout_member(
        &self,
        guild_id: u64,
        user_id: u64,
        until: DateTime<Utc>,
    ) -> Result<(), PlatformError>;

    async fn fetch_user(&self, user_id: u64) -> Result<UserProfile, PlatformError>;

    async fn list_members(&self, guild_id: u64) -> Result<Vec<MemberSummary>, PlatformError>;

    /// Publish structured commands and context actions. `None` means global.
    async fn sync_commands(
        &self,
        guild_id: Option<u64>,
        actions: &[Arc<ActionDescriptor>],
    ) -> Result<usize, PlatformError>;
}
