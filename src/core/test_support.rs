// In-memory collaborators and a wired-up Services for handler tests.

use crate::core::actions::{
    ActionDescriptor, ActionError, ActionHandler, ActionKind, ActionRegistry, ActionReply,
    HandlerCatalog, RegistryHandle,
};
use crate::core::dispatch::{
    Actor, Dispatcher, InboundEvent, InboundMessage, InvocationContext, RawArguments, Responder,
    SourceLocation,
};
use crate::core::media::{ImageError, ImageRenderer, OcrError, OcrService, ProfileCard};
use crate::core::permissions::CapabilitySet;
use crate::core::platform::{
    MemberSummary, OutgoingMessage, PlatformClient, PlatformError, PlatformMessage, RoleMutation,
    UserProfile,
};
use crate::core::services::Services;
use crate::core::settings::{BotSettings, TagSweepConfig};
use crate::infra::config::InMemoryConfigStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// PLATFORM
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    Send {
        channel_id: u64,
        payload: OutgoingMessage,
    },
    Edit {
        channel_id: u64,
        message_id: u64,
        payload: OutgoingMessage,
    },
    Delete {
        channel_id: u64,
        message_id: u64,
    },
    Role {
        guild_id: u64,
        user_id: u64,
        role_id: u64,
        mutation: RoleMutation,
    },
    Ban {
        guild_id: u64,
        user_id: u64,
        reason: String,
    },
    Kick {
        guild_id: u64,
        user_id: u64,
        reason: String,
    },
    Timeout {
        guild_id: u64,
        user_id: u64,
    },
    Sync {
        guild_id: Option<u64>,
        count: usize,
    },
}

/// Records every mutating call. Channels must be declared to be reachable.
pub struct MockPlatform {
    channels: HashSet<u64>,
    forbidden_roles: HashSet<u64>,
    messages: DashMap<(u64, u64), PlatformMessage>,
    users: DashMap<u64, UserProfile>,
    members: Mutex<Vec<MemberSummary>>,
    calls: Mutex<Vec<PlatformCall>>,
    next_id: AtomicU64,
    member_listings: AtomicUsize,
    hold_listing: Option<Arc<Notify>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            channels: HashSet::new(),
            forbidden_roles: HashSet::new(),
            messages: DashMap::new(),
            users: DashMap::new(),
            members: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1000),
            member_listings: AtomicUsize::new(0),
            hold_listing: None,
        }
    }

    pub fn with_channel(mut self, channel_id: u64) -> Self {
        self.channels.insert(channel_id);
        self
    }

    pub fn with_message(mut self, channel_id: u64, message_id: u64, author_id: u64, content: &str) -> Self {
        self.channels.insert(channel_id);
        self.messages.insert(
            (channel_id, message_id),
            PlatformMessage {
                id: message_id,
                channel_id,
                author_id,
                author_name: format!("user{author_id}"),
                content: content.to_string(),
            },
        );
        self
    }

    pub fn with_user(self, user_id: u64, name: &str) -> Self {
        self.users.insert(
            user_id,
            UserProfile {
                id: user_id,
                name: name.to_string(),
                display_name: name.to_string(),
                avatar_url: format!("https://cdn.example/avatars/{user_id}.png"),
                is_bot: false,
            },
        );
        self
    }

    pub fn with_members(self, members: Vec<MemberSummary>) -> Self {
        *self.members.lock().unwrap() = members;
        self
    }

    /// Role mutations for this role fail with `Forbidden`.
    pub fn forbid_role(mut self, role_id: u64) -> Self {
        self.forbidden_roles.insert(role_id);
        self
    }

    /// `list_members` waits on the returned notify before answering.
    pub fn hold_member_listing(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.hold_listing = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::Send { payload, .. } => payload.content,
                _ => None,
            })
            .collect()
    }

    pub fn member_listings(&self) -> usize {
        self.member_listings.load(Ordering::SeqCst)
    }

    fn record(&self, call: PlatformCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn channel(&self, channel_id: u64) -> Result<(), PlatformError> {
        if self.channels.contains(&channel_id) {
            Ok(())
        } else {
            Err(PlatformError::NotFound("channel".into()))
        }
    }
}

#[async_trait]
impl PlatformClient for MockPlatform {
    async fn fetch_message(
        &self,
        channel_id: u64,
        message_id: u64,
    ) -> Result<PlatformMessage, PlatformError> {
        self.channel(channel_id)?;
        self.messages
            .get(&(channel_id, message_id))
            .map(|m| m.clone())
            .ok_or_else(|| PlatformError::NotFound("message".into()))
    }

    async fn send_message(
        &self,
        channel_id: u64,
        payload: OutgoingMessage,
    ) -> Result<PlatformMessage, PlatformError> {
        self.channel(channel_id)?;
        let message = PlatformMessage {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            channel_id,
            author_id: 0,
            author_name: "guildkeeper".into(),
            content: payload.content.clone().unwrap_or_default(),
        };
        self.messages.insert((channel_id, message.id), message.clone());
        self.record(PlatformCall::Send {
            channel_id,
            payload,
        });
        Ok(message)
    }

    async fn edit_message(
        &self,
        channel_id: u64,
        message_id: u64,
        payload: OutgoingMessage,
    ) -> Result<PlatformMessage, PlatformError> {
        let mut message = self.fetch_message(channel_id, message_id).await?;
        message.content = payload.content.clone().unwrap_or_default();
        self.messages.insert((channel_id, message_id), message.clone());
        self.record(PlatformCall::Edit {
            channel_id,
            message_id,
            payload,
        });
        Ok(message)
    }

    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<(), PlatformError> {
        self.messages.remove(&(channel_id, message_id));
        self.record(PlatformCall::Delete {
            channel_id,
            message_id,
        });
        Ok(())
    }

    async fn mutate_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
        mutation: RoleMutation,
    ) -> Result<(), PlatformError> {
        if self.forbidden_roles.contains(&role_id) {
            return Err(PlatformError::Forbidden("role".into()));
        }
        self.record(PlatformCall::Role {
            guild_id,
            user_id,
            role_id,
            mutation,
        });
        Ok(())
    }

    async fn ban_member(&self, guild_id: u64, user_id: u64, reason: &str) -> Result<(), PlatformError> {
        self.record(PlatformCall::Ban {
            guild_id,
            user_id,
            reason: reason.to_string(),
        });
        Ok(())
    }

    async fn kick_member(&self, guild_id: u64, user_id: u64, reason: &str) -> Result<(), PlatformError> {
        self.record(PlatformCall::Kick {
            guild_id,
            user_id,
            reason: reason.to_string(),
        });
        Ok(())
    }

    async fn timeout_member(
        &self,
        guild_id: u64,
        user_id: u64,
        _until: DateTime<Utc>,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::Timeout { guild_id, user_id });
        Ok(())
    }

    async fn fetch_user(&self, user_id: u64) -> Result<UserProfile, PlatformError> {
        self.users
            .get(&user_id)
            .map(|u| u.clone())
            .ok_or_else(|| PlatformError::NotFound("user".into()))
    }

    async fn list_members(&self, _guild_id: u64) -> Result<Vec<MemberSummary>, PlatformError> {
        self.member_listings.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.hold_listing {
            gate.notified().await;
        }
        Ok(self.members.lock().unwrap().clone())
    }

    async fn sync_commands(
        &self,
        guild_id: Option<u64>,
        actions: &[Arc<ActionDescriptor>],
    ) -> Result<usize, PlatformError> {
        let count = actions
            .iter()
            .filter(|a| a.kind != ActionKind::TextCommand)
            .count();
        self.record(PlatformCall::Sync { guild_id, count });
        Ok(count)
    }
}

// ============================================================================
// MEDIA
// ============================================================================

#[derive(Default)]
pub struct MockRenderer {
    pub fail: bool,
    pub rendered: Mutex<Vec<ProfileCard>>,
}

#[async_trait]
impl ImageRenderer for MockRenderer {
    async fn render_card(&self, card: &ProfileCard) -> Result<Vec<u8>, ImageError> {
        if self.fail {
            return Err(ImageError::Service("renderer down".into()));
        }
        self.rendered.lock().unwrap().push(card.clone());
        Ok(b"\x89PNG".to_vec())
    }
}

/// Returns the configured text, or fails when there is none. A hanging
/// service never answers.
#[derive(Default)]
pub struct MockOcr {
    pub text: Option<String>,
    pub hang: bool,
}

#[async_trait]
impl OcrService for MockOcr {
    async fn recognize_text(&self, _image_url: &str, _language: &str) -> Result<String, OcrError> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.text
            .clone()
            .ok_or_else(|| OcrError::Service("ocr down".into()))
    }
}

// ============================================================================
// RESPONDER
// ============================================================================

#[derive(Default)]
pub struct RecordingResponder {
    provisional: Mutex<Vec<String>>,
    replies: Mutex<Vec<ActionReply>>,
}

impl RecordingResponder {
    pub fn replies(&self) -> Vec<ActionReply> {
        self.replies.lock().unwrap().clone()
    }

    /// Text of every non-silent reply.
    pub fn texts(&self) -> Vec<String> {
        self.replies()
            .iter()
            .filter(|r| !matches!(r, ActionReply::Silent))
            .map(|r| r.content().unwrap_or_default().to_string())
            .collect()
    }

    pub fn provisional(&self) -> Vec<String> {
        self.provisional.lock().unwrap().clone()
    }
}

#[async_trait]
impl Responder for RecordingResponder {
    async fn provisional(&self, text: &str) -> Result<(), PlatformError> {
        self.provisional.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn respond(&self, reply: ActionReply) -> Result<(), PlatformError> {
        self.replies.lock().unwrap().push(reply);
        Ok(())
    }
}

// ============================================================================
// TEST BED
// ============================================================================

pub fn actor(id: u64, capabilities: &[&str]) -> Actor {
    Actor {
        id,
        name: format!("user{id}"),
        is_bot: false,
        capabilities: capabilities.iter().copied().collect::<CapabilitySet>(),
    }
}

pub fn tokens(text: &str) -> RawArguments {
    RawArguments::Tokens(text.split_whitespace().map(str::to_string).collect())
}

/// A prefix message in the test guild's channel 10.
pub fn message_event(actor: Actor, content: &str) -> InboundEvent {
    InboundEvent::Message(InboundMessage {
        actor,
        source: SourceLocation {
            guild_id: Some(TestBed::GUILD_ID),
            channel_id: TestBed::CHANNEL_ID,
        },
        message_id: 555,
        content: content.to_string(),
        attachment_urls: Vec::new(),
    })
}

pub struct TestBed {
    pub dispatcher: Dispatcher,
    pub services: Arc<Services>,
    pub platform: Arc<MockPlatform>,
    pub renderer: Arc<MockRenderer>,
}

pub struct TestBedBuilder {
    settings: BotSettings,
    registry: ActionRegistry,
    platform: MockPlatform,
    renderer: MockRenderer,
    ocr: MockOcr,
}

impl TestBed {
    pub const GUILD_ID: u64 = 100;
    pub const CHANNEL_ID: u64 = 10;

    pub fn builder() -> TestBedBuilder {
        TestBedBuilder {
            settings: BotSettings {
                token: "test".into(),
                ..Default::default()
            },
            registry: ActionRegistry::new(),
            platform: MockPlatform::new().with_channel(Self::CHANNEL_ID),
            renderer: MockRenderer::default(),
            ocr: MockOcr::default(),
        }
    }

    pub fn context(&self, actor: Actor, arguments: RawArguments) -> (InvocationContext, Arc<RecordingResponder>) {
        let responder = Arc::new(RecordingResponder::default());
        let ctx = InvocationContext {
            is_owner: self.services.settings.owner_id == Some(actor.id),
            actor,
            action: "test".into(),
            arguments,
            source: SourceLocation {
                guild_id: Some(Self::GUILD_ID),
                channel_id: Self::CHANNEL_ID,
            },
            message_id: Some(555),
            attachment_urls: Vec::new(),
            responder: responder.clone(),
        };
        (ctx, responder)
    }

    /// Run a handler directly, bypassing dispatch.
    pub async fn invoke<H: ActionHandler>(
        &self,
        handler: &H,
        actor: Actor,
        arguments: RawArguments,
    ) -> (Result<ActionReply, ActionError>, Arc<RecordingResponder>) {
        let (ctx, responder) = self.context(actor, arguments);
        (handler.handle(&ctx, &self.services).await, responder)
    }
}

impl TestBedBuilder {
    pub fn owner(mut self, owner_id: u64) -> Self {
        self.settings.owner_id = Some(owner_id);
        self
    }

    pub fn settings(mut self, apply: impl FnOnce(&mut BotSettings)) -> Self {
        apply(&mut self.settings);
        self
    }

    pub fn tag_sweep(mut self, tag: &str, role_id: u64) -> Self {
        self.settings.tag_sweep = Some(TagSweepConfig {
            guild_id: TestBed::GUILD_ID,
            tag: tag.to_string(),
            role_id,
        });
        self
    }

    pub fn registry(mut self, registry: ActionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn platform(mut self, platform: MockPlatform) -> Self {
        self.platform = platform;
        self
    }

    pub fn ocr_text(mut self, text: &str) -> Self {
        self.ocr.text = Some(text.to_string());
        self
    }

    /// OCR never answers; the scan gives up after `timeout`.
    pub fn hanging_ocr(mut self, timeout: Duration) -> Self {
        self.ocr.hang = true;
        self.settings.ocr_timeout = timeout;
        self
    }

    pub fn failing_renderer(mut self) -> Self {
        self.renderer.fail = true;
        self
    }

    pub fn build(self) -> TestBed {
        let platform = Arc::new(self.platform);
        let renderer = Arc::new(self.renderer);
        let registry = Arc::new(RegistryHandle::from_registry(
            self.registry,
            self.settings.action_roots.clone(),
            HandlerCatalog::builtin(),
        ));
        let services = Arc::new(Services::new(
            self.settings,
            platform.clone(),
            Arc::new(InMemoryConfigStore::new()),
            renderer.clone(),
            Arc::new(self.ocr),
            registry,
        ));

        TestBed {
            dispatcher: Dispatcher::new(Arc::clone(&services)),
            services,
            platform,
            renderer,
        }
    }
}

pub fn short_prompts(settings: &mut BotSettings) {
    settings.prompt_timeout = Duration::from_millis(50);
}
