// Inbound events, invocation context and dispatch results.
//
// These are platform-agnostic: the Discord layer converts gateway events
// into `InboundEvent`s and supplies a `Responder` that knows how to answer.

use crate::core::actions::{ActionKind, ActionReply, ContextTarget, ErrorClass, OptionValue};
use crate::core::permissions::CapabilitySet;
use crate::core::platform::PlatformError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The identity invoking an action, as reported with the event.
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub id: u64,
    pub name: String,
    pub is_bot: bool,
    /// Resolved at event receipt; never cached past the invocation.
    pub capabilities: CapabilitySet,
}

/// Where the event happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub guild_id: Option<u64>,
    pub channel_id: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub actor: Actor,
    pub source: SourceLocation,
    pub message_id: u64,
    pub content: String,
    pub attachment_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InteractionData {
    Command {
        options: BTreeMap<String, OptionValue>,
    },
    UserTarget {
        user_id: u64,
    },
    MessageTarget {
        message_id: u64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct InboundInteraction {
    pub actor: Actor,
    pub source: SourceLocation,
    pub name: String,
    pub data: InteractionData,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Message(InboundMessage),
    Interaction(InboundInteraction),
}

/// Target of a context action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRef {
    User(u64),
    Message(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawArguments {
    Tokens(Vec<String>),
    Options(BTreeMap<String, OptionValue>),
    Target(TargetRef),
}

impl RawArguments {
    /// Text tokens; empty for any other argument shape.
    pub fn tokens(&self) -> &[String] {
        match self {
            RawArguments::Tokens(tokens) => tokens,
            _ => &[],
        }
    }

    pub fn option(&self, name: &str) -> Option<&OptionValue> {
        match self {
            RawArguments::Options(options) => options.get(name),
            _ => None,
        }
    }

    pub fn option_str(&self, name: &str) -> Option<&str> {
        match self.option(name) {
            Some(OptionValue::String(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn option_channel(&self, name: &str) -> Option<u64> {
        match self.option(name) {
            Some(OptionValue::Channel(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn option_user(&self, name: &str) -> Option<u64> {
        match self.option(name) {
            Some(OptionValue::User(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn target(&self) -> Option<TargetRef> {
        match self {
            RawArguments::Target(target) => Some(*target),
            _ => None,
        }
    }

    /// Whether this argument shape can feed an action of `kind`.
    pub fn fits(&self, kind: ActionKind) -> bool {
        matches!(
            (self, kind),
            (RawArguments::Tokens(_), ActionKind::TextCommand)
                | (RawArguments::Options(_), ActionKind::StructuredCommand)
                | (
                    RawArguments::Target(TargetRef::User(_)),
                    ActionKind::ContextAction(ContextTarget::User)
                )
                | (
                    RawArguments::Target(TargetRef::Message(_)),
                    ActionKind::ContextAction(ContextTarget::Message)
                )
        )
    }
}

/// Answers the actor. Implemented per event type by the platform layer.
#[async_trait]
pub trait Responder: Send + Sync {
    /// A "working on it" response for slow handlers. Later responses replace it.
    async fn provisional(&self, text: &str) -> Result<(), PlatformError>;

    async fn respond(&self, reply: ActionReply) -> Result<(), PlatformError>;
}

/// Everything a handler knows about one invocation.
pub struct InvocationContext {
    pub actor: Actor,
    pub is_owner: bool,
    /// Primary name of the resolved action.
    pub action: String,
    pub arguments: RawArguments,
    pub source: SourceLocation,
    /// Message that carried a text command.
    pub message_id: Option<u64>,
    pub attachment_urls: Vec<String>,
    pub responder: Arc<dyn Responder>,
}

impl InvocationContext {
    pub fn guild_id(&self) -> Result<u64, crate::core::actions::ActionError> {
        self.source
            .guild_id
            .ok_or_else(|| crate::core::actions::ActionError::input("This only works inside a server."))
    }
}

// ============================================================================
// DISPATCH RESULT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Received,
    Parsed,
    Resolved,
    Authorized,
    Executing,
    Completed,
    Rejected,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Prefix with nothing after it.
    NoCommand,
    UnknownAction(String),
    PermissionDenied { action: String, silent: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Not a command at all (plain chat, bot author).
    Ignored,
    Rejected(RejectReason),
    Completed { action: String },
    Failed { action: String, class: ErrorClass },
}

/// The path one event took through the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub trace: Vec<DispatchState>,
    pub outcome: DispatchOutcome,
}

impl DispatchReport {
    pub fn final_state(&self) -> DispatchState {
        *self.trace.last().unwrap_or(&DispatchState::Received)
    }

    pub fn visited(&self, state: DispatchState) -> bool {
        self.trace.contains(&state)
    }
}
