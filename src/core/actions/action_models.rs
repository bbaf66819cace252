// Action domain models - what an invocable action looks like once loaded.

use super::action_errors::ActionError;
use crate::core::dispatch::InvocationContext;
use crate::core::permissions::Capability;
use crate::core::platform::OutgoingMessage;
use crate::core::services::Services;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// What a context action is invoked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextTarget {
    User,
    Message,
}

/// Determines where an action's arguments come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Prefix message; arguments are whitespace-separated tokens.
    TextCommand,
    /// Slash command; arguments are typed options.
    StructuredCommand,
    /// Right-click menu entry on a user or message.
    ContextAction(ContextTarget),
}

impl ActionKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::TextCommand => "text",
            ActionKind::StructuredCommand => "slash",
            ActionKind::ContextAction(ContextTarget::User) => "user menu",
            ActionKind::ContextAction(ContextTarget::Message) => "message menu",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    String,
    Integer,
    Number,
    Boolean,
    User,
    Channel,
    Role,
}

/// Declared option of a structured command, used when publishing it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OptionSpec {
    pub name: String,
    pub description: String,
    pub kind: OptionKind,
    #[serde(default)]
    pub required: bool,
}

/// A typed option value, already validated by the platform.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    User(u64),
    Channel(u64),
    Role(u64),
}

/// Business logic bound to one descriptor.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(
        &self,
        ctx: &InvocationContext,
        services: &Services,
    ) -> Result<ActionReply, ActionError>;
}

/// What the handler wants shown once it is done.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionReply {
    /// Nothing further to say (the handler already posted what it needed).
    Silent,
    Message {
        payload: OutgoingMessage,
        ephemeral: bool,
    },
}

impl ActionReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Message {
            payload: OutgoingMessage::text(content),
            ephemeral: false,
        }
    }

    /// Only the actor sees it, where the platform supports that.
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self::Message {
            payload: OutgoingMessage::text(content),
            ephemeral: true,
        }
    }

    pub fn payload(payload: OutgoingMessage) -> Self {
        Self::Message {
            payload,
            ephemeral: false,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            ActionReply::Silent => None,
            ActionReply::Message { payload, .. } => payload.content.as_deref(),
        }
    }
}

/// The registered definition of one invocable action. Immutable once built.
pub struct ActionDescriptor {
    pub primary_name: String,
    pub aliases: Vec<String>,
    pub kind: ActionKind,
    pub required_capability: Option<Capability>,
    /// Deny without any visible response.
    pub silent_deny: bool,
    pub description: String,
    pub usage: Option<String>,
    pub options: Vec<OptionSpec>,
    pub handler: Arc<dyn ActionHandler>,
    /// Manifest the descriptor was loaded from, if any.
    pub source: Option<PathBuf>,
}

impl ActionDescriptor {
    pub fn new(
        primary_name: impl Into<String>,
        kind: ActionKind,
        handler: Arc<dyn ActionHandler>,
    ) -> Self {
        Self {
            primary_name: primary_name.into(),
            aliases: Vec::new(),
            kind,
            required_capability: None,
            silent_deny: false,
            description: String::new(),
            usage: None,
            options: Vec::new(),
            handler,
            source: None,
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn requiring(mut self, capability: impl Into<Capability>) -> Self {
        self.required_capability = Some(capability.into());
        self
    }

    pub fn silent(mut self) -> Self {
        self.silent_deny = true;
        self
    }

    /// Lookup keys: the primary name and every alias, lowercased, deduplicated.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::with_capacity(1 + self.aliases.len());
        for name in std::iter::once(&self.primary_name).chain(self.aliases.iter()) {
            let key = normalize_key(name);
            if !key.is_empty() && !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }
}

impl fmt::Debug for ActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("primary_name", &self.primary_name)
            .field("aliases", &self.aliases)
            .field("kind", &self.kind)
            .field("required_capability", &self.required_capability)
            .field("silent_deny", &self.silent_deny)
            .finish_non_exhaustive()
    }
}

pub fn normalize_key(name: &str) -> String {
    name.trim().to_lowercase()
}
