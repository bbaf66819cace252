// Permission gate - decides whether an actor may run an action.
//
// Capabilities are plain lowercase tags ("administrator", "ban-members", ...).
// The Discord layer turns permission bits into a CapabilitySet; the gate
// itself never looks at Discord types.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

pub const ADMINISTRATOR: &str = "administrator";
pub const MANAGE_MESSAGES: &str = "manage-messages";
pub const MANAGE_ROLES: &str = "manage-roles";
pub const MANAGE_GUILD: &str = "manage-guild";
pub const BAN_MEMBERS: &str = "ban-members";
pub const KICK_MEMBERS: &str = "kick-members";
pub const MODERATE_MEMBERS: &str = "moderate-members";
/// Only satisfiable through the owner bypass.
pub const OWNER: &str = "owner";

/// A named permission an actor may hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Capability(String);

impl Capability {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Capability {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Capability {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<Capability> for String {
    fn from(value: Capability) -> Self {
        value.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The capabilities an actor holds for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    inner: HashSet<Capability>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, capability: impl Into<Capability>) {
        self.inner.insert(capability.into());
    }

    pub fn contains(&self, capability: &Capability) -> bool {
        self.inner.contains(capability)
    }
}

impl<C: Into<Capability>> FromIterator<C> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Deny,
}

/// Pure permission predicate.
///
/// No requirement always allows. Otherwise the actor needs the literal
/// capability, or must be the process owner. The owner bypass is absolute.
pub fn check(
    required: Option<&Capability>,
    capabilities: &CapabilitySet,
    is_owner: bool,
) -> GateDecision {
    match required {
        None => GateDecision::Allow,
        Some(_) if is_owner => GateDecision::Allow,
        Some(capability) if capabilities.contains(capability) => GateDecision::Allow,
        Some(_) => GateDecision::Deny,
    }
}

/// Gate bound to the configured owner identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionGate {
    owner_id: Option<u64>,
}

impl PermissionGate {
    pub fn new(owner_id: Option<u64>) -> Self {
        Self { owner_id }
    }

    pub fn is_owner(&self, actor_id: u64) -> bool {
        self.owner_id == Some(actor_id)
    }

    pub fn authorize(
        &self,
        required: Option<&Capability>,
        actor_id: u64,
        capabilities: &CapabilitySet,
    ) -> GateDecision {
        check(required, capabilities, self.is_owner(actor_id))
    }
}
