// Action manifests - one JSON file per action under the action roots.
//
// A manifest declares the action's identity and contract; the handler key
// points into the compiled-in HandlerCatalog. Everything is validated here,
// at load, so a broken manifest never reaches dispatch.

use super::action_models::{
    ActionDescriptor, ActionKind, ContextTarget, OptionSpec,
};
use super::handler_catalog::HandlerCatalog;
use crate::core::permissions::Capability;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("unreadable: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a valid action manifest: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("action has no name")]
    MissingName,
    #[error("name or alias `{0}` may not contain whitespace")]
    InvalidName(String),
    #[error("handler `{0}` is not a known handler")]
    UnknownHandler(String),
    #[error("context actions must declare a `target` (user or message)")]
    MissingTarget,
    #[error("only structured commands may declare options")]
    UnexpectedOptions,
    #[error("only text commands can have aliases; other kinds are published under their name")]
    UnexpectedAliases,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestKind {
    Text,
    Structured,
    Context,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionManifest {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub kind: ManifestKind,
    #[serde(default)]
    pub target: Option<ContextTarget>,
    pub handler: String,
    #[serde(default)]
    pub requires: Option<String>,
    #[serde(default)]
    pub silent_deny: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub usage: Option<String>,
    #[serde(default)]
    pub options: Vec<OptionSpec>,
}

impl ActionManifest {
    pub fn read(path: &Path) -> Result<Self, ManifestError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Validate against the catalog and build the descriptor.
    pub fn into_descriptor(
        self,
        catalog: &HandlerCatalog,
        path: &Path,
    ) -> Result<ActionDescriptor, ManifestError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ManifestError::MissingName);
        }

        let kind = match (self.kind, self.target) {
            (ManifestKind::Text, _) => ActionKind::TextCommand,
            (ManifestKind::Structured, _) => ActionKind::StructuredCommand,
            (ManifestKind::Context, Some(target)) => ActionKind::ContextAction(target),
            (ManifestKind::Context, None) => return Err(ManifestError::MissingTarget),
        };

        if !self.aliases.is_empty() && kind != ActionKind::TextCommand {
            return Err(ManifestError::UnexpectedAliases);
        }

        // Context menu entries are display labels and may contain spaces;
        // everything else is typed by users and is split on whitespace.
        match kind {
            ActionKind::ContextAction(_) => {}
            _ => {
                for candidate in std::iter::once(&name).chain(self.aliases.iter()) {
                    if candidate.trim().is_empty()
                        || candidate.trim().chars().any(char::is_whitespace)
                    {
                        return Err(ManifestError::InvalidName(candidate.clone()));
                    }
                }
            }
        }

        if !self.options.is_empty() && kind != ActionKind::StructuredCommand {
            return Err(ManifestError::UnexpectedOptions);
        }

        let handler = catalog
            .instantiate(&self.handler)
            .ok_or_else(|| ManifestError::UnknownHandler(self.handler.clone()))?;

        Ok(ActionDescriptor {
            primary_name: name,
            aliases: self.aliases.iter().map(|a| a.trim().to_string()).collect(),
            kind,
            required_capability: self
                .requires
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(Capability::new),
            silent_deny: self.silent_deny,
            description: self.description,
            usage: self.usage,
            options: self.options,
            handler,
            source: Some(path.to_path_buf()),
        })
    }
}
