use crate::core::config_store::StoreError;
use crate::core::media::{ImageError, OcrError};
use crate::core::platform::PlatformError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// HANDLER ERRORS
// ============================================================================

/// Everything a handler can fail with. The dispatcher classifies these and
/// decides what the actor sees and what operators get in the logs.
#[derive(Debug, Error)]
pub enum ActionError {
    /// Malformed arguments. The message is shown to the actor as-is.
    #[error("{0}")]
    UserInput(String),

    #[error("{0}")]
    PermissionDenied(String),

    /// A referenced message, channel, user or role is missing or inaccessible.
    #[error("{0}")]
    NotFound(String),

    /// A collaborator failed or timed out. Shown to the actor generically.
    #[error("{0}")]
    Collaborator(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    UserInput,
    PermissionDenied,
    NotFound,
    Collaborator,
    /// The handler panicked.
    Internal,
}

impl ActionError {
    pub fn input(message: impl Into<String>) -> Self {
        Self::UserInput(message.into())
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::UserInput(_) => ErrorClass::UserInput,
            Self::PermissionDenied(_) => ErrorClass::PermissionDenied,
            Self::NotFound(_) => ErrorClass::NotFound,
            Self::Collaborator(_) => ErrorClass::Collaborator,
        }
    }

    /// Text for the actor.
    pub fn user_message(&self) -> String {
        match self {
            Self::UserInput(msg) => format!("⚠️ {msg}"),
            Self::PermissionDenied(msg) => format!("⛔ {msg}"),
            Self::NotFound(msg) => format!("🔎 {msg}"),
            Self::Collaborator(_) => ErrorClass::Collaborator.generic_message().to_string(),
        }
    }
}

impl ErrorClass {
    pub fn generic_message(self) -> &'static str {
        match self {
            ErrorClass::Internal => "💥 Something went wrong while running that action.",
            _ => "❌ Something went wrong talking to Discord or a backing service. Please try again later.",
        }
    }
}

impl From<PlatformError> for ActionError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::NotFound(what) => {
                Self::NotFound(format!("I couldn't find that {what}."))
            }
            PlatformError::Forbidden(what) => Self::PermissionDenied(format!(
                "I don't have permission to do that ({what}). Check my role position and permissions."
            )),
            PlatformError::Unavailable(detail) => Self::Collaborator(detail),
        }
    }
}

impl From<StoreError> for ActionError {
    fn from(err: StoreError) -> Self {
        Self::Collaborator(err.to_string())
    }
}

impl From<ImageError> for ActionError {
    fn from(err: ImageError) -> Self {
        Self::Collaborator(err.to_string())
    }
}

impl From<OcrError> for ActionError {
    fn from(err: OcrError) -> Self {
        Self::Collaborator(err.to_string())
    }
}

// ============================================================================
// LOAD-TIME ERRORS
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("`{name}` is already registered by action `{existing}`")]
    DuplicateName { name: String, existing: String },
}

/// A malformed manifest that was skipped during load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    pub path: PathBuf,
    pub reason: String,
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}
