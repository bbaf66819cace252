// Action registry and the contract every action plugs into.

pub mod action_errors;
pub mod action_models;
pub mod action_registry;
pub mod arguments;
pub mod handler_catalog;
pub mod manifest;

pub use action_errors::{ActionError, ErrorClass, LoadWarning, RegistryError};
pub use action_models::{
    ActionDescriptor, ActionHandler, ActionKind, ActionReply, ContextTarget, OptionKind,
    OptionSpec, OptionValue,
};
pub use action_registry::{ActionRegistry, RegistryHandle};
pub use handler_catalog::HandlerCatalog;
