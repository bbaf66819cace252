// Anti-spam: detection, escalation and the settings action.

pub mod spam_models;
pub mod spam_service;

pub use spam_models::*;
pub use spam_service::{AntiSpamHandler, AntiSpamService};
