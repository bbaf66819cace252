// Discord layer - serenity adapters for the core ports plus event routing.

#[path = "capabilities.rs"]
pub mod capabilities;

#[path = "events.rs"]
pub mod events;

#[path = "platform.rs"]
pub mod platform;

#[path = "presence.rs"]
pub mod presence;

#[path = "render.rs"]
pub mod render;

#[path = "responders.rs"]
pub mod responders;

use crate::core::dispatch::Dispatcher;
use std::sync::Arc;

/// Shared with every poise callback.
pub struct Data {
    pub dispatcher: Arc<Dispatcher>,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
