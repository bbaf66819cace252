pub mod sticky_service;

pub use sticky_service::{repost, StickyHandler, StickyRecord};
