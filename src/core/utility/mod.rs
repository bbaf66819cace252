pub mod utility_handlers;

pub use utility_handlers::{AvatarHandler, HelpHandler, PingHandler, ReloadHandler};
