pub mod messaging_handlers;

pub use messaging_handlers::{
    AnnounceHandler, EditMessageHandler, EmbedHandler, QuoteHandler, SayHandler,
};
