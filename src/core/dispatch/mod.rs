pub mod dispatch_models;
pub mod dispatcher;

pub use dispatch_models::*;
pub use dispatcher::Dispatcher;
