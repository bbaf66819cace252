pub mod welcome_service;

pub use welcome_service::{greet_member, CardHandler, SetWelcomeHandler, WelcomeRecord};
