// Multi-step flows that outlive a single handler call.

pub mod follow_ups;
pub mod single_flight;

pub use follow_ups::{FollowUps, PromptOutcome};
pub use single_flight::{FlightGuard, SingleFlight};
