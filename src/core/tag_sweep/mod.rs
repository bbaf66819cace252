pub mod tag_sweep_service;

pub use tag_sweep_service::{SweepOutcome, SweepReport, TagSweepHandler, TagSweeper};
