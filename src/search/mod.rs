//! Simulated-annealing-style topology search.
//!
//! Each iteration draws a move operator by weight, proposes and applies a
//! move, re-optimizes branch lengths and γ, scores the candidate and then
//! commits it (improvement, or a successful roll of the
//! [AcceptanceSchedule]) or rolls it back through the undo journal. The best
//! network seen is kept as a separate copy, so rejected candidates never
//! affect it.
//!
//! The search ends after `max_iterations` proposals, after
//! `stall_iterations` iterations without improving the best score, or when
//! the cancellation flag is raised (checked once per iteration).

/// Search configuration
pub mod config;
/// The search loop and its outcome types
pub mod driver;
/// Acceptance schedules
pub mod schedule;

pub use config::SearchConfig;
pub use driver::{
    QualityFlag, SearchDriver, SearchOutcome, SearchState, SearchStats, StepOutcome,
    TerminationReason,
};
pub use schedule::AcceptanceSchedule;
