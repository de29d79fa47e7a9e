//! # hone-tuner
//!
//! Warm-started coordinate-bisection parameter search for hone.
//!
//! Provides the objective adapter, the reminder store (file-backed and
//! in-memory backends), and the search engine driving the warm-start /
//! sensitivity / bisection loop.

mod engine;
mod objective;
mod reminder;

pub use engine::{
    AbortReason, SearchConfig, SearchEngine, SearchOutcome, SearchReport, SearchState,
    StopCondition,
};
pub use objective::ObjectiveAdapter;
pub use reminder::{
    find_match, FileReminderStore, MemoryReminderStore, Reminder, ReminderStore, MATCH_TOLERANCE,
};
