//! Quizlive core — domain types and rules for live quiz play.
//!
//! Pure building blocks shared by the store, event, and engine crates:
//! aggregates, status state machines, scoring, bracket pairing, and the
//! fixed protocol constants. No I/O and no async — everything here is
//! directly unit-testable.

pub mod battle;
pub mod error;
pub mod quiz;
pub mod scoring;
pub mod session;
pub mod tournament;
pub mod types;
