//! Matching run orchestration on top of a [`crate::persistence::MatchStore`].

pub mod manager;

pub use manager::{MatchRunManager, RankedCandidate, RunError};
