//! Daily compatibility matching.
//!
//! The matcher is a pure function of the active roster and the set of pairs
//! that have ever been matched. It performs no I/O; loading its inputs and
//! persisting its results is the job of [`crate::runtime`].
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashSet;
//! use agent_matchmaker::domain::AgentProfile;
//! use agent_matchmaker::matching::match_agents;
//!
//! let agents = vec![
//!     AgentProfile::new("a", "Ada").with_interests(["AI", "Web3"]),
//!     AgentProfile::new("b", "Bo").with_interests(["ai", "music"]),
//! ];
//! let results = match_agents(&agents, &HashSet::new());
//! assert_eq!(results[0].topic, "Shared interest: AI");
//! ```

pub mod matcher;
pub mod pair;
pub mod scoring;

pub use matcher::{MatchError, MatchResult, Matcher, ScoredPair, derive_topic, match_agents, select};
pub use pair::PairKey;
pub use scoring::{
    CompatibilityScorer, DEFAULT_MIN_DIRECTIVE_TOKEN_LEN, ScoreBreakdown, ScoringWeights,
    SubstringMatcher, TermMatcher, TermMatcherKind, TokenSetMatcher,
};
