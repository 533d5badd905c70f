//! Daily pairing: score every candidate pair, rank, then greedily commit.
//!
//! Greedy selection yields a maximal matching, not a maximum-weight one.
//! Scoring is `O(n²)` in the roster size, which is fine for the tens to low
//! hundreds of agents a daily run sees; larger rosters should set a deadline.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::pair::PairKey;
use super::scoring::{CompatibilityScorer, ScoreBreakdown};
use crate::domain::AgentProfile;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchError {
    #[error("matching deadline of {deadline:?} exceeded after scoring {scored} pairs")]
    DeadlineExceeded { deadline: Duration, scored: usize },
}

/// A candidate pair with its score. Lives for one run only.
#[derive(Debug, Clone, Copy)]
pub struct ScoredPair<'a> {
    pub a: &'a AgentProfile,
    pub b: &'a AgentProfile,
    pub score: i64,
    pub breakdown: ScoreBreakdown,
}

/// A committed pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub pair_a: String,
    pub pair_b: String,
    pub score: i64,
    pub topic: String,
}

#[derive(Debug, Clone, Default)]
pub struct Matcher {
    scorer: CompatibilityScorer,
    deadline: Option<Duration>,
}

impl Matcher {
    pub fn new(scorer: CompatibilityScorer) -> Self {
        Self {
            scorer,
            deadline: None,
        }
    }

    /// Abort scoring once a run has taken longer than `deadline`.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Score every unordered pair and sort by score, highest first.
    ///
    /// Pairs are enumerated `(agents[i], agents[j])` with `i < j`; ties keep
    /// that enumeration order.
    pub fn rank<'a>(
        &self,
        agents: &'a [AgentProfile],
        history: &HashSet<PairKey>,
    ) -> Result<Vec<ScoredPair<'a>>, MatchError> {
        let started = Instant::now();
        let prepared: Vec<_> = agents.iter().map(|a| self.scorer.prepare(a)).collect();

        let mut ranked = Vec::with_capacity(agents.len() * agents.len().saturating_sub(1) / 2);
        for (i, a) in prepared.iter().enumerate() {
            if let Some(deadline) = self.deadline {
                if started.elapsed() >= deadline {
                    return Err(MatchError::DeadlineExceeded {
                        deadline,
                        scored: ranked.len(),
                    });
                }
            }

            for b in &prepared[i + 1..] {
                if a.profile.id == b.profile.id {
                    continue;
                }
                let novel = !history.contains(&PairKey::new(&a.profile.id, &b.profile.id));
                let breakdown = self.scorer.breakdown(a, b, novel);
                ranked.push(ScoredPair {
                    a: a.profile,
                    b: b.profile,
                    score: breakdown.total(),
                    breakdown,
                });
            }
        }

        ranked.sort_by_key(|pair| Reverse(pair.score));
        Ok(ranked)
    }

    /// Pair the roster for one run.
    pub fn run(
        &self,
        agents: &[AgentProfile],
        history: &HashSet<PairKey>,
    ) -> Result<Vec<MatchResult>, MatchError> {
        if agents.len() < 2 {
            return Ok(Vec::new());
        }
        let ranked = self.rank(agents, history)?;
        let results = select(&ranked);
        tracing::debug!(
            name: "matching.matcher.selected",
            candidates = ranked.len(),
            committed = results.len(),
            "Greedy selection finished"
        );
        Ok(results)
    }
}

/// Pair `agents` with the default weights and no deadline.
pub fn match_agents(agents: &[AgentProfile], history: &HashSet<PairKey>) -> Vec<MatchResult> {
    // Without a deadline ranking cannot fail.
    Matcher::default().run(agents, history).unwrap_or_default()
}

/// Walk ranked pairs and commit each one whose agents are both still free.
pub fn select(ranked: &[ScoredPair<'_>]) -> Vec<MatchResult> {
    let mut committed: HashSet<&str> = HashSet::new();
    let mut results = Vec::new();

    for pair in ranked {
        if committed.contains(pair.a.id.as_str()) || committed.contains(pair.b.id.as_str()) {
            continue;
        }
        committed.insert(pair.a.id.as_str());
        committed.insert(pair.b.id.as_str());
        results.push(MatchResult {
            pair_a: pair.a.id.clone(),
            pair_b: pair.b.id.clone(),
            score: pair.score,
            topic: derive_topic(pair.a, pair.b),
        });
    }

    results
}

/// Conversation topic for a committed pair.
///
/// Uses the first of `a`'s interests (in `a`'s casing) that `b` shares, or
/// falls back to introducing the two agents.
pub fn derive_topic(a: &AgentProfile, b: &AgentProfile) -> String {
    let theirs: HashSet<String> = b.interests.iter().map(|i| i.to_lowercase()).collect();
    a.interests
        .iter()
        .find(|i| !i.trim().is_empty() && theirs.contains(&i.to_lowercase()))
        .map_or_else(
            || format!("{} meets {}", a.name, b.name),
            |shared| format!("Shared interest: {shared}"),
        )
}
