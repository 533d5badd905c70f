//! Pairwise compatibility scoring.
//!
//! A score is the sum of independent additive signals. Every matching
//! combination adds its weight once, and nothing is normalized by profile
//! size: agents with long skill/goal/interest lists accumulate more points.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::pair::PairKey;
use crate::domain::AgentProfile;

/// Weight of each scoring signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Awarded once when the pair has never been matched before.
    pub novelty_bonus: i64,
    /// Per (skill, goal) combination where one contains the other.
    pub skill_goal: i64,
    /// Per interest the two agents share.
    pub shared_interest: i64,
    /// Per directive token found in the partner's profile.
    pub directive_token: i64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            novelty_bonus: 50,
            skill_goal: 20,
            shared_interest: 10,
            directive_token: 15,
        }
    }
}

/// Directive tokens shorter than this many characters are ignored.
pub const DEFAULT_MIN_DIRECTIVE_TOKEN_LEN: usize = 4;

/// Decides whether a skill satisfies a goal.
///
/// Both arguments are already lowercased and non-blank.
pub trait TermMatcher: Send + Sync + fmt::Debug {
    fn matches(&self, skill: &str, goal: &str) -> bool;
}

/// Either term contains the other.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringMatcher;

impl TermMatcher for SubstringMatcher {
    fn matches(&self, skill: &str, goal: &str) -> bool {
        skill.contains(goal) || goal.contains(skill)
    }
}

/// The terms share at least one alphanumeric word.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenSetMatcher;

impl TokenSetMatcher {
    fn words(term: &str) -> HashSet<&str> {
        term.split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect()
    }
}

impl TermMatcher for TokenSetMatcher {
    fn matches(&self, skill: &str, goal: &str) -> bool {
        let skill_words = Self::words(skill);
        Self::words(goal).iter().any(|w| skill_words.contains(w))
    }
}

/// Selects the skill/goal comparison from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermMatcherKind {
    #[default]
    Substring,
    TokenSet,
}

impl TermMatcherKind {
    pub fn build(self) -> Arc<dyn TermMatcher> {
        match self {
            TermMatcherKind::Substring => Arc::new(SubstringMatcher),
            TermMatcherKind::TokenSet => Arc::new(TokenSetMatcher),
        }
    }
}

/// Per-signal contributions to one pair's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub novelty: i64,
    pub skill_goal: i64,
    pub shared_interests: i64,
    pub directives: i64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> i64 {
        self.novelty + self.skill_goal + self.shared_interests + self.directives
    }
}

/// Lowercased view of a profile, computed once per run and agent.
#[derive(Debug)]
pub(crate) struct PreparedProfile<'a> {
    pub(crate) profile: &'a AgentProfile,
    skills: Vec<String>,
    goals: Vec<String>,
    interests: HashSet<String>,
    directive_tokens: Vec<String>,
    searchable: String,
}

fn lowercase_non_blank(items: &[String]) -> Vec<String> {
    items
        .iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

/// Scores agent pairs with a fixed weight table and term matcher.
#[derive(Debug, Clone)]
pub struct CompatibilityScorer {
    weights: ScoringWeights,
    term_matcher: Arc<dyn TermMatcher>,
    min_directive_token_len: usize,
}

impl Default for CompatibilityScorer {
    fn default() -> Self {
        Self::new(ScoringWeights::default())
    }
}

impl CompatibilityScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self {
            weights,
            term_matcher: Arc::new(SubstringMatcher),
            min_directive_token_len: DEFAULT_MIN_DIRECTIVE_TOKEN_LEN,
        }
    }

    #[must_use]
    pub fn with_term_matcher(mut self, term_matcher: Arc<dyn TermMatcher>) -> Self {
        self.term_matcher = term_matcher;
        self
    }

    /// Ignore directive tokens shorter than `len` characters.
    #[must_use]
    pub fn with_min_directive_token_len(mut self, len: usize) -> Self {
        self.min_directive_token_len = len;
        self
    }

    pub(crate) fn prepare<'a>(&self, profile: &'a AgentProfile) -> PreparedProfile<'a> {
        let directives = profile.pending_directives.join(" ").to_lowercase();
        let directive_tokens = directives
            .split_whitespace()
            .filter(|t| t.chars().count() >= self.min_directive_token_len)
            .map(str::to_string)
            .collect();

        let searchable = profile
            .skills
            .iter()
            .chain(&profile.interests)
            .map(String::as_str)
            .chain([profile.name.as_str(), profile.persona.as_deref().unwrap_or("")])
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        PreparedProfile {
            profile,
            skills: lowercase_non_blank(&profile.skills),
            goals: lowercase_non_blank(&profile.goals),
            interests: lowercase_non_blank(&profile.interests)
                .into_iter()
                .collect(),
            directive_tokens,
            searchable,
        }
    }

    /// Score every signal for a prepared pair.
    pub(crate) fn breakdown(
        &self,
        a: &PreparedProfile<'_>,
        b: &PreparedProfile<'_>,
        novel: bool,
    ) -> ScoreBreakdown {
        let w = &self.weights;

        let novelty = if novel { w.novelty_bonus } else { 0 };

        let fits = self.skill_goal_fits(a, b) + self.skill_goal_fits(b, a);

        // Distinct shared interests, so the count is the same from either side.
        let shared = a.interests.intersection(&b.interests).count();

        let tokens = Self::directive_hits(a, b) + Self::directive_hits(b, a);

        ScoreBreakdown {
            novelty,
            skill_goal: w.skill_goal * as_points(fits),
            shared_interests: w.shared_interest * as_points(shared),
            directives: w.directive_token * as_points(tokens),
        }
    }

    /// Combinations where `provider` has a skill matching a goal of `seeker`.
    fn skill_goal_fits(&self, provider: &PreparedProfile<'_>, seeker: &PreparedProfile<'_>) -> usize {
        seeker
            .goals
            .iter()
            .map(|goal| {
                provider
                    .skills
                    .iter()
                    .filter(|skill| self.term_matcher.matches(skill, goal))
                    .count()
            })
            .sum()
    }

    /// Tokens of `from`'s directives that occur in `to`'s searchable profile.
    fn directive_hits(from: &PreparedProfile<'_>, to: &PreparedProfile<'_>) -> usize {
        from.directive_tokens
            .iter()
            .filter(|token| to.searchable.contains(token.as_str()))
            .count()
    }

    /// Full breakdown for two profiles against a pairing history.
    pub fn explain(
        &self,
        a: &AgentProfile,
        b: &AgentProfile,
        history: &HashSet<PairKey>,
    ) -> ScoreBreakdown {
        let novel = !history.contains(&PairKey::new(&a.id, &b.id));
        self.breakdown(&self.prepare(a), &self.prepare(b), novel)
    }

    /// Compatibility score for two profiles against a pairing history.
    pub fn score(&self, a: &AgentProfile, b: &AgentProfile, history: &HashSet<PairKey>) -> i64 {
        self.explain(a, b, history).total()
    }
}

fn as_points(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}
