//! Drives one matching run end to end: load, match, persist, report.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::domain::{AgentMatch, AgentProfile, MatchReport, MatchSummary};
use crate::matching::{MatchError, Matcher, ScoreBreakdown};
use crate::persistence::MatchStore;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error("store error: {0:#}")]
    Store(#[from] anyhow::Error),
    #[error("matching task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A scored candidate pair, as shown by a dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedCandidate {
    pub agent_a: String,
    pub agent_b: String,
    pub names: [String; 2],
    pub score: i64,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug)]
pub struct MatchRunManager {
    store: Arc<dyn MatchStore>,
    matcher: Matcher,
    /// Held for a whole run so overlapping triggers cannot interleave writes.
    run_lock: Mutex<()>,
}

impl MatchRunManager {
    pub fn new(store: Arc<dyn MatchStore>, matcher: Matcher) -> Self {
        Self {
            store,
            matcher,
            run_lock: Mutex::new(()),
        }
    }

    /// Run today's pass on its own task.
    ///
    /// The pass keeps going when the caller stops waiting, so a timed-out
    /// or disconnected trigger never leaves a matching half persisted.
    pub async fn run_today(self: &Arc<Self>) -> Result<MatchReport, RunError> {
        let manager = Arc::clone(self);
        let date = Utc::now().date_naive();
        tokio::spawn(async move { manager.run(date).await }).await?
    }

    /// Pair the current roster and open a conversation for every committed pair.
    ///
    /// A failed conversation write is logged and counted in the report; it
    /// does not stop the remaining writes.
    pub async fn run(&self, date: NaiveDate) -> Result<MatchReport, RunError> {
        let _guard = self.run_lock.lock().await;

        let agents = self.store.list_active_agents().await?;
        if agents.len() < 2 {
            warn!(
                name: "matching.run.insufficient_roster",
                %date,
                total_agents = agents.len(),
                "Not enough active agents to match"
            );
            return Ok(MatchReport::insufficient_roster(date, agents.len()));
        }

        let history = self.store.historical_pairs().await?;
        let results = self.matcher.run(&agents, &history)?;
        let names = names_by_id(&agents);

        let mut matches = Vec::with_capacity(results.len());
        let mut failed = 0;
        for result in &results {
            match self.store.create_conversation(result).await {
                Ok(conversation) => {
                    info!(
                        name: "matching.run.paired",
                        conversation_id = %conversation.id,
                        agent_a = %result.pair_a,
                        agent_b = %result.pair_b,
                        score = result.score,
                        topic = %result.topic,
                        "Conversation opened"
                    );
                    matches.push(MatchSummary {
                        conversation_id: conversation.id,
                        agents: [
                            display_name(&names, &result.pair_a),
                            display_name(&names, &result.pair_b),
                        ],
                        score: result.score,
                        topic: result.topic.clone(),
                    });
                }
                Err(e) => {
                    failed += 1;
                    error!(
                        name: "matching.run.persist_failed",
                        agent_a = %result.pair_a,
                        agent_b = %result.pair_b,
                        error = ?e,
                        "Failed to open conversation"
                    );
                }
            }
        }

        info!(
            name: "matching.run.completed",
            %date,
            total_agents = agents.len(),
            history = history.len(),
            matches_created = matches.len(),
            failed,
            "Matching run completed"
        );

        Ok(MatchReport {
            date,
            total_agents: agents.len(),
            matches_created: matches.len(),
            failed,
            matches,
            message: None,
        })
    }

    /// Score and rank the current roster without committing anything.
    pub async fn preview(&self) -> Result<Vec<RankedCandidate>, RunError> {
        let agents = self.store.list_active_agents().await?;
        let history = self.store.historical_pairs().await?;
        let ranked = self.matcher.rank(&agents, &history)?;

        Ok(ranked
            .into_iter()
            .map(|pair| RankedCandidate {
                agent_a: pair.a.id.clone(),
                agent_b: pair.b.id.clone(),
                names: [pair.a.name.clone(), pair.b.name.clone()],
                score: pair.score,
                breakdown: pair.breakdown,
            })
            .collect())
    }

    /// The conversation `agent_id` was paired into today, if any.
    pub async fn todays_match(&self, agent_id: &str) -> Result<Option<AgentMatch>, RunError> {
        self.match_on(agent_id, Utc::now().date_naive()).await
    }

    /// Latest conversation for `agent_id` opened on or after the start of `date` (UTC).
    pub async fn match_on(
        &self,
        agent_id: &str,
        date: NaiveDate,
    ) -> Result<Option<AgentMatch>, RunError> {
        let since = date.and_time(NaiveTime::MIN).and_utc();
        Ok(self.store.latest_match_for(agent_id, since).await?)
    }
}

fn names_by_id(agents: &[AgentProfile]) -> HashMap<&str, &str> {
    agents
        .iter()
        .map(|a| (a.id.as_str(), a.name.as_str()))
        .collect()
}

fn display_name(names: &HashMap<&str, &str>, id: &str) -> String {
    names.get(id).map_or_else(|| id.to_string(), |n| (*n).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentRecord, AgentStatus, Conversation};
    use crate::matching::{MatchResult, PairKey};
    use crate::persistence::providers::memory::InMemoryStore;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::collections::HashSet;
    use std::time::Duration;

    fn record(profile: AgentProfile) -> AgentRecord {
        AgentRecord {
            profile,
            status: AgentStatus::Active,
            directives: Vec::new(),
        }
    }

    fn store() -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::with_agents(vec![
            record(
                AgentProfile::new("x", "Xia")
                    .with_skills(["python"])
                    .with_goals(["funding"]),
            ),
            record(
                AgentProfile::new("y", "Yuki")
                    .with_skills(["funding advice"])
                    .with_goals(["python help"]),
            ),
            record(AgentProfile::new("z", "Zed")),
        ]))
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    /// Delegates to an in-memory store but refuses to open conversations for one agent.
    #[derive(Debug)]
    struct RejectingStore {
        inner: Arc<InMemoryStore>,
        reject: String,
    }

    #[async_trait]
    impl MatchStore for RejectingStore {
        async fn list_active_agents(&self) -> anyhow::Result<Vec<AgentProfile>> {
            self.inner.list_active_agents().await
        }

        async fn historical_pairs(&self) -> anyhow::Result<HashSet<PairKey>> {
            self.inner.historical_pairs().await
        }

        async fn create_conversation(&self, result: &MatchResult) -> anyhow::Result<Conversation> {
            if result.pair_a == self.reject || result.pair_b == self.reject {
                anyhow::bail!("write rejected");
            }
            self.inner.create_conversation(result).await
        }

        async fn latest_match_for(
            &self,
            agent_id: &str,
            since: DateTime<Utc>,
        ) -> anyhow::Result<Option<AgentMatch>> {
            self.inner.latest_match_for(agent_id, since).await
        }
    }

    /// Delegates to an in-memory store, pausing before every conversation write.
    #[derive(Debug)]
    struct SlowStore {
        inner: Arc<InMemoryStore>,
        delay: Duration,
    }

    #[async_trait]
    impl MatchStore for SlowStore {
        async fn list_active_agents(&self) -> anyhow::Result<Vec<AgentProfile>> {
            self.inner.list_active_agents().await
        }

        async fn historical_pairs(&self) -> anyhow::Result<HashSet<PairKey>> {
            self.inner.historical_pairs().await
        }

        async fn create_conversation(&self, result: &MatchResult) -> anyhow::Result<Conversation> {
            tokio::time::sleep(self.delay).await;
            self.inner.create_conversation(result).await
        }

        async fn latest_match_for(
            &self,
            agent_id: &str,
            since: DateTime<Utc>,
        ) -> anyhow::Result<Option<AgentMatch>> {
            self.inner.latest_match_for(agent_id, since).await
        }
    }

    #[tokio::test]
    async fn test_run_persists_committed_pairs() {
        let store = store();
        let manager = MatchRunManager::new(store.clone(), Matcher::default());

        let report = manager.run(day()).await.unwrap();

        assert_eq!(report.total_agents, 3);
        assert_eq!(report.matches_created, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(report.matches[0].agents, ["Xia".to_string(), "Yuki".to_string()]);
        assert_eq!(report.matches[0].score, 90);
        assert_eq!(report.matches[0].topic, "Xia meets Yuki");

        let conversations = store.conversations().await;
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].id, report.matches[0].conversation_id);
    }

    #[tokio::test]
    async fn test_second_run_sees_first_run_as_history() {
        let store = store();
        let manager = MatchRunManager::new(store.clone(), Matcher::default());

        manager.run(day()).await.unwrap();
        let report = manager.run(day()).await.unwrap();

        // x-y lost its novelty bonus (40), so a fresh pair involving z wins.
        assert_eq!(report.matches_created, 1);
        assert_eq!(report.matches[0].score, 50);
        assert!(report.matches[0].agents.contains(&"Zed".to_string()));
    }

    #[tokio::test]
    async fn test_insufficient_roster_is_an_empty_report() {
        let store = Arc::new(InMemoryStore::with_agents(vec![record(AgentProfile::new(
            "solo", "Solo",
        ))]));
        let manager = MatchRunManager::new(store, Matcher::default());

        let report = manager.run(day()).await.unwrap();
        assert!(report.matches.is_empty());
        assert_eq!(report.total_agents, 1);
        assert_eq!(report.message.as_deref(), Some(MatchReport::INSUFFICIENT_ROSTER));
    }

    #[tokio::test]
    async fn test_failed_write_does_not_abort_the_run() {
        let inner = Arc::new(InMemoryStore::with_agents(vec![
            record(AgentProfile::new("a", "A").with_interests(["chess"])),
            record(AgentProfile::new("b", "B").with_interests(["chess"])),
            record(AgentProfile::new("c", "C")),
            record(AgentProfile::new("d", "D")),
        ]));
        let store = Arc::new(RejectingStore {
            inner: inner.clone(),
            reject: "a".to_string(),
        });
        let manager = MatchRunManager::new(store, Matcher::default());

        let report = manager.run(day()).await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.matches_created, 1);
        assert_eq!(report.matches[0].agents, ["C".to_string(), "D".to_string()]);
        assert_eq!(inner.conversations().await.len(), 1);
    }

    #[tokio::test]
    async fn test_deadline_surfaces_as_match_error() {
        let manager = MatchRunManager::new(store(), Matcher::default().with_deadline(Duration::ZERO));
        let err = manager.run(day()).await.unwrap_err();
        assert!(matches!(err, RunError::Match(MatchError::DeadlineExceeded { .. })));
    }

    #[tokio::test]
    async fn test_preview_ranks_without_persisting() {
        let store = store();
        let manager = MatchRunManager::new(store.clone(), Matcher::default());

        let ranked = manager.preview().await.unwrap();

        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].names, ["Xia".to_string(), "Yuki".to_string()]);
        assert_eq!(ranked[0].breakdown.skill_goal, 40);
        assert_eq!(ranked[0].breakdown.novelty, 50);
        assert!(store.conversations().await.is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_runs_are_serialized() {
        let store = store();
        let manager = Arc::new(MatchRunManager::new(store.clone(), Matcher::default()));

        let (first, second) = tokio::join!(manager.run(day()), manager.run(day()));
        let mut scores = vec![first.unwrap().matches[0].score, second.unwrap().matches[0].score];
        scores.sort_unstable();

        // The second run always observes the first run's conversation.
        assert_eq!(scores, vec![50, 90]);
        assert_eq!(store.conversations().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_finishes_after_the_caller_gives_up() {
        let inner = Arc::new(InMemoryStore::with_agents(
            (0..8)
                .map(|i| record(AgentProfile::new(format!("a{i}"), format!("Agent {i}"))))
                .collect(),
        ));
        let store = Arc::new(SlowStore {
            inner: inner.clone(),
            delay: Duration::from_millis(400),
        });
        let manager = Arc::new(MatchRunManager::new(store, Matcher::default()));

        let abandoned = tokio::time::timeout(Duration::from_secs(1), manager.run_today()).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        let conversations = inner.conversations().await;
        assert_eq!(conversations.len(), 4);

        let mut seen = HashSet::new();
        for c in &conversations {
            assert!(seen.insert(c.agent_a.clone()));
            assert!(seen.insert(c.agent_b.clone()));
        }
    }

    #[tokio::test]
    async fn test_match_on_reports_todays_partner() {
        let store = store();
        let manager = Arc::new(MatchRunManager::new(store, Matcher::default()));

        assert!(manager.todays_match("x").await.unwrap().is_none());

        manager.run_today().await.unwrap();

        let found = manager.todays_match("y").await.unwrap().unwrap();
        assert_eq!(found.partner.id, "x");
        assert_eq!(found.partner.name, "Xia");
        assert_eq!(found.topic.as_deref(), Some("Xia meets Yuki"));
        assert!(manager.todays_match("z").await.unwrap().is_none());

        let tomorrow = Utc::now().date_naive().succ_opt().unwrap();
        assert!(manager.match_on("y", tomorrow).await.unwrap().is_none());
    }
}
