//! In-process store, optionally seeded from a YAML roster file.
//!
//! Seed file layout:
//!
//! ```yaml
//! agents:
//!   - id: agent-1
//!     name: Ada
//!     status: active
//!     skills: [rust]
//!     directives:
//!       - instruction: find a designer
//! conversations:
//!   - agent_a: agent-1
//!     agent_b: agent-2
//! ```

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    AgentMatch, AgentProfile, AgentRecord, Conversation, ConversationStatus, Partner,
};
use crate::matching::{MatchResult, PairKey};
use crate::persistence::MatchStore;

#[derive(Debug, Default, Deserialize)]
struct SeedFile {
    #[serde(default)]
    agents: Vec<AgentRecord>,
    #[serde(default)]
    conversations: Vec<SeedConversation>,
}

#[derive(Debug, Deserialize)]
struct SeedConversation {
    agent_a: String,
    agent_b: String,
    #[serde(default)]
    status: ConversationStatus,
    #[serde(default)]
    topic: Option<String>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    agents: RwLock<Vec<AgentRecord>>,
    conversations: RwLock<Vec<Conversation>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agents(agents: Vec<AgentRecord>) -> Self {
        Self {
            agents: RwLock::new(agents),
            conversations: RwLock::new(Vec::new()),
        }
    }

    pub fn from_seed_str(yaml: &str) -> Result<Self> {
        let seed: SeedFile = serde_yaml::from_str(yaml).context("Invalid roster seed")?;
        let conversations = seed
            .conversations
            .into_iter()
            .map(|c| Conversation {
                id: Uuid::new_v4().to_string(),
                agent_a: c.agent_a,
                agent_b: c.agent_b,
                status: c.status,
                topic: c.topic,
                compatibility_score: None,
                created_at: Utc::now(),
            })
            .collect();

        Ok(Self {
            agents: RwLock::new(seed.agents),
            conversations: RwLock::new(conversations),
        })
    }

    pub async fn from_seed_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read roster seed {}", path.display()))?;
        let store = Self::from_seed_str(&yaml)?;
        tracing::info!(
            name: "persistence.memory.seeded",
            path = %path.display(),
            agents = store.agents.read().await.len(),
            "Loaded roster seed"
        );
        Ok(store)
    }

    pub async fn conversations(&self) -> Vec<Conversation> {
        self.conversations.read().await.clone()
    }
}

#[async_trait]
impl MatchStore for InMemoryStore {
    async fn list_active_agents(&self) -> Result<Vec<AgentProfile>> {
        Ok(self
            .agents
            .read()
            .await
            .iter()
            .filter_map(AgentRecord::to_roster_entry)
            .collect())
    }

    async fn historical_pairs(&self) -> Result<HashSet<PairKey>> {
        Ok(self
            .conversations
            .read()
            .await
            .iter()
            .map(|c| PairKey::new(&c.agent_a, &c.agent_b))
            .collect())
    }

    async fn create_conversation(&self, result: &MatchResult) -> Result<Conversation> {
        let conversation = Conversation {
            id: Uuid::new_v4().to_string(),
            agent_a: result.pair_a.clone(),
            agent_b: result.pair_b.clone(),
            status: ConversationStatus::Active,
            topic: Some(result.topic.clone()),
            compatibility_score: Some(result.score),
            created_at: Utc::now(),
        };
        self.conversations.write().await.push(conversation.clone());
        Ok(conversation)
    }

    async fn latest_match_for(
        &self,
        agent_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<AgentMatch>> {
        let conversations = self.conversations.read().await;
        let Some(conversation) = conversations
            .iter()
            .filter(|c| (c.agent_a == agent_id || c.agent_b == agent_id) && c.created_at >= since)
            .max_by_key(|c| c.created_at)
        else {
            return Ok(None);
        };

        let partner_id = if conversation.agent_a == agent_id {
            &conversation.agent_b
        } else {
            &conversation.agent_a
        };
        let partner = self
            .agents
            .read()
            .await
            .iter()
            .find(|r| r.profile.id == *partner_id)
            .map_or_else(|| Partner::unknown(partner_id), |r| Partner::from(&r.profile));

        Ok(Some(AgentMatch {
            conversation_id: conversation.id.clone(),
            partner,
            topic: conversation.topic.clone(),
            status: conversation.status,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = r"
agents:
  - id: a1
    name: Ada
    skills: [rust]
    directives:
      - instruction: find designers
      - instruction: old request
        status: completed
  - id: a2
    name: Bo
    status: paused
  - id: a3
    name: Cy
conversations:
  - agent_a: a3
    agent_b: a1
";

    #[tokio::test]
    async fn test_seed_roster_filters_inactive_agents() {
        let store = InMemoryStore::from_seed_str(SEED).unwrap();
        let roster = store.list_active_agents().await.unwrap();

        let ids: Vec<_> = roster.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a3"]);
        assert_eq!(roster[0].pending_directives, vec!["find designers"]);
    }

    #[tokio::test]
    async fn test_history_includes_seeded_and_created_conversations() {
        let store = InMemoryStore::from_seed_str(SEED).unwrap();
        store
            .create_conversation(&MatchResult {
                pair_a: "a2".to_string(),
                pair_b: "a1".to_string(),
                score: 60,
                topic: "Ada meets Bo".to_string(),
            })
            .await
            .unwrap();

        let history = store.historical_pairs().await.unwrap();
        assert!(history.contains(&PairKey::new("a1", "a3")));
        assert!(history.contains(&PairKey::new("a1", "a2")));
        assert_eq!(history.len(), 2);

        let created = store.conversations().await;
        assert_eq!(created[1].compatibility_score, Some(60));
        assert_eq!(created[1].status, ConversationStatus::Active);
    }

    #[tokio::test]
    async fn test_latest_match_reports_the_partner() {
        let store = InMemoryStore::from_seed_str(SEED).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let before = Utc::now();
        let created = store
            .create_conversation(&MatchResult {
                pair_a: "a1".to_string(),
                pair_b: "a2".to_string(),
                score: 50,
                topic: "Ada meets Bo".to_string(),
            })
            .await
            .unwrap();

        let found = store.latest_match_for("a2", before).await.unwrap().unwrap();
        assert_eq!(found.conversation_id, created.id);
        assert_eq!(found.partner.name, "Ada");
        assert_eq!(found.partner.skills, vec!["rust"]);
        assert_eq!(found.topic.as_deref(), Some("Ada meets Bo"));

        // The seeded a1-a3 conversation predates `before`.
        assert!(store.latest_match_for("a3", before).await.unwrap().is_none());
        let since_ever = DateTime::<Utc>::MIN_UTC;
        let seeded = store.latest_match_for("a3", since_ever).await.unwrap().unwrap();
        assert_eq!(seeded.partner.id, "a1");
    }

    #[tokio::test]
    async fn test_latest_match_falls_back_for_unknown_partner() {
        let store = InMemoryStore::from_seed_str(
            "conversations:\n  - agent_a: ghost\n    agent_b: a1\n",
        )
        .unwrap();
        let found = store
            .latest_match_for("a1", DateTime::<Utc>::MIN_UTC)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.partner, Partner::unknown("ghost"));
    }

    #[test]
    fn test_invalid_seed_is_rejected() {
        assert!(InMemoryStore::from_seed_str("agents: 12").is_err());
    }
}
