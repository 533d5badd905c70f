//! Storage seam for the matching run.
//!
//! The matcher itself never touches storage. A [`MatchStore`] supplies the
//! active roster and the pairing history, and receives one conversation per
//! committed pairing.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::PersistenceConfig;
use crate::domain::{AgentMatch, AgentProfile, Conversation};
use crate::matching::{MatchResult, PairKey};

pub mod providers;

#[async_trait]
pub trait MatchStore: Send + Sync + std::fmt::Debug {
    /// Active agents, each carrying the instructions of its pending directives.
    async fn list_active_agents(&self) -> Result<Vec<AgentProfile>>;

    /// Every pair that has ever been matched, regardless of outcome.
    async fn historical_pairs(&self) -> Result<HashSet<PairKey>>;

    /// Open an active conversation for a committed pairing.
    async fn create_conversation(&self, result: &MatchResult) -> Result<Conversation>;

    /// Latest conversation involving `agent_id` created at or after `since`.
    async fn latest_match_for(
        &self,
        agent_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<AgentMatch>>;
}

/// Build the store named by `persistence.provider`.
pub async fn connect(config: &PersistenceConfig) -> Result<Arc<dyn MatchStore>> {
    match config.provider.as_str() {
        "memory" => {
            let store = match &config.seed_file {
                Some(path) => providers::memory::InMemoryStore::from_seed_file(path).await?,
                None => providers::memory::InMemoryStore::new(),
            };
            Ok(Arc::new(store))
        }
        "postgres" => {
            let Some(url) = config.database_url.as_deref() else {
                bail!("persistence.database_url is required for the postgres provider");
            };
            let store = providers::postgres::PostgresStore::new(url).await?;
            Ok(Arc::new(store))
        }
        other => bail!("Unknown persistence provider: {other}"),
    }
}
