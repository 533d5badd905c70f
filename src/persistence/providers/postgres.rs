use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use crate::domain::{
    AgentMatch, AgentProfile, AgentStatus, Conversation, ConversationStatus, Partner,
};
use crate::matching::{MatchResult, PairKey};
use crate::persistence::MatchStore;

#[derive(Debug)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn new(connection_string: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(connection_string)
            .await?;

        // Run Migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl MatchStore for PostgresStore {
    async fn list_active_agents(&self) -> Result<Vec<AgentProfile>> {
        // Stable roster order keeps tie-breaks reproducible across runs.
        let rows = sqlx::query(
            r#"
            SELECT
                a.id::text AS id,
                a.name,
                a.persona,
                a.goals,
                a.skills,
                a.interests,
                COALESCE(
                    array_agg(d.instruction ORDER BY d.created_at) FILTER (WHERE d.id IS NOT NULL),
                    ARRAY[]::text[]
                ) AS directives
            FROM agents a
            LEFT JOIN directives d ON d.agent_id = a.id AND d.status = 'pending'
            WHERE a.status = $1
            GROUP BY a.id
            ORDER BY a.created_at, a.id
            "#,
        )
        .bind(AgentStatus::Active.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut agents = Vec::with_capacity(rows.len());
        for row in rows {
            agents.push(AgentProfile {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                persona: row.try_get("persona")?,
                goals: row.try_get::<Option<Vec<String>>, _>("goals")?.unwrap_or_default(),
                skills: row.try_get::<Option<Vec<String>>, _>("skills")?.unwrap_or_default(),
                interests: row
                    .try_get::<Option<Vec<String>>, _>("interests")?
                    .unwrap_or_default(),
                pending_directives: row.try_get("directives")?,
            });
        }
        Ok(agents)
    }

    async fn historical_pairs(&self) -> Result<HashSet<PairKey>> {
        let rows = sqlx::query("SELECT agent_a::text AS agent_a, agent_b::text AS agent_b FROM conversations")
            .fetch_all(&self.pool)
            .await?;

        let mut pairs = HashSet::with_capacity(rows.len());
        for row in rows {
            let a: String = row.try_get("agent_a")?;
            let b: String = row.try_get("agent_b")?;
            pairs.insert(PairKey::new(&a, &b));
        }
        Ok(pairs)
    }

    async fn create_conversation(&self, result: &MatchResult) -> Result<Conversation> {
        let row = sqlx::query(
            r#"
            INSERT INTO conversations (agent_a, agent_b, topic, compatibility_score, status)
            VALUES ($1::uuid, $2::uuid, $3, $4, $5)
            RETURNING id::text AS id, created_at
            "#,
        )
        .bind(&result.pair_a)
        .bind(&result.pair_b)
        .bind(&result.topic)
        .bind(result.score)
        .bind(ConversationStatus::Active.as_str())
        .fetch_one(&self.pool)
        .await?;

        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        Ok(Conversation {
            id: row.try_get("id")?,
            agent_a: result.pair_a.clone(),
            agent_b: result.pair_b.clone(),
            status: ConversationStatus::Active,
            topic: Some(result.topic.clone()),
            compatibility_score: Some(result.score),
            created_at,
        })
    }

    async fn latest_match_for(
        &self,
        agent_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<AgentMatch>> {
        // Compared as text so a malformed id finds nothing instead of failing the cast.
        let row = sqlx::query(
            r#"
            SELECT
                c.id::text AS id,
                c.status,
                c.topic,
                p.id::text AS partner_id,
                p.name,
                p.persona,
                p.goals,
                p.skills,
                p.interests
            FROM conversations c
            JOIN agents p
                ON p.id = CASE WHEN c.agent_a::text = $1 THEN c.agent_b ELSE c.agent_a END
            WHERE (c.agent_a::text = $1 OR c.agent_b::text = $1)
                AND c.created_at >= $2
            ORDER BY c.created_at DESC
            LIMIT 1
            "#,
        )
        .bind(agent_id)
        .bind(since)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status: String = row.try_get("status")?;
        Ok(Some(AgentMatch {
            conversation_id: row.try_get("id")?,
            partner: Partner {
                id: row.try_get("partner_id")?,
                name: row.try_get("name")?,
                persona: row.try_get("persona")?,
                goals: row.try_get("goals")?,
                skills: row.try_get("skills")?,
                interests: row.try_get("interests")?,
            },
            topic: row.try_get("topic")?,
            status: status.parse().map_err(anyhow::Error::msg)?,
        }))
    }
}
