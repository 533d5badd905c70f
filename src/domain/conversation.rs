use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::agent::AgentProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    #[default]
    Active,
    Closed,
    Archived,
}

impl ConversationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConversationStatus::Active => "active",
            ConversationStatus::Closed => "closed",
            ConversationStatus::Archived => "archived",
        }
    }
}

impl FromStr for ConversationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ConversationStatus::Active),
            "closed" => Ok(ConversationStatus::Closed),
            "archived" => Ok(ConversationStatus::Archived),
            other => Err(format!("unknown conversation status: {other}")),
        }
    }
}

/// A conversation record opened for a committed pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub agent_a: String,
    pub agent_b: String,
    #[serde(default)]
    pub status: ConversationStatus,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub compatibility_score: Option<i64>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Public profile of the other side of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
}

impl Partner {
    /// Placeholder for a partner whose record no longer exists.
    pub fn unknown(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            persona: None,
            goals: Vec::new(),
            skills: Vec::new(),
            interests: Vec::new(),
        }
    }
}

impl From<&AgentProfile> for Partner {
    fn from(profile: &AgentProfile) -> Self {
        Self {
            id: profile.id.clone(),
            name: profile.name.clone(),
            persona: profile.persona.clone(),
            goals: profile.goals.clone(),
            skills: profile.skills.clone(),
            interests: profile.interests.clone(),
        }
    }
}

/// An agent's most recent conversation, seen from that agent's side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMatch {
    pub conversation_id: String,
    pub partner: Partner,
    pub topic: Option<String>,
    pub status: ConversationStatus,
}

/// One persisted pairing as reported back to the trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub conversation_id: String,
    /// Display names, `[agent_a, agent_b]`.
    pub agents: [String; 2],
    pub score: i64,
    pub topic: String,
}

/// Outcome of a single matching run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchReport {
    pub date: NaiveDate,
    pub total_agents: usize,
    pub matches_created: usize,
    /// Pairings the matcher committed but the store failed to persist.
    #[serde(default)]
    pub failed: usize,
    pub matches: Vec<MatchSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MatchReport {
    pub const INSUFFICIENT_ROSTER: &'static str = "Not enough active agents";

    pub fn insufficient_roster(date: NaiveDate, total_agents: usize) -> Self {
        Self {
            date,
            total_agents,
            matches_created: 0,
            failed: 0,
            matches: Vec::new(),
            message: Some(Self::INSUFFICIENT_ROSTER.to_string()),
        }
    }
}
