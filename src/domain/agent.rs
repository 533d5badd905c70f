use serde::{Deserialize, Serialize};

/// Lifecycle status of an agent in the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Active,
    Inactive,
    Paused,
}

impl AgentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentStatus::Active => "active",
            AgentStatus::Inactive => "inactive",
            AgentStatus::Paused => "paused",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

/// A free-text instruction from an agent's owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub instruction: String,
    #[serde(default)]
    pub status: DirectiveStatus,
}

/// The profile the matcher scores.
///
/// Only active agents are handed to the matcher, and only the instructions
/// of their pending directives are carried along.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AgentProfile {
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
    #[serde(default)]
    pub pending_directives: Vec<String>,
}

impl AgentProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Some(persona.into());
        self
    }

    #[must_use]
    pub fn with_goals<I, S>(mut self, goals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.goals = goals.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skills = skills.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_interests<I, S>(mut self, interests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interests = interests.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_directives<I, S>(mut self, directives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pending_directives = directives.into_iter().map(Into::into).collect();
        self
    }
}

/// A directory entry as stored, before roster filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRecord {
    #[serde(flatten)]
    pub profile: AgentProfile,
    #[serde(default)]
    pub status: AgentStatus,
    #[serde(default)]
    pub directives: Vec<Directive>,
}

impl AgentRecord {
    /// Project the record into the matcher's input, or `None` when the agent
    /// is not active.
    pub fn to_roster_entry(&self) -> Option<AgentProfile> {
        if self.status != AgentStatus::Active {
            return None;
        }
        let mut profile = self.profile.clone();
        profile.pending_directives = self
            .directives
            .iter()
            .filter(|d| d.status == DirectiveStatus::Pending)
            .map(|d| d.instruction.clone())
            .collect();
        Some(profile)
    }
}
