//! Directory entities shared by the matcher, the stores and the API.

pub mod agent;
pub mod conversation;

pub use agent::{AgentProfile, AgentRecord, AgentStatus, Directive, DirectiveStatus};
pub use conversation::{
    AgentMatch, Conversation, ConversationStatus, MatchReport, MatchSummary, Partner,
};
