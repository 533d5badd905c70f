//! Agent Matchmaker
//!
//! Daily batch pairing for an agent-profile directory. Every run scores each
//! pair of active agents, ranks the pairs and greedily opens one conversation
//! per agent.
//!
//! # Architecture
//!
//! - **Matcher**: pure scoring, ranking and greedy selection
//! - **Run manager**: loads the roster, runs the matcher, persists results
//! - **Stores**: in-memory (YAML seed) and Postgres providers
//! - **Server**: Axum trigger endpoints guarded by shared bearer secrets
//!
//! # Modules
//!
//! - [`matching`]: scoring signals, ranking, selection, topics
//! - [`domain`]: agents, directives, conversations, run reports
//! - [`persistence`]: the [`persistence::MatchStore`] seam and its providers
//! - [`runtime`]: the run manager
//! - [`api`]: HTTP routes

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod api;
pub mod config;
pub mod domain;
pub mod matching;
pub mod persistence;
pub mod runtime;
pub mod security;
pub mod server;
pub mod telemetry;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::runtime::MatchRunManager;

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Runs and previews matching passes.
    pub runs: Arc<MatchRunManager>,
    /// Global Configuration
    pub config: Arc<AppConfig>,
}
