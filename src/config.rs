use std::fmt;
use std::time::Duration;

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::matching::{
    CompatibilityScorer, DEFAULT_MIN_DIRECTIVE_TOKEN_LEN, Matcher, ScoringWeights, TermMatcherKind,
};

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Bearer token accepted by the manual matching trigger
    #[arg(long, env = "SERVICE_ROLE_KEY", hide_env_values = true)]
    pub service_key: Option<String>,

    /// Bearer token accepted by the cron trigger
    #[arg(long, env = "CRON_SECRET", hide_env_values = true)]
    pub cron_secret: Option<String>,

    /// Persistence provider (memory, postgres)
    #[arg(long)]
    pub provider: Option<String>,

    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// YAML roster seed for the memory provider
    #[arg(long, env = "SEED_FILE")]
    pub seed_file: Option<String>,

    /// Run one matching pass, print the report and exit
    #[arg(long)]
    pub run_once: bool,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub security: SecurityConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub request_timeout_secs: u64,
}

/// Shared secrets for the trigger endpoints. An empty secret rejects every request.
#[derive(Deserialize, Clone)]
pub struct SecurityConfig {
    pub service_key: String,
    pub cron_secret: String,
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("service_key", &redacted(&self.service_key))
            .field("cron_secret", &redacted(&self.cron_secret))
            .finish()
    }
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() { "<unset>" } else { "<redacted>" }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MatchingConfig {
    pub weights: ScoringWeights,
    pub term_matcher: TermMatcherKind,
    /// Directive tokens shorter than this many characters are ignored.
    pub min_directive_token_len: usize,
    /// Abort a run whose scoring phase takes longer than this.
    pub deadline_ms: Option<u64>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            term_matcher: TermMatcherKind::default(),
            min_directive_token_len: DEFAULT_MIN_DIRECTIVE_TOKEN_LEN,
            deadline_ms: None,
        }
    }
}

impl MatchingConfig {
    pub fn build_matcher(&self) -> Matcher {
        let scorer = CompatibilityScorer::new(self.weights)
            .with_term_matcher(self.term_matcher.build())
            .with_min_directive_token_len(self.min_directive_token_len);
        let matcher = Matcher::new(scorer);
        match self.deadline_ms {
            Some(ms) => matcher.with_deadline(Duration::from_millis(ms)),
            None => matcher,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PersistenceConfig {
    pub provider: String,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub seed_file: Option<String>,
}

impl AppConfig {
    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Self::from_cli(&cli)
    }

    /// Layer defaults, config file, `MATCHMAKER_*` env vars and CLI flags.
    ///
    /// Priority: CLI flag (or its env var) > `MATCHMAKER_*` env > file > defaults.
    pub fn from_cli(cli: &Cli) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.request_timeout_secs", 30)?
            .set_default("security.service_key", "")?
            .set_default("security.cron_secret", "")?
            .set_default("persistence.provider", "memory")?;

        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path)),
            // ./config.yaml (or .toml, .json) when present
            None => builder.add_source(File::with_name("config").required(false)),
        };

        // E.g. MATCHMAKER_SERVER__PORT=8000, MATCHMAKER_MATCHING__WEIGHTS__NOVELTY_BONUS=40
        builder = builder.add_source(
            Environment::with_prefix("MATCHMAKER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(key) = &cli.service_key {
            builder = builder.set_override("security.service_key", key.as_str())?;
        }
        if let Some(secret) = &cli.cron_secret {
            builder = builder.set_override("security.cron_secret", secret.as_str())?;
        }
        if let Some(provider) = &cli.provider {
            builder = builder.set_override("persistence.provider", provider.as_str())?;
        }
        if let Some(url) = &cli.database_url {
            builder = builder.set_override("persistence.database_url", url.as_str())?;
        }
        if let Some(seed) = &cli.seed_file {
            builder = builder.set_override("persistence.seed_file", seed.as_str())?;
        }

        builder.build()?.try_deserialize()
    }
}
