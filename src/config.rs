use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// How long a computed leaderboard may be served before recomputing.
    pub leaderboard_cache_ttl_secs: u64,
    /// Retry budget for event-store appends before the scan is queued for
    /// reconciliation.
    pub persist_retry_max_elapsed_ms: u64,
    /// Retry budget for loading rules/settings on the scoring path; scoring
    /// fails closed once this is exhausted.
    pub scoring_retry_max_elapsed_ms: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let leaderboard_cache_ttl_secs =
            parse_u64(&env_map, "LEADERBOARD_CACHE_TTL_SECS", "30")?;
        let persist_retry_max_elapsed_ms =
            parse_u64(&env_map, "PERSIST_RETRY_MAX_ELAPSED_MS", "2000")?;
        let scoring_retry_max_elapsed_ms =
            parse_u64(&env_map, "SCORING_RETRY_MAX_ELAPSED_MS", "1000")?;

        Ok(Config {
            port,
            database_path,
            leaderboard_cache_ttl_secs,
            persist_retry_max_elapsed_ms,
            scoring_retry_max_elapsed_ms,
        })
    }
}

fn parse_u64(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<u64, ConfigError> {
    env_map
        .get(key)
        .map(|s| s.as_str())
        .unwrap_or(default)
        .parse::<u64>()
        .map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), "must be a valid u64".to_string())
        })
}
