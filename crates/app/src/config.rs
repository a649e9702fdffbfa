//! Application configuration loaded from environment variables.

use std::time::Duration;

/// Runtime configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `DATABASE_URL` — Postgres connection string (required)
/// - `OUTBOX_WORKERS` — dispatcher worker count (default: `4`)
/// - `OUTBOX_POLL_INTERVAL_MS` — dispatcher poll interval (default: `500`)
/// - `OUTBOX_BATCH_SIZE` — rows claimed per poll (default: `50`)
/// - `OUTBOX_STUCK_CLAIM_SECS` — stuck-claim threshold (default: `300`)
/// - `OUTBOX_RECLAIM_INTERVAL_SECS` — reclaimer sweep interval (default: `60`)
/// - `BACKLOG_RESYNC_INTERVAL_SECS` — backlog recount interval (default: `30`)
/// - `BALANCE_MERGE_INTERVAL_SECS` — periodic snapshot merge (default: `60`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub outbox_workers: usize,
    pub outbox_poll_interval: Duration,
    pub outbox_batch_size: u32,
    pub stuck_claim_threshold: chrono::Duration,
    pub reclaim_interval: Duration,
    pub backlog_resync_interval: Duration,
    pub balance_merge_interval: Duration,
    pub log_level: String,
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults for everything except the database URL.
    pub fn from_env() -> Result<Self, String> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL is not set".to_string())?;

        Ok(Self {
            database_url,
            outbox_workers: env_parse("OUTBOX_WORKERS", 4),
            outbox_poll_interval: Duration::from_millis(env_parse(
                "OUTBOX_POLL_INTERVAL_MS",
                500,
            )),
            outbox_batch_size: env_parse("OUTBOX_BATCH_SIZE", 50),
            stuck_claim_threshold: chrono::Duration::seconds(env_parse(
                "OUTBOX_STUCK_CLAIM_SECS",
                300,
            )),
            reclaim_interval: Duration::from_secs(env_parse("OUTBOX_RECLAIM_INTERVAL_SECS", 60)),
            backlog_resync_interval: Duration::from_secs(env_parse(
                "BACKLOG_RESYNC_INTERVAL_SECS",
                30,
            )),
            balance_merge_interval: Duration::from_secs(env_parse(
                "BALANCE_MERGE_INTERVAL_SECS",
                60,
            )),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parse_falls_back_to_default() {
        assert_eq!(env_parse("APP_TEST_UNSET_VARIABLE", 42u32), 42);
    }

    #[test]
    fn missing_database_url_is_an_error() {
        // only run the check when the variable is genuinely absent
        if std::env::var("DATABASE_URL").is_err() {
            assert!(Config::from_env().is_err());
        }
    }
}
