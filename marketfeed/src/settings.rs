//! Process-wide settings read from the §6 environment contract at
//! composition time, mirroring the teacher's `BorsaConfig`/`QuotaConfig`
//! pattern of parsing once into a typed struct rather than calling
//! `env::var` throughout the codebase.

use std::time::Duration;

use marketfeed_types::PlatformConfig;
use thiserror::Error;

/// Failure parsing the environment contract.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A required variable was not set.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    /// A variable was set but could not be parsed into its expected type.
    #[error("invalid value for {name}: {value}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// The value that failed to parse.
        value: String,
    },
}

/// Parsed form of the spec.md §6 environment contract.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Whether the Tushare adapter is constructed at all.
    pub tushare_enabled: bool,
    /// Tushare Pro API token; required when `tushare_enabled`.
    pub tushare_token: Option<String>,
    pub mongo_uri: String,
    pub mongo_db: String,
    pub redis_url: String,
    pub redis_max_connections: u32,
    pub mongo_min_connections: u32,
    pub mongo_max_connections: u32,
    pub mongo_connect_timeout: Duration,
    pub mongo_socket_timeout: Duration,
    /// Directory the Task Orchestrator scans for `*.md` report fragments
    /// when assembling a result from history (spec.md §4.7).
    pub results_dir: String,
    /// TTL applied to the Cache Layer's HK/US report blobs.
    pub us_data_cache: Duration,
    /// The rest of the runtime knobs, shared with the ingestion/quote/queue
    /// subsystems.
    pub platform: PlatformConfig,
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, SettingsError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SettingsError::Invalid { name, value: raw.to_string() }),
    }
}

fn parse_u64(name: &'static str, raw: &str) -> Result<u64, SettingsError> {
    raw.trim().parse().map_err(|_| SettingsError::Invalid { name, value: raw.to_string() })
}

fn parse_u32(name: &'static str, raw: &str) -> Result<u32, SettingsError> {
    raw.trim().parse().map_err(|_| SettingsError::Invalid { name, value: raw.to_string() })
}

fn env_or(name: &'static str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_bool_or(name: &'static str, default: bool) -> Result<bool, SettingsError> {
    match std::env::var(name) {
        Ok(v) => parse_bool(name, &v),
        Err(_) => Ok(default),
    }
}

fn env_u64_secs_or(name: &'static str, default_secs: u64) -> Result<Duration, SettingsError> {
    match std::env::var(name) {
        Ok(v) => Ok(Duration::from_secs(parse_u64(name, &v)?)),
        Err(_) => Ok(Duration::from_secs(default_secs)),
    }
}

impl Settings {
    /// Parse the environment contract, applying spec.md §6/§8 defaults for
    /// anything unset.
    pub fn from_env() -> Result<Self, SettingsError> {
        let tushare_enabled = env_bool_or("TUSHARE_ENABLED", false)?;
        let tushare_token = std::env::var("TUSHARE_TOKEN").ok();
        if tushare_enabled && tushare_token.is_none() {
            return Err(SettingsError::Missing("TUSHARE_TOKEN"));
        }

        let mongo_uri = std::env::var("MONGO_URI").map_err(|_| SettingsError::Missing("MONGO_URI"))?;
        let mongo_db = std::env::var("MONGO_DB").map_err(|_| SettingsError::Missing("MONGO_DB"))?;
        let redis_url = std::env::var("REDIS_URL").map_err(|_| SettingsError::Missing("REDIS_URL"))?;

        let redis_max_connections = match std::env::var("REDIS_MAX_CONNECTIONS") {
            Ok(v) => parse_u32("REDIS_MAX_CONNECTIONS", &v)?,
            Err(_) => 20,
        };
        let mongo_min_connections = match std::env::var("MONGO_MIN_CONNECTIONS") {
            Ok(v) => parse_u32("MONGO_MIN_CONNECTIONS", &v)?,
            Err(_) => 1,
        };
        let mongo_max_connections = match std::env::var("MONGO_MAX_CONNECTIONS") {
            Ok(v) => parse_u32("MONGO_MAX_CONNECTIONS", &v)?,
            Err(_) => 20,
        };
        let mongo_connect_timeout = match std::env::var("MONGO_CONNECT_TIMEOUT_MS") {
            Ok(v) => Duration::from_millis(parse_u64("MONGO_CONNECT_TIMEOUT_MS", &v)?),
            Err(_) => Duration::from_millis(10_000),
        };
        let mongo_socket_timeout = match std::env::var("MONGO_SOCKET_TIMEOUT_MS") {
            Ok(v) => Duration::from_millis(parse_u64("MONGO_SOCKET_TIMEOUT_MS", &v)?),
            Err(_) => Duration::from_millis(30_000),
        };

        let mut platform = PlatformConfig::default();
        platform.quotes_ingest_interval = env_u64_secs_or("QUOTES_INGEST_INTERVAL_SECONDS", platform.quotes_ingest_interval.as_secs())?;
        platform.quotes_rotation_enabled = env_bool_or("QUOTES_ROTATION_ENABLED", platform.quotes_rotation_enabled)?;
        platform.quotes_backfill_on_offhours = env_bool_or("QUOTES_BACKFILL_ON_OFFHOURS", platform.quotes_backfill_on_offhours)?;
        platform.quotes_auto_detect_tushare_permission =
            env_bool_or("QUOTES_AUTO_DETECT_TUSHARE_PERMISSION", platform.quotes_auto_detect_tushare_permission)?;
        platform.timezone = env_or("TIMEZONE", &platform.timezone);

        let results_dir = env_or("TRADINGAGENTS_RESULTS_DIR", "./results");
        let us_data_cache = match std::env::var("US_DATA_CACHE_HOURS") {
            Ok(v) => Duration::from_secs(parse_u64("US_DATA_CACHE_HOURS", &v)? * 3600),
            Err(_) => Duration::from_secs(6 * 3600),
        };

        Ok(Self {
            tushare_enabled,
            tushare_token,
            mongo_uri,
            mongo_db,
            redis_url,
            redis_max_connections,
            mongo_min_connections,
            mongo_max_connections,
            mongo_connect_timeout,
            mongo_socket_timeout,
            results_dir,
            us_data_cache,
            platform,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("X", "true").unwrap(), true);
        assert_eq!(parse_bool("X", "0").unwrap(), false);
        assert_eq!(parse_bool("X", "YES").unwrap(), true);
        assert!(parse_bool("X", "maybe").is_err());
    }
}
