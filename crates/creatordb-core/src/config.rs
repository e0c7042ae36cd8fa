use std::env::VarError;
use std::str::FromStr;

use crate::app_config::{AppConfig, Environment, HarvesterSettings};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Load only the harvester settings (no `DATABASE_URL` needed).
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_harvester_settings() -> Result<HarvesterSettings, ConfigError> {
    dotenvy::dotenv().ok();
    let lookup = |key: &str| std::env::var(key);
    build_harvester_settings(&lookup)
}

/// Typed env reader over an arbitrary lookup function, so parsing can be
/// tested against a plain map.
struct EnvReader<'a, F> {
    lookup: &'a F,
}

impl<F> EnvReader<'_, F>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    fn require(&self, var: &str) -> Result<String, ConfigError> {
        (self.lookup)(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    }

    fn optional(&self, var: &str) -> Option<String> {
        (self.lookup)(var).ok().filter(|v| !v.trim().is_empty())
    }

    fn or_default(&self, var: &str, default: &str) -> String {
        self.optional(var).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, var: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(var) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar {
                    var: var.to_string(),
                    reason: e.to_string(),
                }),
        }
    }

    fn parse_bool(&self, var: &str, default: bool) -> Result<bool, ConfigError> {
        match self.optional(var) {
            None => Ok(default),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                other => Err(ConfigError::InvalidEnvVar {
                    var: var.to_string(),
                    reason: format!("expected a boolean, got \"{other}\""),
                }),
            },
        }
    }
}

fn build_harvester_settings<F>(lookup: &F) -> Result<HarvesterSettings, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let env = EnvReader { lookup };
    let defaults = HarvesterSettings::default();

    let max_pages = env.parse("CREATORDB_HARVEST_MAX_PAGES", defaults.max_pages)?;
    if max_pages == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "CREATORDB_HARVEST_MAX_PAGES".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    Ok(HarvesterSettings {
        request_timeout_secs: env.parse(
            "CREATORDB_HARVEST_REQUEST_TIMEOUT_SECS",
            defaults.request_timeout_secs,
        )?,
        user_agent: env.or_default("CREATORDB_HARVEST_USER_AGENT", &defaults.user_agent),
        max_pages,
        max_items: env.parse("CREATORDB_HARVEST_MAX_ITEMS", defaults.max_items)?,
        page_delay_ms: env.parse("CREATORDB_HARVEST_PAGE_DELAY_MS", defaults.page_delay_ms)?,
        deadline_secs: env.parse("CREATORDB_HARVEST_DEADLINE_SECS", defaults.deadline_secs)?,
        max_depth: env.parse("CREATORDB_HARVEST_MAX_DEPTH", defaults.max_depth)?,
        max_concurrent_accounts: env.parse(
            "CREATORDB_HARVEST_MAX_CONCURRENT_ACCOUNTS",
            defaults.max_concurrent_accounts,
        )?,
        safe_merge_enabled: env
            .parse_bool("CREATORDB_SAFE_MERGE_ENABLED", defaults.safe_merge_enabled)?,
        safe_merge_threshold: env.parse(
            "CREATORDB_SAFE_MERGE_THRESHOLD",
            defaults.safe_merge_threshold,
        )?,
        media_dir: env.optional("CREATORDB_MEDIA_DIR").map(Into::into),
        media_base_url: env.or_default("CREATORDB_MEDIA_BASE_URL", &defaults.media_base_url),
        instagram_base_url: env
            .or_default("CREATORDB_INSTAGRAM_BASE_URL", &defaults.instagram_base_url),
        tiktok_base_url: env.or_default("CREATORDB_TIKTOK_BASE_URL", &defaults.tiktok_base_url),
        youtube_base_url: env
            .or_default("CREATORDB_YOUTUBE_BASE_URL", &defaults.youtube_base_url),
    })
}

/// Build application configuration using the provided env-var lookup function.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let env = EnvReader { lookup: &lookup };

    let database_url = env.require("DATABASE_URL")?;
    let environment = parse_environment(&env.or_default("CREATORDB_ENV", "development"))?;
    let bind_addr: SocketAddr = env.parse(
        "CREATORDB_BIND_ADDR",
        SocketAddr::from(([0, 0, 0, 0], 3000)),
    )?;
    let log_level = env.or_default("CREATORDB_LOG_LEVEL", "info");
    let accounts_path = PathBuf::from(
        env.or_default("CREATORDB_ACCOUNTS_PATH", "./config/accounts.yaml"),
    );

    let db_max_connections = env.parse("CREATORDB_DB_MAX_CONNECTIONS", 10_u32)?;
    let db_min_connections = env.parse("CREATORDB_DB_MIN_CONNECTIONS", 1_u32)?;
    let db_acquire_timeout_secs = env.parse("CREATORDB_DB_ACQUIRE_TIMEOUT_SECS", 10_u64)?;

    let harvester = build_harvester_settings(&lookup)?;

    Ok(AppConfig {
        database_url,
        env: environment,
        bind_addr,
        log_level,
        accounts_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        harvester,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for anything other than the three
/// known environment names.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "production" => Ok(Environment::Production),
        "test" => Ok(Environment::Test),
        other => Err(ConfigError::InvalidEnvVar {
            var: "CREATORDB_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
