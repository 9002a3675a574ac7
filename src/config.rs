use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

const DEV_JWT_SECRET: &str = "amc-receipts-development-secret";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
    pub open_registration: bool,
    pub seed_reference_data: bool,
    /// First JD account, created at startup when no JD exists yet. JD
    /// accounts cannot self-register.
    pub bootstrap_jd_username: Option<String>,
    pub bootstrap_jd_password: Option<String>,
}

impl Config {
    pub fn load() -> Self {
        Self {
            bind_addr: try_load("AMC_BIND_ADDR", "0.0.0.0:3000"),
            database_url: try_load("DATABASE_URL", "sqlite://amc_receipts.db?mode=rwc"),
            db_max_connections: try_load("AMC_DB_MAX_CONNECTIONS", "10"),
            jwt_secret: load_jwt_secret(),
            token_ttl_secs: try_load("AMC_TOKEN_TTL_SECS", "3600"),
            open_registration: try_load("AMC_OPEN_REGISTRATION", "true"),
            seed_reference_data: try_load("AMC_SEED_REFERENCE_DATA", "true"),
            bootstrap_jd_username: var("AMC_BOOTSTRAP_JD_USERNAME"),
            bootstrap_jd_password: var("AMC_BOOTSTRAP_JD_PASSWORD"),
        }
    }

    /// In-memory SQLite gives every connection its own database, so the pool
    /// has to stay at a single connection.
    pub fn is_in_memory_db(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }

    pub fn effective_max_connections(&self) -> u32 {
        if self.is_in_memory_db() {
            1
        } else {
            self.db_max_connections.max(1)
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    match raw.parse() {
        Ok(value) => value,
        Err(e) => {
            warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
            parse_default(key, default)
        }
    }
}

fn parse_default<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    match default.parse() {
        Ok(value) => value,
        Err(e) => panic!("Built-in default for {key} does not parse: {e}"),
    }
}

fn load_jwt_secret() -> String {
    match env::var("JWT_SECRET") {
        Ok(secret) if !secret.trim().is_empty() => secret,
        _ if cfg!(debug_assertions) => {
            warn!("JWT_SECRET not set, using the development secret");
            DEV_JWT_SECRET.to_string()
        }
        _ => panic!("JWT_SECRET must be set in release builds"),
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            database_url: "sqlite::memory:".to_string(),
            db_max_connections: 10,
            jwt_secret: "test-secret".to_string(),
            token_ttl_secs: 3600,
            open_registration: true,
            seed_reference_data: false,
            bootstrap_jd_username: None,
            bootstrap_jd_password: None,
        }
    }
}
