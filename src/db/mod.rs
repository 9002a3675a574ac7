pub mod models;
pub mod repo;
pub mod seed;

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use tracing::info;

use crate::config::Config;

pub async fn connect(config: &Config) -> Result<SqlitePool, sqlx::Error> {
    let mut options = SqlitePoolOptions::new().max_connections(config.effective_max_connections());

    if config.is_in_memory_db() {
        // Dropping the last connection drops the database with it.
        options = options.idle_timeout(None).max_lifetime(None);
    }

    let pool = options.connect(&config.database_url).await?;
    info!(
        "Connected to {} (pool size {})",
        config.database_url,
        config.effective_max_connections()
    );

    repo::create_tables(&pool).await?;

    if config.seed_reference_data {
        seed::seed_reference_data(&pool).await?;
    }

    Ok(pool)
}

#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    connect(&Config::for_tests())
        .await
        .expect("in-memory database")
}
