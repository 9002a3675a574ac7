pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;

use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load();

    if let Err(e) = api::server::start_server(config).await {
        error!("Server error: {e}");
        std::process::exit(1);
    }
}
