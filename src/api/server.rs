use axum::{
    Router,
    routing::{delete, get, post, put},
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::{auth, dashboard, jd, receipts, reference, supervisor};
use crate::config::Config;
use crate::db;

pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
}

pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/auth/password", put(auth::change_password))
        .route(
            "/committees",
            get(reference::list_committees).post(reference::create_committee),
        )
        .route(
            "/committees/{id}/checkposts",
            get(reference::list_checkposts).post(reference::create_checkpost),
        )
        .route(
            "/commodities",
            get(reference::list_commodities).post(reference::create_commodity),
        )
        .route(
            "/traders",
            get(reference::list_traders).post(reference::create_trader),
        )
        .route("/traders/{id}", delete(reference::deactivate_trader))
        .route(
            "/receipts",
            get(receipts::list_receipts).post(receipts::create_receipt),
        )
        .route("/receipts/export", get(receipts::export_receipts))
        .route("/receipts/verify", get(receipts::verify_receipt))
        .route(
            "/receipts/stats/{year}/{month}/{committee_id}",
            get(receipts::monthly_stats),
        )
        .route(
            "/receipts/{id}",
            get(receipts::get_receipt)
                .put(receipts::update_receipt)
                .delete(receipts::cancel_receipt),
        )
        .route("/dashboard", get(dashboard::overview))
        .route(
            "/supervisor/summary/{year}/{month}",
            get(supervisor::monthly_summary),
        )
        .route(
            "/supervisor/top-commodities/{year}/{month}",
            get(supervisor::top_commodities),
        )
        .route("/supervisor/traders", get(supervisor::trader_analytics))
        .route(
            "/supervisor/locations/{year}/{month}",
            get(supervisor::collection_locations),
        )
        .route(
            "/jd/district/{district}/{year}/{month}",
            get(jd::district_metrics),
        )
        .route("/jd/users", get(jd::list_users).post(jd::create_user))
        .route("/jd/users/{id}", put(jd::update_user))
        .route("/jd/users/{id}/password", put(jd::reset_password));

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api", api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let pool = db::connect(&config).await?;
    let bind_addr = config.bind_addr.clone();

    let state = Arc::new(AppState { db: pool, config });
    auth::bootstrap_jd(&state).await?;
    let app = router(state);

    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Server running on http://{bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
