use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use crate::api::auth::AuthUser;
use crate::api::server::AppState;
use crate::db::models::Receipt;
use crate::db::repo;
use crate::domain::access;
use crate::domain::analytics::{self, DashboardStats};
use crate::domain::filters;
use crate::error::AppResult;

const RECENT_RECEIPTS: usize = 5;

#[derive(Serialize)]
pub struct Overview {
    pub title: &'static str,
    pub description: &'static str,
    pub stats: DashboardStats,
    pub commodities: Vec<String>,
    pub recent: Vec<Receipt>,
}

pub async fn overview(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Overview>> {
    let committees = repo::list_committees(&state.db).await?;
    let receipts = repo::list_receipts(&state.db).await?;
    let visible = access::visible_receipts(&user, &committees, receipts);

    let stats = analytics::dashboard_stats(&visible, repo::today());
    let commodities = filters::distinct_commodities(&visible);
    // Newest first already.
    let recent = visible
        .into_iter()
        .filter(Receipt::is_active)
        .take(RECENT_RECEIPTS)
        .collect();

    Ok(Json(Overview {
        title: analytics::receipt_list_title(user.role),
        description: analytics::receipt_list_description(user.role),
        stats,
        commodities,
        recent,
    }))
}
