//! Committee analytics for supervisors. A supervisor always looks at their
//! own committee; JD picks one with `?committee_id=`.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::auth::AuthUser;
use crate::api::server::AppState;
use crate::db::models::{Committee, CommodityVolume, MonthlySummary, Receipt, Role, User};
use crate::db::repo;
use crate::domain::access;
use crate::domain::analytics::{self, LocationBreakdown, TraderMonth, TraderSummary};
use crate::domain::period::MonthWindow;
use crate::error::{AppError, AppResult};

const DEFAULT_TOP_COMMODITIES: i64 = 5;
const MAX_TOP_COMMODITIES: i64 = 50;

async fn scoped_committee(state: &AppState, user: &User, requested: Option<&str>) -> AppResult<Committee> {
    let committees = repo::list_committees(&state.db).await?;

    match user.role {
        Role::Deo => Err(AppError::forbidden(
            "Committee analytics are available to supervisors and JD only",
        )),
        Role::Supervisor => {
            let own = access::resolve_committee(user, &committees)
                .ok_or_else(|| AppError::forbidden("No valid committee is assigned to you"))?;
            if requested.is_some_and(|id| id != own.id) {
                return Err(AppError::forbidden("You do not have access to this committee"));
            }
            Ok(own.clone())
        }
        Role::Jd => {
            let id = requested.ok_or_else(|| AppError::bad_request("committee_id is required"))?;
            committees
                .into_iter()
                .find(|c| c.id == id)
                .ok_or_else(|| AppError::not_found("Committee not found"))
        }
    }
}

async fn committee_receipts(state: &AppState, committee_id: &str) -> AppResult<Vec<Receipt>> {
    let receipts = repo::list_receipts(&state.db).await?;
    Ok(receipts
        .into_iter()
        .filter(|r| r.committee_id == committee_id)
        .collect())
}

#[derive(Debug, Default, Deserialize)]
pub struct ScopeQuery {
    #[serde(default)]
    pub committee_id: Option<String>,
}

#[derive(Serialize)]
pub struct CommitteeSummary {
    pub committee_id: String,
    pub committee_name: String,
    pub year: i32,
    pub month: u32,
    #[serde(flatten)]
    pub summary: MonthlySummary,
}

pub async fn monthly_summary(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((year, month)): Path<(i32, u32)>,
    Query(scope): Query<ScopeQuery>,
) -> AppResult<Json<CommitteeSummary>> {
    let window = MonthWindow::new(year, month)?;
    let committee = scoped_committee(&state, &user, scope.committee_id.as_deref()).await?;
    let summary = repo::monthly_summary(&state.db, &committee.id, &window).await?;

    Ok(Json(CommitteeSummary {
        committee_id: committee.id,
        committee_name: committee.name,
        year,
        month,
        summary,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct TopCommoditiesQuery {
    #[serde(default)]
    pub committee_id: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

pub async fn top_commodities(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((year, month)): Path<(i32, u32)>,
    Query(query): Query<TopCommoditiesQuery>,
) -> AppResult<Json<Vec<CommodityVolume>>> {
    let window = MonthWindow::new(year, month)?;
    let committee = scoped_committee(&state, &user, query.committee_id.as_deref()).await?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_TOP_COMMODITIES)
        .clamp(1, MAX_TOP_COMMODITIES);

    let top = repo::top_commodities(&state.db, &committee.id, &window, limit).await?;
    Ok(Json(top))
}

#[derive(Debug, Default, Deserialize)]
pub struct TraderQuery {
    #[serde(default)]
    pub committee_id: Option<String>,
    /// Substring match on trader name.
    #[serde(default)]
    pub search: Option<String>,
    /// Adds a month-by-month history for this trader.
    #[serde(default)]
    pub trader: Option<String>,
    #[serde(default)]
    pub top: Option<usize>,
}

#[derive(Serialize)]
pub struct TraderAnalytics {
    pub committee_id: String,
    pub traders: Vec<TraderSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly: Option<Vec<TraderMonth>>,
}

pub async fn trader_analytics(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<TraderQuery>,
) -> AppResult<Json<TraderAnalytics>> {
    let committee = scoped_committee(&state, &user, query.committee_id.as_deref()).await?;
    let receipts = committee_receipts(&state, &committee.id).await?;

    let mut traders = analytics::trader_summaries(&receipts);
    if let Some(term) = query.search.as_deref().filter(|t| !t.trim().is_empty()) {
        traders = analytics::search_traders(traders, term);
    }
    if let Some(top) = query.top {
        traders.truncate(top);
    }

    let monthly = query
        .trader
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .map(|name| analytics::trader_monthly(&receipts, name));

    Ok(Json(TraderAnalytics {
        committee_id: committee.id,
        traders,
        monthly,
    }))
}

pub async fn collection_locations(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((year, month)): Path<(i32, u32)>,
    Query(scope): Query<ScopeQuery>,
) -> AppResult<Json<Vec<LocationBreakdown>>> {
    let window = MonthWindow::new(year, month)?;
    let committee = scoped_committee(&state, &user, scope.committee_id.as_deref()).await?;
    let receipts = committee_receipts(&state, &committee.id).await?;

    Ok(Json(analytics::market_fee_locations(&receipts, &window)))
}
