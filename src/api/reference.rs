use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::api::auth::AuthUser;
use crate::api::server::AppState;
use crate::db::models::{Checkpost, Committee, Commodity, Role, Trader};
use crate::db::repo;
use crate::domain::access;
use crate::error::{AppError, AppResult};

fn required(field: &str, value: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::bad_request(format!("{field} is required")));
    }
    Ok(value.to_string())
}

/// Maps a unique-constraint failure to 409 with the given message.
fn conflict_on_unique(message: String) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| {
        if repo::is_unique_violation(&e) {
            AppError::Conflict(message)
        } else {
            AppError::from(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Committees
// ---------------------------------------------------------------------------

pub async fn list_committees(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<Committee>>> {
    let committees = repo::list_committees(&state.db).await?;
    Ok(Json(access::visible_committees(&user, &committees)))
}

#[derive(Deserialize)]
pub struct NewCommittee {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

pub async fn create_committee(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<NewCommittee>,
) -> AppResult<impl IntoResponse> {
    auth.require_any(&[Role::Jd])?;

    let committee = Committee {
        id: repo::new_id(),
        code: required("code", &payload.code)?.to_uppercase(),
        name: required("name", &payload.name)?,
        district: payload.district.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
        state: payload.state.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        created_at: Utc::now(),
    };

    repo::insert_committee(&state.db, &committee)
        .await
        .map_err(conflict_on_unique(format!(
            "Committee code {} already exists",
            committee.code
        )))?;
    info!("Committee {} ({}) created by {}", committee.name, committee.code, auth.0.username);

    Ok((StatusCode::CREATED, Json(committee)))
}

pub async fn list_checkposts(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(committee_id): Path<String>,
) -> AppResult<Json<Vec<Checkpost>>> {
    let committees = repo::list_committees(&state.db).await?;
    if !access::can_view_committee(&user, &committees, &committee_id) {
        return Err(AppError::not_found("Committee not found"));
    }

    Ok(Json(repo::list_checkposts(&state.db, &committee_id).await?))
}

#[derive(Deserialize)]
pub struct NewCheckpost {
    pub name: String,
}

pub async fn create_checkpost(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(committee_id): Path<String>,
    Json(payload): Json<NewCheckpost>,
) -> AppResult<impl IntoResponse> {
    auth.require_any(&[Role::Jd])?;

    let committees = repo::list_committees(&state.db).await?;
    if !committees.iter().any(|c| c.id == committee_id) {
        return Err(AppError::not_found("Committee not found"));
    }

    let checkpost = Checkpost {
        id: repo::new_id(),
        committee_id,
        name: required("name", &payload.name)?,
    };

    repo::insert_checkpost(&state.db, &checkpost)
        .await
        .map_err(conflict_on_unique(format!(
            "Checkpost {} already exists",
            checkpost.name
        )))?;

    Ok((StatusCode::CREATED, Json(checkpost)))
}

// ---------------------------------------------------------------------------
// Commodities
// ---------------------------------------------------------------------------

pub async fn list_commodities(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
) -> AppResult<Json<Vec<Commodity>>> {
    Ok(Json(repo::list_commodities(&state.db).await?))
}

#[derive(Deserialize)]
pub struct NewCommodity {
    pub name: String,
}

pub async fn create_commodity(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<NewCommodity>,
) -> AppResult<impl IntoResponse> {
    auth.require_any(&[Role::Jd])?;

    let commodity = Commodity {
        id: repo::new_id(),
        name: required("name", &payload.name)?,
    };

    repo::insert_commodity(&state.db, &commodity)
        .await
        .map_err(conflict_on_unique(format!(
            "Commodity {} already exists",
            commodity.name
        )))?;

    Ok((StatusCode::CREATED, Json(commodity)))
}

// ---------------------------------------------------------------------------
// Traders
// ---------------------------------------------------------------------------

pub async fn list_traders(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
) -> AppResult<Json<Vec<Trader>>> {
    Ok(Json(repo::list_active_traders(&state.db).await?))
}

#[derive(Deserialize)]
pub struct NewTrader {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub joined_date: Option<NaiveDate>,
}

pub async fn create_trader(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<NewTrader>,
) -> AppResult<impl IntoResponse> {
    auth.require_any(&[Role::Supervisor, Role::Jd])?;

    let trader = Trader {
        id: repo::new_id(),
        name: required("name", &payload.name)?,
        address: payload.address.trim().to_string(),
        joined_date: payload.joined_date.unwrap_or_else(repo::today),
        is_active: true,
    };

    repo::insert_trader(&state.db, &trader).await?;
    info!("Trader {} registered by {}", trader.name, auth.0.username);

    Ok((StatusCode::CREATED, Json(trader)))
}

pub async fn deactivate_trader(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(trader_id): Path<String>,
) -> AppResult<StatusCode> {
    auth.require_any(&[Role::Supervisor, Role::Jd])?;

    if !repo::deactivate_trader(&state.db, &trader_id).await? {
        return Err(AppError::not_found("Trader not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::TestApp;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_committee_listing_is_scoped() {
        let app = TestApp::new().await;
        let deo = app.login_as("deo", "DEO", Some("Tuni AMC")).await;
        let jd = app.login_as("jd", "JD", None).await;

        let (_, mine) = app.request(Method::GET, "/api/committees", Some(&deo), None).await;
        let mine = mine.as_array().unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0]["code"], "TUNI");

        let (_, all) = app.request(Method::GET, "/api/committees", Some(&jd), None).await;
        assert_eq!(all.as_array().unwrap().len(), 15);

        let path = format!("/api/committees/{}/checkposts", app.tuni_id);
        let (status, posts) = app.request(Method::GET, &path, Some(&deo), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(posts.as_array().unwrap().len(), 3);

        let other = format!("/api/committees/{}/checkposts", app.kakinada_id);
        let (status, _) = app.request(Method::GET, &other, Some(&deo), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_reference_writes_are_role_gated() {
        let app = TestApp::new().await;
        let deo = app.login_as("deo", "DEO", Some("Tuni AMC")).await;
        let sup = app.login_as("sup", "Supervisor", Some("Tuni AMC")).await;
        let jd = app.login_as("jd", "JD", None).await;

        let body = json!({ "name": "Groundnut" });
        let (status, _) = app.request(Method::POST, "/api/commodities", Some(&deo), Some(body.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = app.request(Method::POST, "/api/commodities", Some(&jd), Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = app.request(Method::POST, "/api/commodities", Some(&jd), Some(json!({ "name": "groundnut" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = app
            .request(Method::POST, "/api/committees", Some(&jd), Some(json!({ "code": "tuni", "name": "Dup" })))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let path = format!("/api/committees/{}/checkposts", app.kakinada_id);
        let (status, created) = app.request(Method::POST, &path, Some(&jd), Some(json!({ "name": "Port Gate" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["committee_id"], app.kakinada_id);

        let trader = json!({ "name": "Sri Lakshmi Traders", "address": "Main Bazar" });
        let (status, _) = app.request(Method::POST, "/api/traders", Some(&deo), Some(trader.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, created) = app.request(Method::POST, "/api/traders", Some(&sup), Some(trader)).await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, traders) = app.request(Method::GET, "/api/traders", Some(&deo), None).await;
        assert_eq!(traders.as_array().unwrap().len(), 1);

        let path = format!("/api/traders/{}", created["id"].as_str().unwrap());
        let (status, _) = app.request(Method::DELETE, &path, Some(&sup), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = app.request(Method::DELETE, &path, Some(&sup), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, traders) = app.request(Method::GET, "/api/traders", Some(&deo), None).await;
        assert!(traders.as_array().unwrap().is_empty());
    }
}
