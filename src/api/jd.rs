use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::api::auth::{self, AuthUser, NewUserPayload};
use crate::api::server::AppState;
use crate::db::models::{DistrictMetrics, Role, User};
use crate::db::repo;
use crate::domain::period::MonthWindow;
use crate::error::{AppError, AppResult};

pub async fn district_metrics(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    Path((district, year, month)): Path<(String, i32, u32)>,
) -> AppResult<Json<DistrictMetrics>> {
    caller.require_any(&[Role::Jd])?;

    let district = district.trim();
    if district.is_empty() {
        return Err(AppError::bad_request("District is required"));
    }
    let window = MonthWindow::new(year, month)?;

    Ok(Json(repo::district_metrics(&state.db, district, &window).await?))
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
) -> AppResult<Json<Vec<User>>> {
    caller.require_any(&[Role::Jd])?;
    Ok(Json(repo::list_users(&state.db).await?))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    Json(payload): Json<NewUserPayload>,
) -> AppResult<impl IntoResponse> {
    caller.require_any(&[Role::Jd])?;

    let user = auth::create_user(&state, payload, true).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Fields left out of the request keep their current value. An empty
/// `committee` clears the assignment.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserPayload {
    #[serde(default, alias = "fullName")]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub committee: Option<String>,
}

fn apply_update(mut user: User, payload: UpdateUserPayload) -> AppResult<User> {
    if let Some(full_name) = payload.full_name {
        let full_name = full_name.trim();
        if full_name.is_empty() {
            return Err(AppError::bad_request("Full name must not be empty"));
        }
        user.full_name = full_name.to_string();
    }

    if let Some(email) = payload.email {
        let email = email.trim();
        if !auth::is_valid_email(email) {
            return Err(AppError::bad_request("Invalid email address"));
        }
        user.email = Some(email.to_string());
    }

    if let Some(role) = payload.role {
        user.role = role.parse().map_err(|_| AppError::bad_request("Invalid role"))?;
    }

    if let Some(committee) = payload.committee {
        let committee = committee.trim();
        user.committee = (!committee.is_empty()).then(|| committee.to_string());
    }

    Ok(user)
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    Path(user_id): Path<String>,
    Json(payload): Json<UpdateUserPayload>,
) -> AppResult<Json<User>> {
    caller.require_any(&[Role::Jd])?;

    let existing = repo::get_user(&state.db, &user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    let user = apply_update(existing, payload)?;
    auth::validate_assignment(&state, &user).await?;

    if !repo::update_user(&state.db, &user).await? {
        return Err(AppError::not_found("User not found"));
    }
    info!("User {} updated by {}", user.username, caller.0.username);

    let refreshed = repo::get_user(&state.db, &user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(Json(refreshed))
}

#[derive(Deserialize)]
pub struct ResetPasswordPayload {
    pub new_password: String,
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    caller: AuthUser,
    Path(user_id): Path<String>,
    Json(payload): Json<ResetPasswordPayload>,
) -> AppResult<StatusCode> {
    caller.require_any(&[Role::Jd])?;

    if payload.new_password.is_empty() {
        return Err(AppError::bad_request("New password must not be empty"));
    }

    let hash = auth::hash_password(&payload.new_password)?;
    if !repo::set_password_hash(&state.db, &user_id, &hash).await? {
        return Err(AppError::not_found("User not found"));
    }
    info!("Password for user {user_id} reset by {}", caller.0.username);

    Ok(StatusCode::NO_CONTENT)
}
