use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::{FromRequestParts, State},
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::IntoResponse,
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};

use crate::api::server::AppState;
use crate::db::models::{Role, User};
use crate::db::repo;
use crate::domain::access;
use crate::error::{AppError, AppResult};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Stored password hash is unreadable: {e}");
            false
        }
    }
}

pub fn issue_token(user: &User, secret: &str, ttl_secs: i64) -> AppResult<String> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user.id.clone(),
        username: user.username.clone(),
        role: user.role,
        iat: now,
        exp: now + ttl_secs,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token signing failed: {e}")))
}

pub fn decode_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))
}

fn bearer_token(parts: &Parts) -> AppResult<&str> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Authorization header missing".into()))?;

    let value = header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Token missing".into()))?;

    match value.trim().split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(AppError::Unauthorized("Token missing".into())),
    }
}

/// The caller, as currently stored. The token only carries identity; role
/// and committee are re-read so administrator edits apply immediately.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn require_any(&self, roles: &[Role]) -> AppResult<()> {
        if roles.contains(&self.0.role) {
            Ok(())
        } else {
            Err(AppError::forbidden(format!(
                "Role {} is not allowed to perform this action",
                self.0.role
            )))
        }
    }
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = decode_token(token, &state.config.jwt_secret)?;

        let user = repo::get_user(&state.db, &claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".into()))?;

        Ok(AuthUser(user))
    }
}

#[derive(Debug, Deserialize)]
pub struct NewUserPayload {
    pub username: String,
    #[serde(default, alias = "fullName")]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub role: String,
    #[serde(default)]
    pub committee: Option<String>,
    #[serde(alias = "plainPassword")]
    pub password: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S+@\S+\.\S+$").expect("Invalid email regex"));

/// Loose shape check: `\S+@\S+\.\S+` over the whole address.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Shared by open registration and JD user management.
pub(crate) async fn create_user(state: &AppState, payload: NewUserPayload, require_email: bool) -> AppResult<User> {
    let username = payload.username.trim().to_string();
    if username.is_empty() || payload.password.is_empty() || payload.role.trim().is_empty() {
        return Err(AppError::bad_request("Missing required fields"));
    }

    let role: Role = payload
        .role
        .parse()
        .map_err(|_| AppError::bad_request("Invalid role"))?;

    let email = non_empty(payload.email);
    match &email {
        Some(e) if !is_valid_email(e) => return Err(AppError::bad_request("Invalid email address")),
        None if require_email => return Err(AppError::bad_request("Missing required fields")),
        _ => {}
    }

    let committee = non_empty(payload.committee);
    let now = Utc::now();
    let user = User {
        id: repo::new_id(),
        full_name: non_empty(payload.full_name).unwrap_or_else(|| username.clone()),
        username,
        email,
        role,
        committee,
        created_at: now,
        updated_at: now,
    };

    validate_assignment(state, &user).await?;

    if repo::get_user_by_username(&state.db, &user.username).await?.is_some() {
        return Err(AppError::Conflict("Username already exists".into()));
    }

    let password_hash = hash_password(&payload.password)?;
    repo::insert_user(&state.db, &user, &password_hash)
        .await
        .map_err(|e| {
            if repo::is_unique_violation(&e) {
                AppError::Conflict("Username already exists".into())
            } else {
                AppError::from(e)
            }
        })?;

    info!("Created {} user {}", user.role, user.username);
    Ok(user)
}

/// Committee-bound roles must point at a committee that actually resolves.
pub(crate) async fn validate_assignment(state: &AppState, user: &User) -> AppResult<()> {
    if user.role.is_district_wide() {
        return Ok(());
    }
    if user.committee.is_none() {
        return Err(AppError::bad_request(format!(
            "Committee is required for role {}",
            user.role
        )));
    }

    let committees = repo::list_committees(&state.db).await?;
    if access::resolve_committee(user, &committees).is_none() {
        return Err(AppError::bad_request(format!(
            "Unknown committee {:?}",
            user.committee.as_deref().unwrap_or_default()
        )));
    }
    Ok(())
}

/// Creates the configured first JD account if the database has no JD yet.
pub async fn bootstrap_jd(state: &AppState) -> AppResult<()> {
    let (Some(username), Some(password)) = (
        state.config.bootstrap_jd_username.as_deref(),
        state.config.bootstrap_jd_password.as_deref(),
    ) else {
        return Ok(());
    };

    let users = repo::list_users(&state.db).await?;
    if users.iter().any(|u| u.role.is_district_wide()) {
        return Ok(());
    }

    let payload = NewUserPayload {
        username: username.to_string(),
        full_name: None,
        email: None,
        role: Role::Jd.to_string(),
        committee: None,
        password: password.to_string(),
    };
    create_user(state, payload, false).await?;
    Ok(())
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub user_id: String,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewUserPayload>,
) -> AppResult<impl IntoResponse> {
    if !state.config.open_registration {
        return Err(AppError::forbidden("Registration is disabled"));
    }
    if payload
        .role
        .parse::<Role>()
        .is_ok_and(|role| role.is_district_wide())
    {
        warn!("Refused self-registration of JD account {}", payload.username);
        return Err(AppError::forbidden(
            "JD accounts can only be created by an existing JD",
        ));
    }

    let user = create_user(&state, payload, false).await?;
    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id: user.id })))
}

#[derive(Deserialize)]
pub struct LoginPayload {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginPayload>,
) -> AppResult<Json<LoginResponse>> {
    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::bad_request("Missing username or password"));
    }

    let invalid = || AppError::Unauthorized("Invalid credentials".into());

    let Some(user) = repo::get_user_by_username(&state.db, payload.username.trim()).await? else {
        warn!("Login attempt for unknown user {}", payload.username);
        return Err(invalid());
    };

    let stored = repo::get_password_hash(&state.db, &user.id).await?;
    if !stored.is_some_and(|hash| verify_password(&payload.password, &hash)) {
        warn!("Failed login for {}", user.username);
        return Err(invalid());
    }

    let token = issue_token(&user, &state.config.jwt_secret, state.config.token_ttl_secs)?;
    info!("{} logged in as {}", user.username, user.role);

    Ok(Json(LoginResponse { token, user }))
}

pub async fn me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

#[derive(Deserialize)]
pub struct ChangePasswordPayload {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(payload): Json<ChangePasswordPayload>,
) -> AppResult<StatusCode> {
    if payload.new_password.is_empty() {
        return Err(AppError::bad_request("New password must not be empty"));
    }

    let stored = repo::get_password_hash(&state.db, &user.id).await?;
    if !stored.is_some_and(|hash| verify_password(&payload.current_password, &hash)) {
        return Err(AppError::Unauthorized("Current password is incorrect".into()));
    }

    let hash = hash_password(&payload.new_password)?;
    repo::set_password_hash(&state.db, &user.id, &hash).await?;
    info!("{} changed their password", user.username);

    Ok(StatusCode::NO_CONTENT)
}
