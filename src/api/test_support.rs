use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use chrono::Utc;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower::ServiceExt;

use crate::api::auth::hash_password;
use crate::api::server::{AppState, router};
use crate::config::Config;
use crate::db::models::{Role, User};
use crate::db::{repo, seed, test_pool};

/// An in-memory server seeded with the district's reference data.
pub struct TestApp {
    pub app: Router,
    pub db: SqlitePool,
    pub tuni_id: String,
    pub kakinada_id: String,
}

impl TestApp {
    pub async fn new() -> Self {
        let pool = test_pool().await;
        seed::seed_reference_data(&pool).await.unwrap();

        let tuni_id = repo::get_committee_by_code(&pool, "TUNI").await.unwrap().unwrap().id;
        let kakinada_id = repo::get_committee_by_code(&pool, "KKD").await.unwrap().unwrap().id;

        let state = Arc::new(AppState {
            db: pool.clone(),
            config: Config::for_tests(),
        });

        TestApp {
            app: router(state),
            db: pool,
            tuni_id,
            kakinada_id,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    /// GET returning the Content-Disposition header and the raw body text.
    pub async fn raw_get(&self, path: &str, token: &str) -> (StatusCode, String, String) {
        let request = Request::builder()
            .uri(path)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, disposition, String::from_utf8(bytes.to_vec()).unwrap())
    }

    /// Creates a user with password "password123" and returns their token.
    /// JD accounts cannot self-register, so they go straight to the database.
    pub async fn login_as(&self, username: &str, role: &str, committee: Option<&str>) -> String {
        if role.parse::<Role>().is_ok_and(|r| r.is_district_wide()) {
            let jd = User {
                id: repo::new_id(),
                username: username.to_string(),
                full_name: username.to_string(),
                email: None,
                role: Role::Jd,
                committee: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            let hash = hash_password("password123").unwrap();
            repo::insert_user(&self.db, &jd, &hash).await.unwrap();
        } else {
            let (status, _) = self
                .request(
                    Method::POST,
                    "/api/auth/register",
                    None,
                    Some(json!({
                        "username": username,
                        "full_name": username,
                        "role": role,
                        "committee": committee,
                        "password": "password123",
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "register {username}");
        }

        let (status, body) = self
            .request(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "username": username, "password": "password123" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login {username}");
        body["token"].as_str().unwrap().to_string()
    }
}

/// An office-collected market-fee receipt for a bag of rice.
pub fn receipt_body(book: &str, number: &str, date: &str, committee_id: Option<&str>) -> Value {
    json!({
        "committee_id": committee_id,
        "date": date,
        "book_number": book,
        "receipt_number": number,
        "trader_name": "Trader",
        "trader_address": "Main Road",
        "payee_name": "Payee",
        "payee_address": "Market Yard",
        "commodity": "Rice",
        "quantity": 10.0,
        "unit": "Quintals",
        "value": 1000.0,
        "fees_paid": 10.0,
        "nature_of_receipt": "mf",
        "collection_location": "office",
        "collected_by": "supervisor_1",
        "generated_by": "deo",
        "designation": "DEO",
    })
}
