use axum::extract::{FromRequestParts, State};
use axum::http::{request::Parts, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::shared::enums::Role;
use crate::shared::schema::{sessions, users};
use crate::shared::state::AppState;

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = users)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Option<String>,
    pub manager_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = sessions)]
pub struct SessionRow {
    pub token: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// The authenticated caller, resolved from the bearer token.
///
/// `role` stays `None` for users whose role column is missing or carries an
/// unknown value; scope resolution treats that as "sees nothing".
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub role: Option<Role>,
    pub company_id: Option<Uuid>,
}

impl AuthUser {
    pub fn from_row(row: &UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username.clone(),
            full_name: row.full_name.clone(),
            role: row.role.as_deref().and_then(|r| Role::from_str(r).ok()),
            company_id: row.company_id,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }

    pub fn is_manager_or_admin(&self) -> bool {
        matches!(self.role, Some(Role::Manager) | Some(Role::Admin))
    }

    /// Writes on leads and clients are a salesperson workflow; admins keep
    /// them for support. Managers get a soft denial with an explanation.
    pub fn may_write_sales_data(&self) -> bool {
        matches!(self.role, Some(Role::Salesperson) | Some(Role::Admin))
    }
}

fn bearer_token(parts: &Parts) -> Option<Uuid> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or((StatusCode::UNAUTHORIZED, "missing bearer token".to_string()))?;

        let mut conn = state
            .conn
            .get()
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

        let row: UserRow = sessions::table
            .inner_join(users::table)
            .filter(sessions::token.eq(token))
            .select(users::all_columns)
            .first(&mut conn)
            .map_err(|_| (StatusCode::UNAUTHORIZED, "invalid session".to_string()))?;

        Ok(AuthUser::from_row(&row))
    }
}

pub fn hash_password(plain: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(plain.as_bytes(), &salt)?
        .to_string())
}

pub fn verify_password(plain: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(plain.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: Uuid,
    pub user: AuthUser,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let row: UserRow = users::table
        .filter(users::username.eq(&req.username))
        .first(&mut conn)
        .map_err(|_| (StatusCode::UNAUTHORIZED, "invalid credentials".to_string()))?;

    if !verify_password(&req.password, &row.password_hash) {
        return Err((StatusCode::UNAUTHORIZED, "invalid credentials".to_string()));
    }

    let session = SessionRow {
        token: Uuid::new_v4(),
        user_id: row.id,
        created_at: Utc::now(),
    };
    diesel::insert_into(sessions::table)
        .values(&session)
        .execute(&mut conn)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Insert error: {e}")))?;

    log::info!("login username={}", row.username);

    Ok(Json(LoginResponse {
        token: session.token,
        user: AuthUser::from_row(&row),
    }))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    parts: axum::http::HeaderMap,
) -> Result<StatusCode, (StatusCode, String)> {
    let token = parts
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .ok_or((StatusCode::UNAUTHORIZED, "missing bearer token".to_string()))?;

    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    diesel::delete(sessions::table.filter(sessions::token.eq(token)))
        .execute(&mut conn)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Delete error: {e}")))?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(user: AuthUser) -> Json<AuthUser> {
    Json(user)
}

pub fn configure_auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}

#[cfg(test)]
#[path = "auth.test.rs"]
mod tests;
