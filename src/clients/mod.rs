use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::audit::record_audit;
use crate::auth::AuthUser;
use crate::shared::enums::{ClientKind, ClientStatus};
use crate::shared::error::http;
use crate::shared::schema::clients;
use crate::shared::state::AppState;

pub mod services;

#[derive(Debug, Clone, Serialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = clients)]
pub struct ClientRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub tax_id: String,
    pub phone: String,
    pub email: String,
    pub contact_name: String,
    pub contact_phone: String,
    pub contact_email: String,
    pub kind: String,
    pub status: String,
    pub owner_id: Uuid,
    pub last_contact_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateClientRequest {
    pub name: String,
    pub tax_id: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub kind: Option<ClientKind>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub name: Option<String>,
    pub status: Option<ClientStatus>,
    pub kind: Option<ClientKind>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn create_client(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Json(req): Json<CreateClientRequest>,
) -> Result<Json<ClientRow>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let client = services::create_client(&mut conn, &user, req).map_err(http)?;
    record_audit(
        &mut conn,
        Some(&user),
        &headers,
        "client.create",
        &format!("client_id={}", client.id),
    );
    Ok(Json(client))
}

pub async fn list_clients(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ClientRow>>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    services::list_clients(
        &mut conn,
        &user,
        query.name,
        query.status,
        query.kind,
        query.limit.unwrap_or(50),
        query.offset.unwrap_or(0),
    )
    .map(Json)
    .map_err(http)
}

pub async fn get_client(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ClientRow>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    services::get_client(&mut conn, &user, id).map(Json).map_err(http)
}

pub async fn activate_client(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<ClientRow>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let client = services::activate_client(&mut conn, &user, id).map_err(http)?;
    record_audit(
        &mut conn,
        Some(&user),
        &headers,
        "client.activate",
        &format!("client_id={id}"),
    );
    Ok(Json(client))
}

pub async fn deactivate_client(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<ClientRow>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let client = services::deactivate_client(&mut conn, &user, id).map_err(http)?;
    record_audit(
        &mut conn,
        Some(&user),
        &headers,
        "client.deactivate",
        &format!("client_id={id}"),
    );
    Ok(Json(client))
}

pub fn configure_client_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/clients", get(list_clients).post(create_client))
        .route("/api/clients/:id", get(get_client))
        .route("/api/clients/:id/activate", post(activate_client))
        .route("/api/clients/:id/deactivate", post(deactivate_client))
}

#[cfg(test)]
#[path = "clients.test.rs"]
mod tests;
