use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::audit::record_audit;
use crate::auth::AuthUser;
use crate::clients::ClientRow;
use crate::shared::enums::{ClientKind, InteractionChannel};
use crate::shared::error::http;
use crate::shared::schema::portfolio_contacts;
use crate::shared::state::AppState;

pub mod semaphore;
pub mod services;

use semaphore::{classify, days_without_contact, parse_semaphore, Semaphore};

#[derive(Debug, Clone, Serialize, Queryable, Insertable)]
#[diesel(table_name = portfolio_contacts)]
pub struct PortfolioContactRow {
    pub id: Uuid,
    pub client_id: Uuid,
    pub recorded_by: Uuid,
    pub channel: String,
    pub note: String,
    pub next_action_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// A queue entry: the client plus its computed staleness band.
#[derive(Debug, Serialize)]
pub struct QueueEntry {
    #[serde(flatten)]
    pub client: ClientRow,
    pub semaphore: Semaphore,
    pub days_without_contact: Option<i64>,
}

fn queue_entry(client: ClientRow, today: NaiveDate) -> QueueEntry {
    let semaphore = classify(client.last_contact_at, today);
    let days = days_without_contact(client.last_contact_at, today);
    QueueEntry {
        client,
        semaphore,
        days_without_contact: days,
    }
}

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    pub name: Option<String>,
    pub kind: Option<ClientKind>,
    pub semaphore: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterContactRequest {
    pub channel: InteractionChannel,
    pub note: Option<String>,
    pub next_action_on: Option<NaiveDate>,
}

pub async fn list_queue(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<QueueQuery>,
) -> Result<Json<Vec<QueueEntry>>, (StatusCode, String)> {
    let band = match query.semaphore.as_deref() {
        None | Some("") => None,
        Some(s) => Some(parse_semaphore(s).ok_or((
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("unknown semaphore band: {s}"),
        ))?),
    };

    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let clients = services::list_queue(
        &mut conn,
        &user,
        query.name.as_deref(),
        query.kind,
        band,
        query.limit.unwrap_or(50),
        query.offset.unwrap_or(0),
    )
    .map_err(http)?;

    let today = Utc::now().date_naive();
    Ok(Json(
        clients.into_iter().map(|c| queue_entry(c, today)).collect(),
    ))
}

#[derive(Debug, Serialize)]
pub struct PortfolioClientDetail {
    #[serde(flatten)]
    pub entry: QueueEntry,
    pub contacts: Vec<PortfolioContactRow>,
}

pub async fn get_portfolio_client(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PortfolioClientDetail>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let client = services::get_portfolio_client(&mut conn, &user, id).map_err(http)?;
    let contacts = services::contact_history(&mut conn, &user, id).map_err(http)?;

    Ok(Json(PortfolioClientDetail {
        entry: queue_entry(client, Utc::now().date_naive()),
        contacts,
    }))
}

pub async fn register_contact(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<RegisterContactRequest>,
) -> Result<Json<PortfolioContactRow>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let contact = services::register_contact(
        &mut conn,
        &user,
        id,
        services::PortfolioContactInput {
            channel: req.channel,
            note: req.note.unwrap_or_default(),
            next_action_on: req.next_action_on,
        },
    )
    .map_err(http)?;

    record_audit(
        &mut conn,
        Some(&user),
        &headers,
        "portfolio.contact",
        &format!("client_id={id} channel={}", contact.channel),
    );
    Ok(Json(contact))
}

pub async fn list_contacts(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PortfolioContactRow>>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    services::contact_history(&mut conn, &user, id)
        .map(Json)
        .map_err(http)
}

pub async fn portfolio_dashboard(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<services::PortfolioDashboard>, (StatusCode, String)> {
    if !user.is_manager_or_admin() {
        return Err((
            StatusCode::FORBIDDEN,
            "the portfolio dashboard is reserved for managers".to_string(),
        ));
    }

    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    services::portfolio_dashboard(&mut conn, &user)
        .map(Json)
        .map_err(http)
}

pub fn configure_portfolio_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/portfolio", get(list_queue))
        .route("/api/portfolio/dashboard", get(portfolio_dashboard))
        .route("/api/portfolio/:id", get(get_portfolio_client))
        .route(
            "/api/portfolio/:id/contacts",
            get(list_contacts).post(register_contact),
        )
}

#[cfg(test)]
#[path = "portfolio.test.rs"]
mod tests;
