use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::audit::record_audit;
use crate::auth::AuthUser;
use crate::shared::enums::{InteractionChannel, Stage};
use crate::shared::error::http;
use crate::shared::schema::{opportunities, opportunity_interactions};
use crate::shared::state::AppState;

pub mod goals;
pub mod services;

use services::{follow_up_health, FollowUpHealth, DEFAULT_STALL_DAYS};

#[derive(Debug, Clone, Serialize, Queryable, Insertable)]
#[diesel(table_name = opportunities)]
pub struct OpportunityRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub client_id: Uuid,
    pub salesperson_id: Uuid,
    pub title: String,
    pub stage: String,
    pub estimated_value: BigDecimal,
    pub description: String,
    pub next_action: String,
    pub follow_up_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Queryable, Insertable)]
#[diesel(table_name = opportunity_interactions)]
pub struct InteractionRow {
    pub id: Uuid,
    pub opportunity_id: Uuid,
    pub channel: String,
    pub note: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// An opportunity plus where it stands against its planned follow-up.
#[derive(Debug, Serialize)]
pub struct OpportunityView {
    #[serde(flatten)]
    pub opportunity: OpportunityRow,
    pub follow_up_status: FollowUpHealth,
}

fn view(opportunity: OpportunityRow, today: NaiveDate) -> OpportunityView {
    let follow_up_status = follow_up_health(opportunity.follow_up_on, today);
    OpportunityView {
        opportunity,
        follow_up_status,
    }
}

fn views(rows: Vec<OpportunityRow>) -> Vec<OpportunityView> {
    let today = Utc::now().date_naive();
    rows.into_iter().map(|row| view(row, today)).collect()
}

#[derive(Debug, Deserialize)]
pub struct CreateOpportunityRequest {
    pub client_id: Uuid,
    pub title: String,
    pub estimated_value: Option<BigDecimal>,
    pub description: Option<String>,
    pub next_action: Option<String>,
    pub follow_up_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub stage: Option<Stage>,
    pub client_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct FollowUpRequest {
    pub next_action: Option<String>,
    pub follow_up_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct InteractionRequest {
    pub channel: InteractionChannel,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StallQuery {
    pub stall_days: Option<i64>,
}

pub async fn create_opportunity(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Json(req): Json<CreateOpportunityRequest>,
) -> Result<Json<OpportunityView>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let row = services::create_opportunity(
        &mut conn,
        &user,
        services::OpportunityInput {
            client_id: req.client_id,
            title: req.title,
            estimated_value: req.estimated_value.unwrap_or_else(|| BigDecimal::from(0)),
            description: req.description.unwrap_or_default(),
            next_action: req.next_action.unwrap_or_default(),
            follow_up_on: req.follow_up_on,
        },
    )
    .map_err(http)?;

    record_audit(
        &mut conn,
        Some(&user),
        &headers,
        "opportunity.create",
        &format!("id={} title='{}'", row.id, row.title),
    );
    Ok(Json(view(row, Utc::now().date_naive())))
}

pub async fn list_opportunities(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<OpportunityView>>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    services::list_opportunities(
        &mut conn,
        &user,
        query.stage,
        query.client_id,
        query.limit.unwrap_or(50),
        query.offset.unwrap_or(0),
    )
    .map(|rows| Json(views(rows)))
    .map_err(http)
}

pub async fn get_opportunity(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<OpportunityView>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    services::get_opportunity(&mut conn, &user, id)
        .map(|row| Json(view(row, Utc::now().date_naive())))
        .map_err(http)
}

pub async fn advance_opportunity(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<OpportunityView>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let row = services::advance(&mut conn, &user, id).map_err(http)?;
    record_audit(
        &mut conn,
        Some(&user),
        &headers,
        "opportunity.advance",
        &format!("id={id} stage={}", row.stage),
    );
    Ok(Json(view(row, Utc::now().date_naive())))
}

pub async fn lose_opportunity(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<OpportunityView>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let row = services::mark_lost(&mut conn, &user, id).map_err(http)?;
    record_audit(
        &mut conn,
        Some(&user),
        &headers,
        "opportunity.lose",
        &format!("id={id}"),
    );
    Ok(Json(view(row, Utc::now().date_naive())))
}

pub async fn set_follow_up(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<FollowUpRequest>,
) -> Result<Json<OpportunityView>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    services::set_follow_up(
        &mut conn,
        &user,
        id,
        req.next_action.unwrap_or_default(),
        req.follow_up_on,
    )
    .map(|row| Json(view(row, Utc::now().date_naive())))
    .map_err(http)
}

pub async fn add_interaction(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<InteractionRequest>,
) -> Result<Json<InteractionRow>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    services::add_interaction(&mut conn, &user, id, req.channel, req.note.unwrap_or_default())
        .map(Json)
        .map_err(http)
}

pub async fn list_interactions(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<InteractionRow>>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    services::interactions_for(&mut conn, &user, id)
        .map(Json)
        .map_err(http)
}

pub async fn list_overdue(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<OpportunityView>>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    services::overdue(&mut conn, &user)
        .map(|rows| Json(views(rows)))
        .map_err(http)
}

pub async fn list_stalled(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<StallQuery>,
) -> Result<Json<Vec<OpportunityView>>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    services::stalled(&mut conn, &user, query.stall_days.unwrap_or(DEFAULT_STALL_DAYS))
        .map(|rows| Json(views(rows)))
        .map_err(http)
}

pub async fn pipeline_stats(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<StallQuery>,
) -> Result<Json<services::PipelineStats>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    services::pipeline_stats(&mut conn, &user, query.stall_days.unwrap_or(DEFAULT_STALL_DAYS))
        .map(Json)
        .map_err(http)
}

pub fn configure_opportunity_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/opportunities",
            get(list_opportunities).post(create_opportunity),
        )
        .route("/api/opportunities/overdue", get(list_overdue))
        .route("/api/opportunities/stalled", get(list_stalled))
        .route("/api/opportunities/stats", get(pipeline_stats))
        .route("/api/opportunities/:id", get(get_opportunity))
        .route("/api/opportunities/:id/advance", post(advance_opportunity))
        .route("/api/opportunities/:id/lose", post(lose_opportunity))
        .route("/api/opportunities/:id/follow-up", post(set_follow_up))
        .route(
            "/api/opportunities/:id/interactions",
            get(list_interactions).post(add_interaction),
        )
}

#[cfg(test)]
#[path = "opportunities.test.rs"]
mod tests;
