use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::audit::record_audit;
use crate::auth::AuthUser;
use crate::shared::enums::{ContactOutcome, LeadChannel, LeadStatus};
use crate::shared::error::http;
use crate::shared::schema::{follow_ups, lead_contacts, leads};
use crate::shared::state::AppState;

pub mod dashboard;
pub mod services;

#[derive(Debug, Clone, Serialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = leads)]
pub struct LeadRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub company_name: String,
    pub phone: String,
    pub whatsapp: String,
    pub email: String,
    pub origin: String,
    pub product_interest: String,
    pub status: String,
    pub notes: String,
    pub owner_id: Option<Uuid>,
    pub converted_at: Option<DateTime<Utc>>,
    pub converted_client_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Queryable, Insertable)]
#[diesel(table_name = lead_contacts)]
pub struct LeadContactRow {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub channel: String,
    pub outcome: String,
    pub note: String,
    pub contacted_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Queryable, Insertable)]
#[diesel(table_name = follow_ups)]
pub struct FollowUpRow {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub due_on: NaiveDate,
    pub description: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateLeadRequest {
    pub name: String,
    pub company_name: Option<String>,
    pub phone: String,
    pub whatsapp: Option<String>,
    pub email: Option<String>,
    pub origin: String,
    pub product_interest: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLeadRequest {
    pub name: Option<String>,
    pub company_name: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub email: Option<String>,
    pub origin: Option<String>,
    pub product_interest: Option<String>,
    pub notes: Option<String>,
    pub status: Option<LeadStatus>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterContactRequest {
    pub channel: LeadChannel,
    pub outcome: ContactOutcome,
    pub note: Option<String>,
    pub next_contact: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub name: Option<String>,
    pub status: Option<LeadStatus>,
    pub origin: Option<String>,
    pub created_from: Option<NaiveDate>,
    pub created_to: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LeadDetail {
    pub lead: LeadRow,
    pub contacts: Vec<LeadContactRow>,
    pub pending_follow_ups: Vec<FollowUpRow>,
}

#[derive(Debug, Serialize)]
pub struct DueFollowUp {
    pub follow_up: FollowUpRow,
    pub lead_name: String,
    pub lead_status: String,
}

pub async fn create_lead(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Json(req): Json<CreateLeadRequest>,
) -> Result<Json<LeadRow>, (StatusCode, String)> {
    if !user.may_write_sales_data() {
        return Err((
            StatusCode::FORBIDDEN,
            "lead registration is reserved for salespeople".to_string(),
        ));
    }
    let company_id = user.company_id.ok_or((
        StatusCode::UNPROCESSABLE_ENTITY,
        "user has no company assigned".to_string(),
    ))?;

    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let now = Utc::now();
    let lead = LeadRow {
        id: Uuid::new_v4(),
        company_id,
        name: req.name,
        company_name: req.company_name.unwrap_or_default(),
        phone: req.phone,
        whatsapp: req.whatsapp.unwrap_or_default(),
        email: req.email.unwrap_or_default(),
        origin: req.origin,
        product_interest: req.product_interest.unwrap_or_default(),
        status: LeadStatus::New.as_str().to_string(),
        notes: req.notes.unwrap_or_default(),
        owner_id: Some(user.id),
        converted_at: None,
        converted_client_id: None,
        created_at: now,
        updated_at: now,
    };

    diesel::insert_into(leads::table)
        .values(&lead)
        .execute(&mut conn)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Insert error: {e}")))?;

    record_audit(
        &mut conn,
        Some(&user),
        &headers,
        "lead.create",
        &format!("lead_id={}", lead.id),
    );
    Ok(Json(lead))
}

pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<LeadRow>>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    services::list_leads(
        &mut conn,
        &user,
        services::LeadFilters {
            name: query.name,
            status: query.status,
            origin: query.origin,
            created_from: query.created_from,
            created_to: query.created_to,
        },
        query.limit.unwrap_or(50),
        query.offset.unwrap_or(0),
    )
    .map(Json)
    .map_err(http)
}

pub async fn get_lead(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<LeadDetail>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let lead = services::get_lead(&mut conn, &user, id).map_err(http)?;
    let contacts = services::lead_contacts_for(&mut conn, &user, id).map_err(http)?;
    let pending_follow_ups =
        services::pending_follow_ups_for(&mut conn, &user, id).map_err(http)?;

    Ok(Json(LeadDetail {
        lead,
        contacts,
        pending_follow_ups,
    }))
}

/// Changed columns batched into one UPDATE; `None` fields are skipped.
#[derive(AsChangeset)]
#[diesel(table_name = leads)]
struct LeadChanges {
    name: Option<String>,
    company_name: Option<String>,
    phone: Option<String>,
    whatsapp: Option<String>,
    email: Option<String>,
    origin: Option<String>,
    product_interest: Option<String>,
    notes: Option<String>,
    status: Option<String>,
    converted_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

pub async fn update_lead(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateLeadRequest>,
) -> Result<Json<LeadRow>, (StatusCode, String)> {
    if !user.may_write_sales_data() {
        return Err((
            StatusCode::FORBIDDEN,
            "lead editing is reserved for salespeople".to_string(),
        ));
    }

    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let before = services::get_lead(&mut conn, &user, id).map_err(http)?;
    let now = Utc::now();
    let already_converted = before.status == LeadStatus::Converted.as_str();
    let converted_at = req
        .status
        .and_then(|status| services::conversion_stamp(status, already_converted, now));

    let changes = LeadChanges {
        name: req.name,
        company_name: req.company_name,
        phone: req.phone,
        whatsapp: req.whatsapp,
        email: req.email,
        origin: req.origin,
        product_interest: req.product_interest,
        notes: req.notes,
        status: req.status.map(|s| s.as_str().to_string()),
        converted_at,
        updated_at: now,
    };

    diesel::update(leads::table.filter(leads::id.eq(id)))
        .set(&changes)
        .execute(&mut conn)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Update error: {e}")))?;

    // An edit that flips the status to converted materializes the client
    // just as a closed-deal contact would.
    if req.status == Some(LeadStatus::Converted) && !already_converted {
        services::convert_lead(&mut conn, &before).map_err(http)?;
    }

    record_audit(
        &mut conn,
        Some(&user),
        &headers,
        "lead.update",
        &format!("lead_id={id}"),
    );

    services::get_lead(&mut conn, &user, id).map(Json).map_err(http)
}

pub async fn delete_lead(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    services::delete_lead(&mut conn, &user, id).map_err(http)?;
    record_audit(
        &mut conn,
        Some(&user),
        &headers,
        "lead.delete",
        &format!("lead_id={id}"),
    );
    Ok(StatusCode::NO_CONTENT)
}

pub async fn register_contact(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<RegisterContactRequest>,
) -> Result<Json<LeadContactRow>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let contact = services::register_contact(
        &mut conn,
        &user,
        id,
        services::ContactInput {
            channel: req.channel,
            outcome: req.outcome,
            note: req.note.unwrap_or_default(),
            next_contact: req.next_contact,
        },
    )
    .map_err(http)?;

    record_audit(
        &mut conn,
        Some(&user),
        &headers,
        "lead.contact",
        &format!("lead_id={id} outcome={}", contact.outcome),
    );
    Ok(Json(contact))
}

pub async fn list_contacts(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<LeadContactRow>>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    services::lead_contacts_for(&mut conn, &user, id)
        .map(Json)
        .map_err(http)
}

/// Pending follow-ups due today or earlier, the salesperson's morning list.
pub async fn follow_ups_due(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<DueFollowUp>>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let due = services::follow_ups_due(&mut conn, &user).map_err(http)?;
    Ok(Json(
        due.into_iter()
            .map(|(follow_up, lead)| DueFollowUp {
                follow_up,
                lead_name: lead.name,
                lead_status: lead.status,
            })
            .collect(),
    ))
}

pub async fn lead_dashboard(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<dashboard::LeadDashboard>, (StatusCode, String)> {
    if !user.is_manager_or_admin() {
        return Err((
            StatusCode::FORBIDDEN,
            "the prospecting dashboard is reserved for managers".to_string(),
        ));
    }

    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    dashboard::lead_dashboard(&mut conn, &user).map(Json).map_err(http)
}

pub fn configure_lead_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/leads", get(list_leads).post(create_lead))
        .route("/api/leads/dashboard", get(lead_dashboard))
        .route(
            "/api/leads/:id",
            get(get_lead).put(update_lead).delete(delete_lead),
        )
        .route(
            "/api/leads/:id/contacts",
            get(list_contacts).post(register_contact),
        )
        .route("/api/followups/due", get(follow_ups_due))
}

#[cfg(test)]
#[path = "leads.test.rs"]
mod tests;
