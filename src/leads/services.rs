use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::clients::ClientRow;
use crate::scope::{self, UserScope};
use crate::shared::enums::{
    ClientKind, ClientStatus, ContactOutcome, FollowUpStatus, LeadChannel, LeadStatus,
};
use crate::shared::error::ServiceError;
use crate::shared::schema::{clients, follow_ups, lead_contacts, leads};

use super::{FollowUpRow, LeadContactRow, LeadRow};

/// Outcome of a contact drives the lead status:
///   no_answer          -> in_contact (an attempt was made)
///   requested_callback -> awaiting   (lead asked to be called later)
///   interested         -> in_contact (negotiation is live)
///   not_interested     -> lost
///   closed_deal        -> converted  (conversion side effect runs)
pub fn status_after(outcome: ContactOutcome) -> LeadStatus {
    match outcome {
        ContactOutcome::NoAnswer => LeadStatus::InContact,
        ContactOutcome::RequestedCallback => LeadStatus::Awaiting,
        ContactOutcome::Interested => LeadStatus::InContact,
        ContactOutcome::NotInterested => LeadStatus::Lost,
        ContactOutcome::ClosedDeal => LeadStatus::Converted,
    }
}

/// Deletion is refused once a lead converted or accumulated history.
pub fn ensure_deletable(status: LeadStatus, contact_count: i64) -> Result<(), ServiceError> {
    if status == LeadStatus::Converted {
        return Err(ServiceError::validation("cannot delete a converted lead"));
    }
    if contact_count > 0 {
        return Err(ServiceError::validation(
            "cannot delete a lead with recorded contacts",
        ));
    }
    Ok(())
}

pub fn follow_up_description(channel: LeadChannel, outcome: ContactOutcome) -> String {
    format!("Callback after: {} - {}", channel.as_str(), outcome.as_str())
}

/// Owner values a scope matches against the nullable lead owner column.
/// Admin scopes also match ownerless leads, which otherwise have no one
/// able to repair them.
pub fn owner_filter(user_scope: &UserScope) -> Vec<Option<Uuid>> {
    let mut owners: Vec<Option<Uuid>> =
        user_scope.owner_ids().iter().map(|id| Some(*id)).collect();
    if user_scope.includes_unowned() {
        owners.push(None);
    }
    owners
}

fn visible_owners(
    conn: &mut PgConnection,
    user: &AuthUser,
) -> Result<Vec<Option<Uuid>>, ServiceError> {
    let user_scope = scope::resolve(conn, user)?;
    Ok(owner_filter(&user_scope))
}

pub fn get_lead(conn: &mut PgConnection, user: &AuthUser, id: Uuid) -> Result<LeadRow, ServiceError> {
    let owners = visible_owners(conn, user)?;
    leads::table
        .filter(leads::id.eq(id))
        .filter(leads::owner_id.eq_any(owners))
        .first(conn)
        .optional()?
        .ok_or(ServiceError::NotFound)
}

pub struct LeadFilters {
    pub name: Option<String>,
    pub status: Option<LeadStatus>,
    pub origin: Option<String>,
    pub created_from: Option<NaiveDate>,
    pub created_to: Option<NaiveDate>,
}

/// Scoped lead listing. Converted leads leave the working list; they remain
/// reachable through their client record and the dashboard totals.
pub fn list_leads(
    conn: &mut PgConnection,
    user: &AuthUser,
    filters: LeadFilters,
    limit: i64,
    offset: i64,
) -> Result<Vec<LeadRow>, ServiceError> {
    let owners = visible_owners(conn, user)?;

    let mut q = leads::table
        .filter(leads::owner_id.eq_any(owners))
        .filter(leads::status.ne(LeadStatus::Converted.as_str()))
        .into_boxed();

    if let Some(name) = filters.name.filter(|n| !n.is_empty()) {
        q = q.filter(leads::name.ilike(format!("%{name}%")));
    }
    if let Some(status) = filters.status {
        q = q.filter(leads::status.eq(status.as_str()));
    }
    if let Some(origin) = filters.origin.filter(|o| !o.is_empty()) {
        q = q.filter(leads::origin.ilike(format!("%{origin}%")));
    }
    if let Some(from) = filters.created_from {
        let start = from.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
        q = q.filter(leads::created_at.ge(start));
    }
    if let Some(to) = filters.created_to {
        if let Some(next) = to.succ_opt() {
            let end = next.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
            q = q.filter(leads::created_at.lt(end));
        }
    }

    Ok(q.order(leads::created_at.desc())
        .limit(limit)
        .offset(offset)
        .load(conn)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionAction {
    /// The lead already points at a client; conversion is a no-op.
    AlreadyConverted(Uuid),
    /// No known creator to own the client; skip, do not fail.
    MissingCreator,
    /// Create a client owned by the lead's creator.
    Create { owner_id: Uuid },
}

/// Conversion decision table: at most one client per lead, and a client
/// always needs an owner.
pub fn conversion_action(
    converted_client_id: Option<Uuid>,
    owner_id: Option<Uuid>,
) -> ConversionAction {
    match (converted_client_id, owner_id) {
        (Some(existing), _) => ConversionAction::AlreadyConverted(existing),
        (None, None) => ConversionAction::MissingCreator,
        (None, Some(owner_id)) => ConversionAction::Create { owner_id },
    }
}

/// converted_at is stamped once, on the edit that flips the status.
pub fn conversion_stamp(
    new_status: LeadStatus,
    already_converted: bool,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    (new_status == LeadStatus::Converted && !already_converted).then_some(now)
}

/// Materializes a client from a converted lead. Idempotent: a lead that
/// already points at a client is left untouched. A lead without a known
/// creator cannot own a client; that case is logged and skipped rather than
/// failing the contact that triggered it.
pub fn convert_lead(conn: &mut PgConnection, lead: &LeadRow) -> Result<Option<Uuid>, ServiceError> {
    let owner_id = match conversion_action(lead.converted_client_id, lead.owner_id) {
        ConversionAction::AlreadyConverted(existing) => return Ok(Some(existing)),
        ConversionAction::MissingCreator => {
            log::warn!(
                "lead {} converted without a creator; skipping client creation",
                lead.id
            );
            return Ok(None);
        }
        ConversionAction::Create { owner_id } => owner_id,
    };

    let now = Utc::now();
    let client = ClientRow {
        id: Uuid::new_v4(),
        company_id: lead.company_id,
        name: lead.name.clone(),
        tax_id: String::new(),
        phone: lead.phone.clone(),
        email: lead.email.clone(),
        contact_name: lead.name.clone(),
        contact_phone: lead.whatsapp.clone(),
        contact_email: lead.email.clone(),
        kind: ClientKind::B2c.as_str().to_string(),
        status: ClientStatus::Provisional.as_str().to_string(),
        owner_id,
        last_contact_at: None,
        created_at: now,
        updated_at: now,
    };

    diesel::insert_into(clients::table).values(&client).execute(conn)?;
    diesel::update(leads::table.filter(leads::id.eq(lead.id)))
        .set((
            leads::converted_client_id.eq(Some(client.id)),
            leads::updated_at.eq(now),
        ))
        .execute(conn)?;

    log::info!("lead {} converted into client {}", lead.id, client.id);
    Ok(Some(client.id))
}

pub struct ContactInput {
    pub channel: LeadChannel,
    pub outcome: ContactOutcome,
    pub note: String,
    pub next_contact: Option<NaiveDate>,
}

/// Records a contact with a lead and applies the lifecycle side effects:
/// status transition, conversion on a closed deal, and follow-up scheduling
/// (a new follow-up cancels any prior pending one for the lead).
pub fn register_contact(
    conn: &mut PgConnection,
    user: &AuthUser,
    lead_id: Uuid,
    input: ContactInput,
) -> Result<LeadContactRow, ServiceError> {
    if !user.may_write_sales_data() {
        return Err(ServiceError::denied(
            "recording lead contacts is reserved for salespeople",
        ));
    }

    let lead = get_lead(conn, user, lead_id)?;
    let now = Utc::now();

    let contact = LeadContactRow {
        id: Uuid::new_v4(),
        lead_id: lead.id,
        channel: input.channel.as_str().to_string(),
        outcome: input.outcome.as_str().to_string(),
        note: input.note,
        contacted_at: now,
        created_at: now,
    };
    diesel::insert_into(lead_contacts::table)
        .values(&contact)
        .execute(conn)?;

    let new_status = status_after(input.outcome);
    let converted_at =
        conversion_stamp(new_status, lead.converted_at.is_some(), now).or(lead.converted_at);

    diesel::update(leads::table.filter(leads::id.eq(lead.id)))
        .set((
            leads::status.eq(new_status.as_str()),
            leads::converted_at.eq(converted_at),
            leads::updated_at.eq(now),
        ))
        .execute(conn)?;

    if input.outcome == ContactOutcome::ClosedDeal {
        convert_lead(conn, &lead)?;
    }

    if let Some(due_on) = input.next_contact {
        schedule_follow_up(conn, lead.id, due_on, follow_up_description(input.channel, input.outcome))?;
    }

    log::info!(
        "lead contact recorded lead_id={} outcome={} new_status={} by={}",
        lead.id,
        input.outcome,
        new_status,
        user.username
    );

    Ok(contact)
}

/// At most one pending follow-up per lead: prior pending rows are cancelled
/// before the new one is inserted.
pub fn schedule_follow_up(
    conn: &mut PgConnection,
    lead_id: Uuid,
    due_on: NaiveDate,
    description: String,
) -> Result<FollowUpRow, ServiceError> {
    diesel::update(
        follow_ups::table
            .filter(follow_ups::lead_id.eq(lead_id))
            .filter(follow_ups::status.eq(FollowUpStatus::Pending.as_str())),
    )
    .set(follow_ups::status.eq(FollowUpStatus::Cancelled.as_str()))
    .execute(conn)?;

    let row = FollowUpRow {
        id: Uuid::new_v4(),
        lead_id,
        due_on,
        description,
        status: FollowUpStatus::Pending.as_str().to_string(),
        created_at: Utc::now(),
    };
    diesel::insert_into(follow_ups::table).values(&row).execute(conn)?;
    Ok(row)
}

pub fn delete_lead(conn: &mut PgConnection, user: &AuthUser, id: Uuid) -> Result<(), ServiceError> {
    if !user.is_manager_or_admin() {
        return Err(ServiceError::denied("only managers may delete leads"));
    }

    let lead = get_lead(conn, user, id)?;
    let status: LeadStatus = lead
        .status
        .parse()
        .map_err(ServiceError::Validation)?;

    let contact_count: i64 = lead_contacts::table
        .filter(lead_contacts::lead_id.eq(id))
        .count()
        .get_result(conn)?;

    ensure_deletable(status, contact_count)?;

    diesel::delete(follow_ups::table.filter(follow_ups::lead_id.eq(id))).execute(conn)?;
    diesel::delete(leads::table.filter(leads::id.eq(id))).execute(conn)?;

    log::info!("lead deleted id={id} by={}", user.username);
    Ok(())
}

pub fn lead_contacts_for(
    conn: &mut PgConnection,
    user: &AuthUser,
    lead_id: Uuid,
) -> Result<Vec<LeadContactRow>, ServiceError> {
    get_lead(conn, user, lead_id)?;
    Ok(lead_contacts::table
        .filter(lead_contacts::lead_id.eq(lead_id))
        .order(lead_contacts::contacted_at.desc())
        .load(conn)?)
}

pub fn pending_follow_ups_for(
    conn: &mut PgConnection,
    user: &AuthUser,
    lead_id: Uuid,
) -> Result<Vec<FollowUpRow>, ServiceError> {
    get_lead(conn, user, lead_id)?;
    Ok(follow_ups::table
        .filter(follow_ups::lead_id.eq(lead_id))
        .filter(follow_ups::status.eq(FollowUpStatus::Pending.as_str()))
        .order(follow_ups::due_on.asc())
        .load(conn)?)
}

/// Pending follow-ups due today or earlier, scoped through the lead owner.
pub fn follow_ups_due(
    conn: &mut PgConnection,
    user: &AuthUser,
) -> Result<Vec<(FollowUpRow, LeadRow)>, ServiceError> {
    let owners = visible_owners(conn, user)?;
    let today = Utc::now().date_naive();

    Ok(follow_ups::table
        .inner_join(leads::table)
        .filter(follow_ups::status.eq(FollowUpStatus::Pending.as_str()))
        .filter(follow_ups::due_on.le(today))
        .filter(leads::owner_id.eq_any(owners))
        .order(follow_ups::due_on.asc())
        .load(conn)?)
}
