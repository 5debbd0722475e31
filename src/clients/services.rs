use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::scope;
use crate::shared::enums::{ClientKind, ClientStatus};
use crate::shared::error::ServiceError;
use crate::shared::schema::clients;

use super::{ClientRow, CreateClientRequest};

/// Status a freshly created client starts in. Salespeople always create
/// provisional records; admins create active ones when a tax id is present,
/// otherwise the record is demoted to provisional instead of rejected.
pub fn initial_status(is_admin: bool, tax_id: &str) -> ClientStatus {
    if is_admin && !tax_id.trim().is_empty() {
        ClientStatus::Active
    } else {
        ClientStatus::Provisional
    }
}

/// A client may only be active with a tax id on file.
pub fn ensure_activatable(tax_id: &str) -> Result<(), ServiceError> {
    if tax_id.trim().is_empty() {
        return Err(ServiceError::validation(
            "tax id is required to activate a client",
        ));
    }
    Ok(())
}

pub fn create_client(
    conn: &mut PgConnection,
    user: &AuthUser,
    req: CreateClientRequest,
) -> Result<ClientRow, ServiceError> {
    if !user.may_write_sales_data() {
        return Err(ServiceError::denied(
            "client registration is reserved for salespeople",
        ));
    }
    let company_id = user
        .company_id
        .ok_or_else(|| ServiceError::validation("user has no company assigned"))?;

    let now = Utc::now();
    let tax_id = req.tax_id.unwrap_or_default();
    let status = initial_status(user.is_admin(), &tax_id);

    let row = ClientRow {
        id: Uuid::new_v4(),
        company_id,
        name: req.name,
        tax_id,
        phone: req.phone.unwrap_or_default(),
        email: req.email.unwrap_or_default(),
        contact_name: req.contact_name.unwrap_or_default(),
        contact_phone: req.contact_phone.unwrap_or_default(),
        contact_email: req.contact_email.unwrap_or_default(),
        kind: req.kind.unwrap_or(ClientKind::B2c).as_str().to_string(),
        status: status.as_str().to_string(),
        owner_id: user.id,
        last_contact_at: None,
        created_at: now,
        updated_at: now,
    };

    diesel::insert_into(clients::table).values(&row).execute(conn)?;
    log::info!(
        "client created id={} name='{}' status={} owner={}",
        row.id,
        row.name,
        row.status,
        user.username
    );
    Ok(row)
}

pub fn get_client(
    conn: &mut PgConnection,
    user: &AuthUser,
    id: Uuid,
) -> Result<ClientRow, ServiceError> {
    let user_scope = scope::resolve(conn, user)?;
    clients::table
        .filter(clients::id.eq(id))
        .filter(clients::owner_id.eq_any(user_scope.owner_ids()))
        .first(conn)
        .optional()?
        .ok_or(ServiceError::NotFound)
}

pub fn list_clients(
    conn: &mut PgConnection,
    user: &AuthUser,
    name: Option<String>,
    status: Option<ClientStatus>,
    kind: Option<ClientKind>,
    limit: i64,
    offset: i64,
) -> Result<Vec<ClientRow>, ServiceError> {
    let user_scope = scope::resolve(conn, user)?;

    let mut q = clients::table
        .filter(clients::owner_id.eq_any(user_scope.owner_ids().to_vec()))
        .into_boxed();

    if let Some(name) = name.filter(|n| !n.is_empty()) {
        q = q.filter(clients::name.ilike(format!("%{name}%")));
    }
    if let Some(status) = status {
        q = q.filter(clients::status.eq(status.as_str()));
    }
    if let Some(kind) = kind {
        q = q.filter(clients::kind.eq(kind.as_str()));
    }

    Ok(q.order(clients::created_at.desc())
        .limit(limit)
        .offset(offset)
        .load(conn)?)
}

fn set_status(
    conn: &mut PgConnection,
    user: &AuthUser,
    id: Uuid,
    status: ClientStatus,
) -> Result<ClientRow, ServiceError> {
    let client = get_client(conn, user, id)?;

    if status == ClientStatus::Active {
        ensure_activatable(&client.tax_id)?;
    }

    // Targeted update: only status and updated_at, so concurrent writes to
    // other columns (last_contact_at in particular) are left alone.
    diesel::update(clients::table.filter(clients::id.eq(id)))
        .set((
            clients::status.eq(status.as_str()),
            clients::updated_at.eq(Utc::now()),
        ))
        .execute(conn)?;

    get_client(conn, user, id)
}

pub fn activate_client(
    conn: &mut PgConnection,
    user: &AuthUser,
    id: Uuid,
) -> Result<ClientRow, ServiceError> {
    if !user.is_admin() {
        return Err(ServiceError::denied("only administrators may activate clients"));
    }
    set_status(conn, user, id, ClientStatus::Active)
}

pub fn deactivate_client(
    conn: &mut PgConnection,
    user: &AuthUser,
    id: Uuid,
) -> Result<ClientRow, ServiceError> {
    if !user.is_admin() {
        return Err(ServiceError::denied(
            "only administrators may deactivate clients",
        ));
    }
    set_status(conn, user, id, ClientStatus::Inactive)
}
