//! Idempotent demo data for local development: one company, a user per
//! role, clients spread across the staleness bands, leads in every status
//! and a small pipeline. Re-running leaves existing rows alone.

use anyhow::{anyhow, Result};
use bigdecimal::BigDecimal;
use chrono::{Duration, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::auth::{hash_password, UserRow};
use crate::clients::ClientRow;
use crate::leads::LeadRow;
use crate::opportunities::OpportunityRow;
use crate::shared::enums::{ClientKind, ClientStatus, LeadStatus, Role, Stage};
use crate::shared::schema::{clients, companies, leads, opportunities, users};

pub mod reminders;

const SEED_COMPANY: &str = "Atlas Trading";
const SEED_PASSWORD: &str = "changeme";

fn ensure_company(conn: &mut PgConnection, name: &str) -> Result<Uuid> {
    if let Some(id) = companies::table
        .filter(companies::name.eq(name))
        .select(companies::id)
        .first::<Uuid>(conn)
        .optional()?
    {
        return Ok(id);
    }

    let id = Uuid::new_v4();
    diesel::insert_into(companies::table)
        .values((
            companies::id.eq(id),
            companies::name.eq(name),
            companies::created_at.eq(Utc::now()),
        ))
        .execute(conn)?;
    log::info!("seeded company '{name}'");
    Ok(id)
}

fn ensure_user(
    conn: &mut PgConnection,
    company_id: Uuid,
    manager_id: Option<Uuid>,
    username: &str,
    full_name: &str,
    role: Role,
) -> Result<Uuid> {
    if let Some(id) = users::table
        .filter(users::username.eq(username))
        .select(users::id)
        .first::<Uuid>(conn)
        .optional()?
    {
        return Ok(id);
    }

    let row = UserRow {
        id: Uuid::new_v4(),
        username: username.to_string(),
        full_name: full_name.to_string(),
        email: format!("{username}@atlas.example"),
        password_hash: hash_password(SEED_PASSWORD)
            .map_err(|e| anyhow!("password hash failed: {e}"))?,
        role: Some(role.as_str().to_string()),
        manager_id,
        company_id: Some(company_id),
        created_at: Utc::now(),
    };
    diesel::insert_into(users::table).values(&row).execute(conn)?;
    log::info!("seeded user '{username}' role={role}");
    Ok(row.id)
}

#[allow(clippy::too_many_arguments)]
fn ensure_client(
    conn: &mut PgConnection,
    company_id: Uuid,
    owner_id: Uuid,
    name: &str,
    tax_id: &str,
    status: ClientStatus,
    kind: ClientKind,
    last_contact_days_ago: Option<i64>,
) -> Result<Uuid> {
    if let Some(id) = clients::table
        .filter(clients::company_id.eq(company_id))
        .filter(clients::name.eq(name))
        .select(clients::id)
        .first::<Uuid>(conn)
        .optional()?
    {
        return Ok(id);
    }

    let now = Utc::now();
    let row = ClientRow {
        id: Uuid::new_v4(),
        company_id,
        name: name.to_string(),
        tax_id: tax_id.to_string(),
        phone: "+55 11 5555-0100".to_string(),
        email: String::new(),
        contact_name: String::new(),
        contact_phone: String::new(),
        contact_email: String::new(),
        kind: kind.as_str().to_string(),
        status: status.as_str().to_string(),
        owner_id,
        last_contact_at: last_contact_days_ago.map(|days| now - Duration::days(days)),
        created_at: now,
        updated_at: now,
    };
    diesel::insert_into(clients::table).values(&row).execute(conn)?;
    Ok(row.id)
}

fn ensure_lead(
    conn: &mut PgConnection,
    company_id: Uuid,
    owner_id: Uuid,
    name: &str,
    origin: &str,
    status: LeadStatus,
) -> Result<Uuid> {
    if let Some(id) = leads::table
        .filter(leads::company_id.eq(company_id))
        .filter(leads::name.eq(name))
        .select(leads::id)
        .first::<Uuid>(conn)
        .optional()?
    {
        return Ok(id);
    }

    let now = Utc::now();
    let row = LeadRow {
        id: Uuid::new_v4(),
        company_id,
        name: name.to_string(),
        company_name: format!("{name} Ltda"),
        phone: "+55 11 5555-0200".to_string(),
        whatsapp: String::new(),
        email: String::new(),
        origin: origin.to_string(),
        product_interest: "starter kit".to_string(),
        status: status.as_str().to_string(),
        notes: String::new(),
        owner_id: Some(owner_id),
        converted_at: None,
        converted_client_id: None,
        created_at: now,
        updated_at: now,
    };
    diesel::insert_into(leads::table).values(&row).execute(conn)?;
    Ok(row.id)
}

#[allow(clippy::too_many_arguments)]
fn ensure_opportunity(
    conn: &mut PgConnection,
    company_id: Uuid,
    client_id: Uuid,
    salesperson_id: Uuid,
    title: &str,
    stage: Stage,
    value: i64,
    follow_up_days_from_now: Option<i64>,
) -> Result<()> {
    let exists = opportunities::table
        .filter(opportunities::company_id.eq(company_id))
        .filter(opportunities::title.eq(title))
        .select(opportunities::id)
        .first::<Uuid>(conn)
        .optional()?
        .is_some();
    if exists {
        return Ok(());
    }

    let now = Utc::now();
    let row = OpportunityRow {
        id: Uuid::new_v4(),
        company_id,
        client_id,
        salesperson_id,
        title: title.to_string(),
        stage: stage.as_str().to_string(),
        estimated_value: BigDecimal::from(value),
        description: String::new(),
        next_action: "follow up by phone".to_string(),
        follow_up_on: follow_up_days_from_now.map(|d| now.date_naive() + Duration::days(d)),
        created_at: now,
        updated_at: now,
    };
    diesel::insert_into(opportunities::table)
        .values(&row)
        .execute(conn)?;
    Ok(())
}

pub fn run(conn: &mut PgConnection) -> Result<()> {
    let company_id = ensure_company(conn, SEED_COMPANY)?;

    let _admin = ensure_user(conn, company_id, None, "admin", "Alice Prado", Role::Admin)?;
    let manager = ensure_user(conn, company_id, None, "manager", "Marcos Reis", Role::Manager)?;
    let sales_ana = ensure_user(
        conn,
        company_id,
        Some(manager),
        "ana",
        "Ana Duarte",
        Role::Salesperson,
    )?;
    let sales_bruno = ensure_user(
        conn,
        company_id,
        Some(manager),
        "bruno",
        "Bruno Lima",
        Role::Salesperson,
    )?;

    // One client per staleness band, plus a provisional one without tax id.
    let fresh = ensure_client(
        conn,
        company_id,
        sales_ana,
        "Mercado Central",
        "11.111.111/0001-11",
        ClientStatus::Active,
        ClientKind::B2b,
        Some(5),
    )?;
    ensure_client(
        conn,
        company_id,
        sales_ana,
        "Padaria do Porto",
        "22.222.222/0001-22",
        ClientStatus::Active,
        ClientKind::B2b,
        Some(30),
    )?;
    let neglected = ensure_client(
        conn,
        company_id,
        sales_bruno,
        "Armazém Boa Vista",
        "33.333.333/0001-33",
        ClientStatus::Active,
        ClientKind::B2b,
        Some(60),
    )?;
    ensure_client(
        conn,
        company_id,
        sales_bruno,
        "Empório da Serra",
        "44.444.444/0001-44",
        ClientStatus::Active,
        ClientKind::B2c,
        None,
    )?;
    ensure_client(
        conn,
        company_id,
        sales_ana,
        "Café Aurora",
        "",
        ClientStatus::Provisional,
        ClientKind::B2c,
        None,
    )?;

    for (name, origin, status, owner) in [
        ("Joana Martins", "indication", LeadStatus::New, sales_ana),
        ("Pedro Alves", "website", LeadStatus::InContact, sales_ana),
        ("Clara Nunes", "fair", LeadStatus::Awaiting, sales_bruno),
        ("Rafael Costa", "cold_call", LeadStatus::Lost, sales_bruno),
    ] {
        ensure_lead(conn, company_id, owner, name, origin, status)?;
    }

    ensure_opportunity(
        conn,
        company_id,
        fresh,
        sales_ana,
        "Mercado Central - annual restock",
        Stage::Proposal,
        42_000,
        Some(3),
    )?;
    ensure_opportunity(
        conn,
        company_id,
        fresh,
        sales_ana,
        "Mercado Central - freezer line",
        Stage::Prospecting,
        15_000,
        Some(-2),
    )?;
    ensure_opportunity(
        conn,
        company_id,
        neglected,
        sales_bruno,
        "Armazém Boa Vista - starter kit",
        Stage::Negotiation,
        8_500,
        None,
    )?;
    ensure_opportunity(
        conn,
        company_id,
        neglected,
        sales_bruno,
        "Armazém Boa Vista - expansion",
        Stage::Closed,
        27_000,
        None,
    )?;

    log::info!("seed complete for company '{SEED_COMPANY}'");
    Ok(())
}
