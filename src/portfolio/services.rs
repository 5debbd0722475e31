use chrono::{Duration, Utc};
use diesel::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::clients::ClientRow;
use crate::scope;
use crate::shared::enums::{ClientKind, ClientStatus, InteractionChannel};
use crate::shared::error::ServiceError;
use crate::shared::schema::{clients, portfolio_contacts, users};

use super::semaphore::{classify, Semaphore, GREEN_LIMIT_DAYS, YELLOW_LIMIT_DAYS};
use super::PortfolioContactRow;

/// The working portfolio takes provisional clients along with active ones,
/// so a freshly converted lead lands in the contact queue immediately.
fn portfolio_base(
    conn: &mut PgConnection,
    user: &AuthUser,
    name: Option<&str>,
    kind: Option<ClientKind>,
) -> Result<clients::BoxedQuery<'static, diesel::pg::Pg>, ServiceError> {
    let user_scope = scope::resolve(conn, user)?;

    let mut q = clients::table
        .filter(clients::owner_id.eq_any(user_scope.owner_ids().to_vec()))
        .filter(clients::status.eq_any(vec![
            ClientStatus::Active.as_str().to_string(),
            ClientStatus::Provisional.as_str().to_string(),
        ]))
        .into_boxed();

    if let Some(name) = name.filter(|n| !n.is_empty()) {
        q = q.filter(clients::name.ilike(format!("%{name}%")));
    }
    if let Some(kind) = kind {
        q = q.filter(clients::kind.eq(kind.as_str().to_string()));
    }

    Ok(q)
}

/// Contact queue: never-contacted clients first, then oldest contact first.
/// The optional semaphore filter is expressed as date thresholds so the
/// database does the narrowing.
pub fn list_queue(
    conn: &mut PgConnection,
    user: &AuthUser,
    name: Option<&str>,
    kind: Option<ClientKind>,
    band: Option<Semaphore>,
    limit: i64,
    offset: i64,
) -> Result<Vec<ClientRow>, ServiceError> {
    let mut q = portfolio_base(conn, user, name, kind)?;

    if let Some(band) = band {
        let now = Utc::now();
        match band {
            Semaphore::NoContact => {
                q = q.filter(clients::last_contact_at.is_null());
            }
            Semaphore::Green => {
                let floor = now - Duration::days(GREEN_LIMIT_DAYS);
                q = q.filter(clients::last_contact_at.ge(floor));
            }
            Semaphore::Yellow => {
                let newest = now - Duration::days(GREEN_LIMIT_DAYS + 1);
                let oldest = now - Duration::days(YELLOW_LIMIT_DAYS);
                q = q
                    .filter(clients::last_contact_at.le(newest))
                    .filter(clients::last_contact_at.ge(oldest));
            }
            Semaphore::Red => {
                let ceiling = now - Duration::days(YELLOW_LIMIT_DAYS + 1);
                q = q.filter(clients::last_contact_at.le(ceiling));
            }
        }
    }

    Ok(q.order(clients::last_contact_at.asc().nulls_first())
        .limit(limit)
        .offset(offset)
        .load(conn)?)
}

/// Scoped lookup inside the portfolio. A miss is a 404, by design: the
/// response never confirms whether the row exists outside the caller's scope.
pub fn get_portfolio_client(
    conn: &mut PgConnection,
    user: &AuthUser,
    id: Uuid,
) -> Result<ClientRow, ServiceError> {
    portfolio_base(conn, user, None, None)?
        .filter(clients::id.eq(id))
        .first(conn)
        .optional()?
        .ok_or(ServiceError::NotFound)
}

pub struct PortfolioContactInput {
    pub channel: InteractionChannel,
    pub note: String,
    pub next_action_on: Option<chrono::NaiveDate>,
}

/// Records a contact with an active client and refreshes the staleness
/// marker. Only last_contact_at is written back on the client row, so a
/// concurrent edit of any other column survives.
pub fn register_contact(
    conn: &mut PgConnection,
    user: &AuthUser,
    client_id: Uuid,
    input: PortfolioContactInput,
) -> Result<PortfolioContactRow, ServiceError> {
    let client = get_portfolio_client(conn, user, client_id)?;

    if client.status != ClientStatus::Active.as_str() {
        return Err(ServiceError::validation(format!(
            "cannot record a contact: client '{}' is not active (status: {})",
            client.name, client.status
        )));
    }

    let contact = PortfolioContactRow {
        id: Uuid::new_v4(),
        client_id: client.id,
        recorded_by: user.id,
        channel: input.channel.as_str().to_string(),
        note: input.note,
        next_action_on: input.next_action_on,
        created_at: Utc::now(),
    };
    diesel::insert_into(portfolio_contacts::table)
        .values(&contact)
        .execute(conn)?;

    diesel::update(clients::table.filter(clients::id.eq(client.id)))
        .set(clients::last_contact_at.eq(contact.created_at))
        .execute(conn)?;

    log::info!(
        "portfolio contact recorded client_id={} client='{}' channel={} by={}",
        client.id,
        client.name,
        contact.channel,
        user.username
    );

    Ok(contact)
}

pub fn contact_history(
    conn: &mut PgConnection,
    user: &AuthUser,
    client_id: Uuid,
) -> Result<Vec<PortfolioContactRow>, ServiceError> {
    get_portfolio_client(conn, user, client_id)?;
    Ok(portfolio_contacts::table
        .filter(portfolio_contacts::client_id.eq(client_id))
        .order(portfolio_contacts::created_at.desc())
        .load(conn)?)
}

#[derive(Debug, Default, Serialize)]
pub struct SemaphoreKpis {
    pub total: i64,
    pub no_contact: i64,
    pub green: i64,
    pub yellow: i64,
    pub red: i64,
}

#[derive(Debug, Serialize)]
pub struct SalespersonPortfolio {
    pub salesperson: String,
    pub kpis: SemaphoreKpis,
}

#[derive(Debug, Serialize)]
pub struct RecorderActivity {
    pub salesperson: String,
    pub contacts: i64,
}

#[derive(Debug, Serialize)]
pub struct PortfolioDashboard {
    pub kpis: SemaphoreKpis,
    pub by_salesperson: Vec<SalespersonPortfolio>,
    pub contacts_last_30_days: Vec<RecorderActivity>,
    pub touched_last_7_days: i64,
}

fn bump(kpis: &mut SemaphoreKpis, band: Semaphore) {
    kpis.total += 1;
    match band {
        Semaphore::NoContact => kpis.no_contact += 1,
        Semaphore::Green => kpis.green += 1,
        Semaphore::Yellow => kpis.yellow += 1,
        Semaphore::Red => kpis.red += 1,
    }
}

/// Manager dashboard over the scoped portfolio: global semaphore KPIs, the
/// same split per salesperson, contact volume per recorder over 30 days and
/// how many clients were touched in the last 7.
pub fn portfolio_dashboard(
    conn: &mut PgConnection,
    user: &AuthUser,
) -> Result<PortfolioDashboard, ServiceError> {
    let user_scope = scope::resolve(conn, user)?;
    let now = Utc::now();
    let today = now.date_naive();

    let rows: Vec<(Uuid, Uuid, Option<chrono::DateTime<Utc>>)> = clients::table
        .filter(clients::owner_id.eq_any(user_scope.owner_ids().to_vec()))
        .filter(clients::status.eq_any(vec![
            ClientStatus::Active.as_str().to_string(),
            ClientStatus::Provisional.as_str().to_string(),
        ]))
        .select((clients::id, clients::owner_id, clients::last_contact_at))
        .load(conn)?;

    let names: HashMap<Uuid, String> = users::table
        .filter(users::id.eq_any(user_scope.owner_ids()))
        .select((users::id, users::full_name))
        .load::<(Uuid, String)>(conn)?
        .into_iter()
        .collect();

    let mut kpis = SemaphoreKpis::default();
    let mut per_owner: HashMap<Uuid, SemaphoreKpis> = HashMap::new();
    let mut touched_last_7_days = 0i64;
    let week_ago = now - Duration::days(7);

    for (_, owner, last_contact) in &rows {
        let band = classify(*last_contact, today);
        bump(&mut kpis, band);
        bump(per_owner.entry(*owner).or_default(), band);
        if last_contact.map(|at| at >= week_ago).unwrap_or(false) {
            touched_last_7_days += 1;
        }
    }

    let mut by_salesperson: Vec<SalespersonPortfolio> = per_owner
        .into_iter()
        .map(|(owner, kpis)| SalespersonPortfolio {
            salesperson: names.get(&owner).cloned().unwrap_or_else(|| "-".to_string()),
            kpis,
        })
        .collect();
    by_salesperson.sort_by(|a, b| {
        b.kpis
            .total
            .cmp(&a.kpis.total)
            .then(a.salesperson.cmp(&b.salesperson))
    });

    let month_ago = now - Duration::days(30);
    let client_ids: Vec<Uuid> = rows.iter().map(|(id, _, _)| *id).collect();
    let recorder_rows: Vec<Uuid> = portfolio_contacts::table
        .filter(portfolio_contacts::client_id.eq_any(client_ids))
        .filter(portfolio_contacts::created_at.ge(month_ago))
        .select(portfolio_contacts::recorded_by)
        .load(conn)?;

    let mut per_recorder: HashMap<Uuid, i64> = HashMap::new();
    for recorder in recorder_rows {
        *per_recorder.entry(recorder).or_default() += 1;
    }

    let recorder_names: HashMap<Uuid, String> = users::table
        .filter(users::id.eq_any(per_recorder.keys().copied().collect::<Vec<_>>()))
        .select((users::id, users::full_name))
        .load::<(Uuid, String)>(conn)?
        .into_iter()
        .collect();

    let mut contacts_last_30_days: Vec<RecorderActivity> = per_recorder
        .into_iter()
        .map(|(recorder, contacts)| RecorderActivity {
            salesperson: recorder_names
                .get(&recorder)
                .cloned()
                .unwrap_or_else(|| "-".to_string()),
            contacts,
        })
        .collect();
    contacts_last_30_days.sort_by(|a, b| {
        b.contacts
            .cmp(&a.contacts)
            .then(a.salesperson.cmp(&b.salesperson))
    });

    Ok(PortfolioDashboard {
        kpis,
        by_salesperson,
        contacts_last_30_days,
        touched_last_7_days,
    })
}
