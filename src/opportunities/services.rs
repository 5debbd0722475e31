use bigdecimal::BigDecimal;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use diesel::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::clients;
use crate::scope;
use crate::shared::enums::{InteractionChannel, Stage};
use crate::shared::error::ServiceError;
use crate::shared::schema::{opportunities, opportunity_interactions, users};

use super::{InteractionRow, OpportunityRow};

/// Deals with no follow-up date or no activity for this many days count as
/// stalled.
pub const DEFAULT_STALL_DAYS: i64 = 7;

/// The pipeline moves one step at a time; closed and lost are final.
pub fn next_stage(stage: Stage) -> Result<Stage, ServiceError> {
    match stage {
        Stage::Prospecting => Ok(Stage::Qualification),
        Stage::Qualification => Ok(Stage::Proposal),
        Stage::Proposal => Ok(Stage::Negotiation),
        Stage::Negotiation => Ok(Stage::Closed),
        Stage::Closed | Stage::Lost => Err(ServiceError::validation(format!(
            "a {stage} opportunity cannot advance"
        ))),
    }
}

/// Losing a won deal would rewrite history; anything else may still be lost.
pub fn ensure_can_lose(stage: Stage) -> Result<(), ServiceError> {
    if stage == Stage::Closed {
        return Err(ServiceError::validation(
            "a closed opportunity cannot be marked lost",
        ));
    }
    Ok(())
}

pub fn is_open(stage: Stage) -> bool {
    !matches!(stage, Stage::Closed | Stage::Lost)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpHealth {
    Unscheduled,
    OnTime,
    DueToday,
    Overdue,
}

pub fn follow_up_health(follow_up_on: Option<NaiveDate>, today: NaiveDate) -> FollowUpHealth {
    match follow_up_on {
        None => FollowUpHealth::Unscheduled,
        Some(on) if on > today => FollowUpHealth::OnTime,
        Some(on) if on == today => FollowUpHealth::DueToday,
        Some(_) => FollowUpHealth::Overdue,
    }
}

pub fn is_stalled(
    follow_up_on: Option<NaiveDate>,
    updated_at: DateTime<Utc>,
    now: DateTime<Utc>,
    stall_days: i64,
) -> bool {
    follow_up_on.is_none() || updated_at < now - Duration::days(stall_days)
}

fn stage_of(row: &OpportunityRow) -> Result<Stage, ServiceError> {
    row.stage
        .parse()
        .map_err(|_| ServiceError::validation(format!("unknown stage: {}", row.stage)))
}

pub struct OpportunityInput {
    pub client_id: Uuid,
    pub title: String,
    pub estimated_value: BigDecimal,
    pub description: String,
    pub next_action: String,
    pub follow_up_on: Option<NaiveDate>,
}

/// Every opportunity starts at prospecting against a client the caller can
/// already see.
pub fn create_opportunity(
    conn: &mut PgConnection,
    user: &AuthUser,
    input: OpportunityInput,
) -> Result<OpportunityRow, ServiceError> {
    if !user.may_write_sales_data() {
        return Err(ServiceError::denied(
            "opportunity registration is reserved for salespeople",
        ));
    }
    let company_id = user
        .company_id
        .ok_or_else(|| ServiceError::validation("user has no company assigned"))?;
    if input.title.trim().is_empty() {
        return Err(ServiceError::validation("title is required"));
    }
    let client = clients::services::get_client(conn, user, input.client_id)?;

    let now = Utc::now();
    let row = OpportunityRow {
        id: Uuid::new_v4(),
        company_id,
        client_id: client.id,
        salesperson_id: user.id,
        title: input.title,
        stage: Stage::Prospecting.as_str().to_string(),
        estimated_value: input.estimated_value,
        description: input.description,
        next_action: input.next_action,
        follow_up_on: input.follow_up_on,
        created_at: now,
        updated_at: now,
    };

    diesel::insert_into(opportunities::table)
        .values(&row)
        .execute(conn)?;
    log::info!(
        "opportunity created id={} title='{}' client='{}' by={}",
        row.id,
        row.title,
        client.name,
        user.username
    );
    Ok(row)
}

pub fn get_opportunity(
    conn: &mut PgConnection,
    user: &AuthUser,
    id: Uuid,
) -> Result<OpportunityRow, ServiceError> {
    let user_scope = scope::resolve(conn, user)?;
    opportunities::table
        .filter(opportunities::id.eq(id))
        .filter(opportunities::salesperson_id.eq_any(user_scope.owner_ids()))
        .first(conn)
        .optional()?
        .ok_or(ServiceError::NotFound)
}

pub fn list_opportunities(
    conn: &mut PgConnection,
    user: &AuthUser,
    stage: Option<Stage>,
    client_id: Option<Uuid>,
    limit: i64,
    offset: i64,
) -> Result<Vec<OpportunityRow>, ServiceError> {
    let user_scope = scope::resolve(conn, user)?;

    let mut q = opportunities::table
        .filter(opportunities::salesperson_id.eq_any(user_scope.owner_ids().to_vec()))
        .into_boxed();

    if let Some(stage) = stage {
        q = q.filter(opportunities::stage.eq(stage.as_str()));
    }
    if let Some(client_id) = client_id {
        q = q.filter(opportunities::client_id.eq(client_id));
    }

    Ok(q.order(opportunities::updated_at.desc())
        .limit(limit)
        .offset(offset)
        .load(conn)?)
}

fn set_stage(
    conn: &mut PgConnection,
    id: Uuid,
    stage: Stage,
) -> Result<(), ServiceError> {
    diesel::update(opportunities::table.filter(opportunities::id.eq(id)))
        .set((
            opportunities::stage.eq(stage.as_str()),
            opportunities::updated_at.eq(Utc::now()),
        ))
        .execute(conn)?;
    Ok(())
}

pub fn advance(
    conn: &mut PgConnection,
    user: &AuthUser,
    id: Uuid,
) -> Result<OpportunityRow, ServiceError> {
    let row = get_opportunity(conn, user, id)?;
    let next = next_stage(stage_of(&row)?)?;
    set_stage(conn, id, next)?;
    log::info!(
        "opportunity advanced id={} '{}' {} -> {} by={}",
        row.id,
        row.title,
        row.stage,
        next,
        user.username
    );
    get_opportunity(conn, user, id)
}

pub fn mark_lost(
    conn: &mut PgConnection,
    user: &AuthUser,
    id: Uuid,
) -> Result<OpportunityRow, ServiceError> {
    let row = get_opportunity(conn, user, id)?;
    ensure_can_lose(stage_of(&row)?)?;
    set_stage(conn, id, Stage::Lost)?;
    log::info!(
        "opportunity lost id={} '{}' by={}",
        row.id,
        row.title,
        user.username
    );
    get_opportunity(conn, user, id)
}

/// Rewrites the planned next step; only next_action, follow_up_on and
/// updated_at are touched.
pub fn set_follow_up(
    conn: &mut PgConnection,
    user: &AuthUser,
    id: Uuid,
    next_action: String,
    follow_up_on: Option<NaiveDate>,
) -> Result<OpportunityRow, ServiceError> {
    let row = get_opportunity(conn, user, id)?;
    if !is_open(stage_of(&row)?) {
        return Err(ServiceError::validation(
            "follow-up planning only applies to open opportunities",
        ));
    }
    diesel::update(opportunities::table.filter(opportunities::id.eq(id)))
        .set((
            opportunities::next_action.eq(next_action),
            opportunities::follow_up_on.eq(follow_up_on),
            opportunities::updated_at.eq(Utc::now()),
        ))
        .execute(conn)?;
    get_opportunity(conn, user, id)
}

/// Interaction entries are immutable; recording one also counts as activity
/// on the deal, so updated_at is bumped.
pub fn add_interaction(
    conn: &mut PgConnection,
    user: &AuthUser,
    opportunity_id: Uuid,
    channel: InteractionChannel,
    note: String,
) -> Result<InteractionRow, ServiceError> {
    get_opportunity(conn, user, opportunity_id)?;

    let row = InteractionRow {
        id: Uuid::new_v4(),
        opportunity_id,
        channel: channel.as_str().to_string(),
        note,
        created_by: user.id,
        created_at: Utc::now(),
    };
    diesel::insert_into(opportunity_interactions::table)
        .values(&row)
        .execute(conn)?;

    diesel::update(opportunities::table.filter(opportunities::id.eq(opportunity_id)))
        .set(opportunities::updated_at.eq(row.created_at))
        .execute(conn)?;

    Ok(row)
}

pub fn interactions_for(
    conn: &mut PgConnection,
    user: &AuthUser,
    opportunity_id: Uuid,
) -> Result<Vec<InteractionRow>, ServiceError> {
    get_opportunity(conn, user, opportunity_id)?;
    Ok(opportunity_interactions::table
        .filter(opportunity_interactions::opportunity_id.eq(opportunity_id))
        .order(opportunity_interactions::created_at.desc())
        .load(conn)?)
}

fn open_stage_tokens() -> Vec<String> {
    Stage::ALL
        .iter()
        .filter(|s| is_open(**s))
        .map(|s| s.as_str().to_string())
        .collect()
}

/// Open deals whose follow-up date has already passed, most neglected first.
pub fn overdue(
    conn: &mut PgConnection,
    user: &AuthUser,
) -> Result<Vec<OpportunityRow>, ServiceError> {
    let user_scope = scope::resolve(conn, user)?;
    let today = Utc::now().date_naive();

    Ok(opportunities::table
        .filter(opportunities::salesperson_id.eq_any(user_scope.owner_ids().to_vec()))
        .filter(opportunities::stage.eq_any(open_stage_tokens()))
        .filter(opportunities::follow_up_on.lt(today))
        .order(opportunities::follow_up_on.asc())
        .load(conn)?)
}

/// Open deals with no planned follow-up or no activity for `stall_days`.
pub fn stalled(
    conn: &mut PgConnection,
    user: &AuthUser,
    stall_days: i64,
) -> Result<Vec<OpportunityRow>, ServiceError> {
    let user_scope = scope::resolve(conn, user)?;
    let cutoff = Utc::now() - Duration::days(stall_days);

    Ok(opportunities::table
        .filter(opportunities::salesperson_id.eq_any(user_scope.owner_ids().to_vec()))
        .filter(opportunities::stage.eq_any(open_stage_tokens()))
        .filter(
            opportunities::follow_up_on
                .is_null()
                .or(opportunities::updated_at.lt(cutoff)),
        )
        .order(opportunities::updated_at.asc())
        .load(conn)?)
}

#[derive(Debug, Serialize)]
pub struct StageValue {
    pub stage: Stage,
    pub count: i64,
    pub total: BigDecimal,
}

#[derive(Debug, Serialize)]
pub struct SalespersonPipeline {
    pub salesperson: String,
    pub count: i64,
    pub total: BigDecimal,
}

#[derive(Debug, Serialize)]
pub struct MonthlyRealized {
    pub salesperson: String,
    pub month: String,
    pub count: i64,
    pub total: BigDecimal,
}

#[derive(Debug, Serialize)]
pub struct PipelineStats {
    pub by_stage: Vec<StageValue>,
    pub by_salesperson: Vec<SalespersonPipeline>,
    pub realized: Vec<MonthlyRealized>,
    pub overdue_count: i64,
    pub stalled_count: i64,
}

/// One slim pass over the scoped pipeline feeds every aggregate: value by
/// stage, open value per salesperson and realized (closed) value per
/// salesperson per month. Closing date is approximated by updated_at, which
/// the stage change stamps.
pub fn pipeline_stats(
    conn: &mut PgConnection,
    user: &AuthUser,
    stall_days: i64,
) -> Result<PipelineStats, ServiceError> {
    let user_scope = scope::resolve(conn, user)?;
    let now = Utc::now();
    let today = now.date_naive();

    type SlimRow = (Uuid, String, BigDecimal, Option<NaiveDate>, DateTime<Utc>);
    let rows: Vec<SlimRow> = opportunities::table
        .filter(opportunities::salesperson_id.eq_any(user_scope.owner_ids().to_vec()))
        .select((
            opportunities::salesperson_id,
            opportunities::stage,
            opportunities::estimated_value,
            opportunities::follow_up_on,
            opportunities::updated_at,
        ))
        .load(conn)?;

    let names: HashMap<Uuid, String> = users::table
        .filter(users::id.eq_any(user_scope.owner_ids()))
        .select((users::id, users::full_name))
        .load::<(Uuid, String)>(conn)?
        .into_iter()
        .collect();
    let name_of =
        |id: &Uuid| names.get(id).cloned().unwrap_or_else(|| "-".to_string());

    let mut per_stage: HashMap<Stage, (i64, BigDecimal)> = HashMap::new();
    let mut per_owner: HashMap<Uuid, (i64, BigDecimal)> = HashMap::new();
    let mut per_month: HashMap<(Uuid, String), (i64, BigDecimal)> = HashMap::new();
    let mut overdue_count = 0i64;
    let mut stalled_count = 0i64;

    for (owner, stage_token, value, follow_up_on, updated_at) in &rows {
        let Ok(stage) = stage_token.parse::<Stage>() else {
            continue;
        };
        let slot = per_stage
            .entry(stage)
            .or_insert_with(|| (0, BigDecimal::from(0)));
        slot.0 += 1;
        slot.1 += value;

        if is_open(stage) {
            let slot = per_owner
                .entry(*owner)
                .or_insert_with(|| (0, BigDecimal::from(0)));
            slot.0 += 1;
            slot.1 += value;

            if follow_up_health(*follow_up_on, today) == FollowUpHealth::Overdue {
                overdue_count += 1;
            }
            if is_stalled(*follow_up_on, *updated_at, now, stall_days) {
                stalled_count += 1;
            }
        } else if stage == Stage::Closed {
            let month = format!("{:04}-{:02}", updated_at.year(), updated_at.month());
            let slot = per_month
                .entry((*owner, month))
                .or_insert_with(|| (0, BigDecimal::from(0)));
            slot.0 += 1;
            slot.1 += value;
        }
    }

    let by_stage = Stage::ALL
        .iter()
        .filter_map(|stage| {
            per_stage.remove(stage).map(|(count, total)| StageValue {
                stage: *stage,
                count,
                total,
            })
        })
        .collect();

    let mut by_salesperson: Vec<SalespersonPipeline> = per_owner
        .into_iter()
        .map(|(owner, (count, total))| SalespersonPipeline {
            salesperson: name_of(&owner),
            count,
            total,
        })
        .collect();
    by_salesperson.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then(a.salesperson.cmp(&b.salesperson))
    });

    let mut realized: Vec<MonthlyRealized> = per_month
        .into_iter()
        .map(|((owner, month), (count, total))| MonthlyRealized {
            salesperson: name_of(&owner),
            month,
            count,
            total,
        })
        .collect();
    realized.sort_by(|a, b| {
        b.month
            .cmp(&a.month)
            .then(a.salesperson.cmp(&b.salesperson))
    });

    Ok(PipelineStats {
        by_stage,
        by_salesperson,
        realized,
        overdue_count,
        stalled_count,
    })
}
