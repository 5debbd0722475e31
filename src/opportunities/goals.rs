//! Monthly sales targets per salesperson.
//!
//! A goal compares the target against two sums over the same month: realized
//! value (closed deals, by closing date) and open pipeline value (by creation
//! date). Goals are set by administrators; managers read their team's.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use diesel::dsl::sum;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::audit::record_audit;
use crate::auth::AuthUser;
use crate::scope;
use crate::shared::enums::Stage;
use crate::shared::error::{http, ServiceError};
use crate::shared::schema::{opportunities, sales_goals, users};
use crate::shared::state::AppState;

use super::services::is_open;

#[derive(Debug, Clone, Serialize, Queryable, Insertable)]
#[diesel(table_name = sales_goals)]
pub struct GoalRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub salesperson_id: Uuid,
    pub month: i32,
    pub year: i32,
    pub target_value: BigDecimal,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    OnTrack,
    Attention,
    AtRisk,
}

/// Pipeline covering 150% of the target is comfortable; covering it at all
/// deserves attention; anything less is at risk. A zero target is trivially
/// on track.
pub fn goal_status(target: &BigDecimal, pipeline: &BigDecimal) -> GoalStatus {
    let zero = BigDecimal::from(0);
    if *target <= zero {
        return GoalStatus::OnTrack;
    }
    let stretch = target.clone() * BigDecimal::from(3) / BigDecimal::from(2);
    if *pipeline >= stretch {
        GoalStatus::OnTrack
    } else if pipeline >= target {
        GoalStatus::Attention
    } else {
        GoalStatus::AtRisk
    }
}

/// Realized value as a percentage of the target, one decimal place. A zero
/// target reads as 0% rather than dividing by it.
pub fn attainment_percent(target: &BigDecimal, realized: &BigDecimal) -> f64 {
    if *target <= BigDecimal::from(0) {
        return 0.0;
    }
    let ratio = realized.clone() * BigDecimal::from(1000) / target.clone();
    ratio.to_f64().unwrap_or(0.0).round() / 10.0
}

/// Half-open UTC range [first of month, first of next month).
pub fn month_bounds(
    year: i32,
    month: u32,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ServiceError> {
    let bounds = || {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        let end = NaiveDate::from_ymd_opt(next_year, next_month, 1)?;
        Some((
            Utc.from_utc_datetime(&start.and_hms_opt(0, 0, 0)?),
            Utc.from_utc_datetime(&end.and_hms_opt(0, 0, 0)?),
        ))
    };
    bounds().ok_or_else(|| ServiceError::validation(format!("invalid month: {year}-{month}")))
}

/// Closed value for the month, keyed by updated_at: the stage change into
/// closed stamps it, so it stands in for the closing date.
fn realized_in_month(
    conn: &mut PgConnection,
    salesperson_id: Uuid,
    bounds: (DateTime<Utc>, DateTime<Utc>),
) -> Result<BigDecimal, ServiceError> {
    let total: Option<BigDecimal> = opportunities::table
        .filter(opportunities::salesperson_id.eq(salesperson_id))
        .filter(opportunities::stage.eq(Stage::Closed.as_str()))
        .filter(opportunities::updated_at.ge(bounds.0))
        .filter(opportunities::updated_at.lt(bounds.1))
        .select(sum(opportunities::estimated_value))
        .first(conn)?;
    Ok(total.unwrap_or_else(|| BigDecimal::from(0)))
}

/// Open value created in the month.
fn pipeline_in_month(
    conn: &mut PgConnection,
    salesperson_id: Uuid,
    bounds: (DateTime<Utc>, DateTime<Utc>),
) -> Result<BigDecimal, ServiceError> {
    let open_tokens: Vec<String> = Stage::ALL
        .iter()
        .filter(|s| is_open(**s))
        .map(|s| s.as_str().to_string())
        .collect();
    let total: Option<BigDecimal> = opportunities::table
        .filter(opportunities::salesperson_id.eq(salesperson_id))
        .filter(opportunities::stage.eq_any(open_tokens))
        .filter(opportunities::created_at.ge(bounds.0))
        .filter(opportunities::created_at.lt(bounds.1))
        .select(sum(opportunities::estimated_value))
        .first(conn)?;
    Ok(total.unwrap_or_else(|| BigDecimal::from(0)))
}

#[derive(Debug, Serialize)]
pub struct GoalReport {
    pub salesperson_id: Uuid,
    pub salesperson: String,
    pub month: i32,
    pub year: i32,
    pub target_value: BigDecimal,
    pub realized: BigDecimal,
    pub pipeline: BigDecimal,
    pub percent: f64,
    pub status: GoalStatus,
}

fn report(
    conn: &mut PgConnection,
    salesperson_id: Uuid,
    salesperson: String,
    target_value: BigDecimal,
    month: i32,
    year: i32,
) -> Result<GoalReport, ServiceError> {
    let bounds = month_bounds(year, month as u32)?;
    let realized = realized_in_month(conn, salesperson_id, bounds)?;
    let pipeline = pipeline_in_month(conn, salesperson_id, bounds)?;
    let percent = attainment_percent(&target_value, &realized);
    let status = goal_status(&target_value, &pipeline);
    Ok(GoalReport {
        salesperson_id,
        salesperson,
        month,
        year,
        target_value,
        realized,
        pipeline,
        percent,
        status,
    })
}

pub struct GoalInput {
    pub salesperson_id: Uuid,
    pub month: i32,
    pub year: i32,
    pub target_value: BigDecimal,
}

/// One goal per salesperson per month; setting it again replaces the target.
pub fn set_goal(
    conn: &mut PgConnection,
    user: &AuthUser,
    input: GoalInput,
) -> Result<GoalRow, ServiceError> {
    if !user.is_admin() {
        return Err(ServiceError::denied(
            "goal setting is reserved for administrators",
        ));
    }
    if !(1..=12).contains(&input.month) {
        return Err(ServiceError::validation(format!(
            "invalid month: {}",
            input.month
        )));
    }
    if input.target_value < BigDecimal::from(0) {
        return Err(ServiceError::validation("target cannot be negative"));
    }

    let user_scope = scope::resolve(conn, user)?;
    if !user_scope.contains(input.salesperson_id) {
        return Err(ServiceError::NotFound);
    }
    let company_id = user
        .company_id
        .ok_or_else(|| ServiceError::validation("user has no company assigned"))?;

    let existing: Option<Uuid> = sales_goals::table
        .filter(sales_goals::salesperson_id.eq(input.salesperson_id))
        .filter(sales_goals::month.eq(input.month))
        .filter(sales_goals::year.eq(input.year))
        .select(sales_goals::id)
        .first(conn)
        .optional()?;

    if let Some(id) = existing {
        diesel::update(sales_goals::table.filter(sales_goals::id.eq(id)))
            .set(sales_goals::target_value.eq(&input.target_value))
            .execute(conn)?;
        return Ok(sales_goals::table.filter(sales_goals::id.eq(id)).first(conn)?);
    }

    let row = GoalRow {
        id: Uuid::new_v4(),
        company_id,
        salesperson_id: input.salesperson_id,
        month: input.month,
        year: input.year,
        target_value: input.target_value,
        created_by: user.id,
        created_at: Utc::now(),
    };
    diesel::insert_into(sales_goals::table)
        .values(&row)
        .execute(conn)?;
    log::info!(
        "goal set salesperson={} {}-{:02} target={} by={}",
        row.salesperson_id,
        row.year,
        row.month,
        row.target_value,
        user.username
    );
    Ok(row)
}

/// The caller's own goal for the month. No goal row reads as a zero target,
/// so the report still shows realized and pipeline value.
pub fn my_goal(
    conn: &mut PgConnection,
    user: &AuthUser,
    month: i32,
    year: i32,
) -> Result<GoalReport, ServiceError> {
    let target: Option<BigDecimal> = sales_goals::table
        .filter(sales_goals::salesperson_id.eq(user.id))
        .filter(sales_goals::month.eq(month))
        .filter(sales_goals::year.eq(year))
        .select(sales_goals::target_value)
        .first(conn)
        .optional()?;

    report(
        conn,
        user.id,
        user.full_name.clone(),
        target.unwrap_or_else(|| BigDecimal::from(0)),
        month,
        year,
    )
}

/// Goal reports for every salesperson in the caller's scope who has a goal
/// set for the month.
pub fn team_goals(
    conn: &mut PgConnection,
    user: &AuthUser,
    month: i32,
    year: i32,
) -> Result<Vec<GoalReport>, ServiceError> {
    if !user.is_manager_or_admin() {
        return Err(ServiceError::denied(
            "team goals are a management view",
        ));
    }
    let user_scope = scope::resolve(conn, user)?;

    let rows: Vec<(Uuid, BigDecimal, String)> = sales_goals::table
        .inner_join(users::table.on(users::id.eq(sales_goals::salesperson_id)))
        .filter(sales_goals::salesperson_id.eq_any(user_scope.owner_ids().to_vec()))
        .filter(sales_goals::month.eq(month))
        .filter(sales_goals::year.eq(year))
        .select((
            sales_goals::salesperson_id,
            sales_goals::target_value,
            users::full_name,
        ))
        .order(users::full_name.asc())
        .load(conn)?;

    rows.into_iter()
        .map(|(salesperson_id, target, name)| {
            report(conn, salesperson_id, name, target, month, year)
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub month: Option<i32>,
    pub year: Option<i32>,
}

impl MonthQuery {
    fn resolve(&self) -> (i32, i32) {
        let now = Utc::now();
        (
            self.month.unwrap_or(now.month() as i32),
            self.year.unwrap_or(now.year()),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct SetGoalRequest {
    pub salesperson_id: Uuid,
    pub month: i32,
    pub year: i32,
    pub target_value: BigDecimal,
}

pub async fn my_goal_report(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<MonthQuery>,
) -> Result<Json<GoalReport>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let (month, year) = query.resolve();
    my_goal(&mut conn, &user, month, year).map(Json).map_err(http)
}

pub async fn team_goal_reports(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<MonthQuery>,
) -> Result<Json<Vec<GoalReport>>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let (month, year) = query.resolve();
    team_goals(&mut conn, &user, month, year)
        .map(Json)
        .map_err(http)
}

pub async fn set_goal_target(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Json(req): Json<SetGoalRequest>,
) -> Result<Json<GoalRow>, (StatusCode, String)> {
    let mut conn = state
        .conn
        .get()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let row = set_goal(
        &mut conn,
        &user,
        GoalInput {
            salesperson_id: req.salesperson_id,
            month: req.month,
            year: req.year,
            target_value: req.target_value,
        },
    )
    .map_err(http)?;

    record_audit(
        &mut conn,
        Some(&user),
        &headers,
        "goal.set",
        &format!(
            "salesperson_id={} period={}-{:02} target={}",
            row.salesperson_id, row.year, row.month, row.target_value
        ),
    );
    Ok(Json(row))
}

pub fn configure_goals_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/goals", get(team_goal_reports).post(set_goal_target))
        .route("/api/goals/me", get(my_goal_report))
}

#[cfg(test)]
#[path = "goals.test.rs"]
mod tests;
