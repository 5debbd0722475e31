use chrono::Utc;
use diesel::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::scope;
use crate::shared::enums::{FollowUpStatus, LeadStatus};
use crate::shared::error::ServiceError;
use crate::shared::schema::{follow_ups, leads, users};

#[derive(Debug, Default, Serialize)]
pub struct OriginStats {
    pub origin: String,
    pub total: i64,
    pub converted: i64,
    pub lost: i64,
    pub conversion_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct SalespersonStats {
    pub salesperson: String,
    pub total: i64,
    pub converted: i64,
    pub lost: i64,
    pub conversion_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct LeadDashboard {
    pub total_leads: i64,
    pub converted: i64,
    pub lost: i64,
    pub conversion_rate: f64,
    pub by_origin: Vec<OriginStats>,
    pub by_salesperson: Vec<SalespersonStats>,
    pub overdue_follow_ups: i64,
}

/// Rate over finished leads only; open pipeline does not dilute it.
pub fn conversion_rate(converted: i64, lost: i64) -> f64 {
    let finished = converted + lost;
    if finished == 0 {
        return 0.0;
    }
    (converted as f64 / finished as f64 * 1000.0).round() / 10.0
}

fn fold(rows: &[(String, String)]) -> Vec<OriginStats> {
    let mut map: HashMap<&str, OriginStats> = HashMap::new();
    for (key, status) in rows {
        let entry = map.entry(key).or_insert_with(|| OriginStats {
            origin: key.clone(),
            ..Default::default()
        });
        entry.total += 1;
        if status == LeadStatus::Converted.as_str() {
            entry.converted += 1;
        } else if status == LeadStatus::Lost.as_str() {
            entry.lost += 1;
        }
    }
    let mut stats: Vec<OriginStats> = map
        .into_values()
        .map(|mut s| {
            s.conversion_rate = conversion_rate(s.converted, s.lost);
            s
        })
        .collect();
    stats.sort_by(|a, b| b.total.cmp(&a.total).then(a.origin.cmp(&b.origin)));
    stats
}

pub fn lead_dashboard(
    conn: &mut PgConnection,
    user: &AuthUser,
) -> Result<LeadDashboard, ServiceError> {
    let user_scope = scope::resolve(conn, user)?;
    let owners = super::services::owner_filter(&user_scope);

    // One slim load feeds every grouping; dashboards run at company scale,
    // not at data-warehouse scale.
    let rows: Vec<(String, Option<Uuid>, String)> = leads::table
        .filter(leads::owner_id.eq_any(owners.clone()))
        .select((leads::origin, leads::owner_id, leads::status))
        .load(conn)?;

    let total_leads = rows.len() as i64;
    let converted = rows
        .iter()
        .filter(|(_, _, s)| s == LeadStatus::Converted.as_str())
        .count() as i64;
    let lost = rows
        .iter()
        .filter(|(_, _, s)| s == LeadStatus::Lost.as_str())
        .count() as i64;

    let by_origin = fold(
        &rows
            .iter()
            .map(|(origin, _, status)| (origin.clone(), status.clone()))
            .collect::<Vec<_>>(),
    );

    let names: HashMap<Uuid, String> = users::table
        .filter(users::id.eq_any(user_scope.owner_ids()))
        .select((users::id, users::full_name))
        .load::<(Uuid, String)>(conn)?
        .into_iter()
        .collect();

    let by_salesperson = fold(
        &rows
            .iter()
            .filter_map(|(_, owner, status)| {
                owner.map(|o| {
                    (
                        names.get(&o).cloned().unwrap_or_else(|| "-".to_string()),
                        status.clone(),
                    )
                })
            })
            .collect::<Vec<_>>(),
    )
    .into_iter()
    .map(|s| SalespersonStats {
        salesperson: s.origin,
        total: s.total,
        converted: s.converted,
        lost: s.lost,
        conversion_rate: s.conversion_rate,
    })
    .collect();

    let today = Utc::now().date_naive();
    let overdue_follow_ups: i64 = follow_ups::table
        .inner_join(leads::table)
        .filter(follow_ups::status.eq(FollowUpStatus::Pending.as_str()))
        .filter(follow_ups::due_on.lt(today))
        .filter(leads::owner_id.eq_any(owners))
        .count()
        .get_result(conn)?;

    Ok(LeadDashboard {
        total_leads,
        converted,
        lost,
        conversion_rate: conversion_rate(converted, lost),
        by_origin,
        by_salesperson,
        overdue_follow_ups,
    })
}
