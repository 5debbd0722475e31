use chrono::{Duration, NaiveDate, Utc};

use super::services::{
    ensure_can_lose, follow_up_health, is_open, is_stalled, next_stage, FollowUpHealth,
    DEFAULT_STALL_DAYS,
};
use crate::assert_err;
use crate::assert_ok;
use crate::shared::enums::Stage;

#[test]
fn pipeline_walks_one_step_at_a_time() {
    assert_eq!(assert_ok!(next_stage(Stage::Prospecting)), Stage::Qualification);
    assert_eq!(assert_ok!(next_stage(Stage::Qualification)), Stage::Proposal);
    assert_eq!(assert_ok!(next_stage(Stage::Proposal)), Stage::Negotiation);
    assert_eq!(assert_ok!(next_stage(Stage::Negotiation)), Stage::Closed);
}

#[test]
fn terminal_stages_cannot_advance() {
    assert_err!(next_stage(Stage::Closed));
    assert_err!(next_stage(Stage::Lost));
}

#[test]
fn closed_deals_cannot_be_lost() {
    assert_err!(ensure_can_lose(Stage::Closed));
    for stage in [
        Stage::Prospecting,
        Stage::Qualification,
        Stage::Proposal,
        Stage::Negotiation,
        Stage::Lost,
    ] {
        assert!(ensure_can_lose(stage).is_ok());
    }
}

#[test]
fn open_stages_exclude_closed_and_lost() {
    assert!(is_open(Stage::Prospecting));
    assert!(is_open(Stage::Negotiation));
    assert!(!is_open(Stage::Closed));
    assert!(!is_open(Stage::Lost));
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn follow_up_health_from_date_comparison() {
    let today = day(2026, 6, 10);
    assert_eq!(follow_up_health(None, today), FollowUpHealth::Unscheduled);
    assert_eq!(
        follow_up_health(Some(day(2026, 6, 11)), today),
        FollowUpHealth::OnTime
    );
    assert_eq!(
        follow_up_health(Some(day(2026, 6, 10)), today),
        FollowUpHealth::DueToday
    );
    assert_eq!(
        follow_up_health(Some(day(2026, 6, 9)), today),
        FollowUpHealth::Overdue
    );
}

#[test]
fn unplanned_deals_are_always_stalled() {
    let now = Utc::now();
    assert!(is_stalled(None, now, now, DEFAULT_STALL_DAYS));
}

#[test]
fn quiet_deals_stall_after_the_window() {
    let now = Utc::now();
    let follow_up = Some(now.date_naive() + Duration::days(3));

    let recently_touched = now - Duration::days(2);
    assert!(!is_stalled(follow_up, recently_touched, now, DEFAULT_STALL_DAYS));

    let long_quiet = now - Duration::days(8);
    assert!(is_stalled(follow_up, long_quiet, now, DEFAULT_STALL_DAYS));

    // A wider window tolerates the same silence.
    assert!(!is_stalled(follow_up, long_quiet, now, 14));
}
