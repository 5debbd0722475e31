use bigdecimal::BigDecimal;

use super::{attainment_percent, goal_status, month_bounds, GoalStatus};
use crate::assert_err;

fn dec(n: i64) -> BigDecimal {
    BigDecimal::from(n)
}

#[test]
fn status_thresholds() {
    let target = dec(1000);
    // Exactly 150% coverage is still comfortable.
    assert_eq!(goal_status(&target, &dec(1500)), GoalStatus::OnTrack);
    assert_eq!(goal_status(&target, &dec(2000)), GoalStatus::OnTrack);
    // Covering the target without slack needs watching.
    assert_eq!(goal_status(&target, &dec(1000)), GoalStatus::Attention);
    assert_eq!(goal_status(&target, &dec(1499)), GoalStatus::Attention);
    assert_eq!(goal_status(&target, &dec(999)), GoalStatus::AtRisk);
    assert_eq!(goal_status(&target, &dec(0)), GoalStatus::AtRisk);
}

#[test]
fn zero_target_is_on_track() {
    assert_eq!(goal_status(&dec(0), &dec(0)), GoalStatus::OnTrack);
    assert_eq!(goal_status(&dec(-5), &dec(0)), GoalStatus::OnTrack);
}

#[test]
fn percent_rounds_to_one_decimal() {
    assert_eq!(attainment_percent(&dec(1000), &dec(500)), 50.0);
    assert_eq!(attainment_percent(&dec(3), &dec(1)), 33.3);
    assert_eq!(attainment_percent(&dec(1000), &dec(1250)), 125.0);
}

#[test]
fn percent_of_zero_target_is_zero() {
    assert_eq!(attainment_percent(&dec(0), &dec(900)), 0.0);
}

#[test]
fn month_bounds_cover_the_whole_month() {
    let (start, end) = month_bounds(2026, 8).unwrap();
    assert_eq!(start.to_rfc3339(), "2026-08-01T00:00:00+00:00");
    assert_eq!(end.to_rfc3339(), "2026-09-01T00:00:00+00:00");
}

#[test]
fn december_rolls_into_the_next_year() {
    let (start, end) = month_bounds(2026, 12).unwrap();
    assert_eq!(start.to_rfc3339(), "2026-12-01T00:00:00+00:00");
    assert_eq!(end.to_rfc3339(), "2027-01-01T00:00:00+00:00");
}

#[test]
fn month_zero_is_rejected() {
    let err = assert_err!(month_bounds(2026, 0));
    assert!(err.to_string().contains("invalid month"));
    assert_err!(month_bounds(2026, 13));
}
