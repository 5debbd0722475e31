use chrono::{Duration, NaiveDate, TimeZone, Utc};

use super::semaphore::{
    classify, days_without_contact, parse_semaphore, Semaphore, GREEN_LIMIT_DAYS,
};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn contact_days_ago(today: NaiveDate, days: i64) -> Option<chrono::DateTime<Utc>> {
    let at = today - Duration::days(days);
    Some(Utc.from_utc_datetime(&at.and_hms_opt(9, 30, 0).unwrap()))
}

#[test]
fn twenty_five_days_is_yellow() {
    let today = day(2026, 3, 15);
    assert_eq!(classify(contact_days_ago(today, 25), today), Semaphore::Yellow);
}

#[test]
fn exactly_twenty_days_is_still_green() {
    let today = day(2026, 3, 15);
    assert_eq!(
        classify(contact_days_ago(today, GREEN_LIMIT_DAYS), today),
        Semaphore::Green
    );
    assert_eq!(
        classify(contact_days_ago(today, GREEN_LIMIT_DAYS + 1), today),
        Semaphore::Yellow
    );
}

#[test]
fn forty_one_days_is_red() {
    let today = day(2026, 3, 15);
    assert_eq!(classify(contact_days_ago(today, 40), today), Semaphore::Yellow);
    assert_eq!(classify(contact_days_ago(today, 41), today), Semaphore::Red);
}

#[test]
fn never_contacted_is_its_own_band() {
    let today = day(2026, 3, 15);
    assert_eq!(classify(None, today), Semaphore::NoContact);
    assert_eq!(days_without_contact(None, today), None);
}

#[test]
fn no_contact_sorts_ahead_of_every_band() {
    let bands = [
        Semaphore::Green,
        Semaphore::Yellow,
        Semaphore::Red,
    ];
    for band in bands {
        assert!(Semaphore::NoContact.sort_order() < band.sort_order());
    }
    // Among contacted clients the most neglected come first.
    assert!(Semaphore::Red.sort_order() < Semaphore::Yellow.sort_order());
    assert!(Semaphore::Yellow.sort_order() < Semaphore::Green.sort_order());
}

#[test]
fn same_day_contact_counts_as_zero_days() {
    let today = day(2026, 3, 15);
    assert_eq!(days_without_contact(contact_days_ago(today, 0), today), Some(0));
    assert_eq!(classify(contact_days_ago(today, 0), today), Semaphore::Green);
}

#[test]
fn band_names_round_trip() {
    for band in [
        Semaphore::NoContact,
        Semaphore::Green,
        Semaphore::Yellow,
        Semaphore::Red,
    ] {
        assert_eq!(parse_semaphore(band.as_str()), Some(band));
    }
    assert_eq!(parse_semaphore("purple"), None);
}
