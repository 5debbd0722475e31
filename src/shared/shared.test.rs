use crate::shared::enums::{ContactOutcome, LeadStatus, Role, Stage};
use crate::tests::test_util;
use std::str::FromStr;

#[test]
fn enum_text_values_match_columns() {
    test_util::setup();
    assert_eq!(Role::Salesperson.as_str(), "salesperson");
    assert_eq!(Stage::Prospecting.as_str(), "prospecting");
    assert_eq!(ContactOutcome::RequestedCallback.as_str(), "requested_callback");
}

#[test]
fn unknown_text_is_rejected() {
    assert!(Role::from_str("superuser").is_err());
    assert!(LeadStatus::from_str("NOVO").is_err());
}

#[test]
fn terminal_lead_statuses() {
    assert!(LeadStatus::Converted.is_terminal());
    assert!(LeadStatus::Lost.is_terminal());
    assert!(!LeadStatus::Awaiting.is_terminal());
}

#[test]
fn client_ip_prefers_forwarded_header() {
    let mut headers = axum::http::HeaderMap::new();
    headers.insert("x-forwarded-for", "10.1.2.3, 172.16.0.1".parse().unwrap());
    assert_eq!(crate::shared::utils::client_ip(&headers), "10.1.2.3");
}
