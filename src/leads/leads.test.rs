use chrono::Utc;
use uuid::Uuid;

use super::dashboard::conversion_rate;
use super::services::{
    conversion_action, conversion_stamp, ensure_deletable, follow_up_description, owner_filter,
    status_after, ConversionAction,
};
use crate::assert_err;
use crate::scope::UserScope;
use crate::shared::enums::{ContactOutcome, LeadChannel, LeadStatus};

#[test]
fn outcome_transition_table() {
    assert_eq!(status_after(ContactOutcome::NoAnswer), LeadStatus::InContact);
    assert_eq!(
        status_after(ContactOutcome::RequestedCallback),
        LeadStatus::Awaiting
    );
    assert_eq!(status_after(ContactOutcome::Interested), LeadStatus::InContact);
    assert_eq!(status_after(ContactOutcome::NotInterested), LeadStatus::Lost);
    assert_eq!(status_after(ContactOutcome::ClosedDeal), LeadStatus::Converted);
}

#[test]
fn every_outcome_has_a_transition() {
    for outcome in ContactOutcome::ALL {
        // A panic here means the table above is missing an arm.
        let _ = status_after(*outcome);
    }
}

#[test]
fn converted_lead_cannot_be_deleted() {
    let err = assert_err!(ensure_deletable(LeadStatus::Converted, 0));
    assert!(err.to_string().contains("converted"));
}

#[test]
fn lead_with_history_cannot_be_deleted() {
    let err = assert_err!(ensure_deletable(LeadStatus::New, 3));
    assert!(err.to_string().contains("contacts"));
}

#[test]
fn fresh_lead_can_be_deleted() {
    assert!(ensure_deletable(LeadStatus::New, 0).is_ok());
    assert!(ensure_deletable(LeadStatus::Lost, 0).is_ok());
}

#[test]
fn follow_up_description_names_the_contact() {
    let desc = follow_up_description(LeadChannel::Call, ContactOutcome::RequestedCallback);
    assert_eq!(desc, "Callback after: call - requested_callback");
}

#[test]
fn conversion_is_idempotent() {
    let client = Uuid::new_v4();
    let owner = Uuid::new_v4();
    // A second conversion reuses the existing client, creator known or not.
    assert_eq!(
        conversion_action(Some(client), Some(owner)),
        ConversionAction::AlreadyConverted(client)
    );
    assert_eq!(
        conversion_action(Some(client), None),
        ConversionAction::AlreadyConverted(client)
    );
}

#[test]
fn conversion_without_creator_is_skipped() {
    assert_eq!(conversion_action(None, None), ConversionAction::MissingCreator);
}

#[test]
fn conversion_creates_for_known_creator() {
    let owner = Uuid::new_v4();
    assert_eq!(
        conversion_action(None, Some(owner)),
        ConversionAction::Create { owner_id: owner }
    );
}

#[test]
fn converted_at_stamped_only_on_the_transition() {
    let now = Utc::now();
    assert_eq!(conversion_stamp(LeadStatus::Converted, false, now), Some(now));
    // An already-converted lead keeps its original stamp.
    assert_eq!(conversion_stamp(LeadStatus::Converted, true, now), None);
    assert_eq!(conversion_stamp(LeadStatus::Lost, false, now), None);
    assert_eq!(conversion_stamp(LeadStatus::InContact, false, now), None);
}

#[test]
fn admin_scope_reaches_ownerless_leads() {
    let company = Uuid::new_v4();
    let member = Uuid::new_v4();

    let admin = UserScope::new(Some(company), vec![member], true);
    let owners = owner_filter(&admin);
    assert!(owners.contains(&None));
    assert!(owners.contains(&Some(member)));

    let rep = UserScope::new(Some(company), vec![member], false);
    assert_eq!(owner_filter(&rep), vec![Some(member)]);
}

#[test]
fn conversion_rate_over_finished_leads() {
    assert_eq!(conversion_rate(0, 0), 0.0);
    assert_eq!(conversion_rate(1, 0), 100.0);
    assert_eq!(conversion_rate(1, 1), 50.0);
    assert_eq!(conversion_rate(1, 2), 33.3);
}
