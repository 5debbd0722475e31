use super::services::{ensure_activatable, initial_status};
use crate::assert_err;
use crate::shared::enums::ClientStatus;

#[test]
fn salesperson_always_creates_provisional() {
    assert_eq!(initial_status(false, "12.345.678/0001-00"), ClientStatus::Provisional);
    assert_eq!(initial_status(false, ""), ClientStatus::Provisional);
}

#[test]
fn admin_creates_active_only_with_tax_id() {
    assert_eq!(initial_status(true, "12.345.678/0001-00"), ClientStatus::Active);
    // Missing tax id demotes instead of rejecting.
    assert_eq!(initial_status(true, ""), ClientStatus::Provisional);
    assert_eq!(initial_status(true, "   "), ClientStatus::Provisional);
}

#[test]
fn activation_requires_tax_id() {
    assert_err!(ensure_activatable(""));
    assert_err!(ensure_activatable("  "));
    assert!(ensure_activatable("123.456.789-00").is_ok());
}
