use super::*;
use crate::assert_ok;
use chrono::Utc;

fn row(role: Option<&str>, company: Option<Uuid>) -> UserRow {
    UserRow {
        id: Uuid::new_v4(),
        username: "ana".to_string(),
        full_name: "Ana Souza".to_string(),
        email: "ana@example.com".to_string(),
        password_hash: String::new(),
        role: role.map(|r| r.to_string()),
        manager_id: None,
        company_id: company,
        created_at: Utc::now(),
    }
}

#[test]
fn password_hash_round_trip() {
    crate::tests::test_util::setup();
    let hash = assert_ok!(hash_password("s3cret"));
    assert!(verify_password("s3cret", &hash));
    assert!(!verify_password("wrong", &hash));
}

#[test]
fn verify_rejects_garbage_hash() {
    assert!(!verify_password("s3cret", "not-a-phc-string"));
}

#[test]
fn unknown_role_resolves_to_none() {
    let user = AuthUser::from_row(&row(Some("superuser"), Some(Uuid::new_v4())));
    assert_eq!(user.role, None);
    assert!(!user.may_write_sales_data());
}

#[test]
fn role_gates() {
    let admin = AuthUser::from_row(&row(Some("admin"), Some(Uuid::new_v4())));
    assert!(admin.is_admin());
    assert!(admin.may_write_sales_data());

    let manager = AuthUser::from_row(&row(Some("manager"), Some(Uuid::new_v4())));
    assert!(manager.is_manager_or_admin());
    assert!(!manager.may_write_sales_data());

    let rep = AuthUser::from_row(&row(Some("salesperson"), Some(Uuid::new_v4())));
    assert!(rep.may_write_sales_data());
    assert!(!rep.is_manager_or_admin());
}
