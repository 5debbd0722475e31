use super::*;
use crate::shared::enums::Role;

#[test]
fn no_role_sees_nothing() {
    let me = Uuid::new_v4();
    let others = vec![Uuid::new_v4(), Uuid::new_v4()];
    assert!(visible_ids(None, me, &others, &others).is_empty());
}

#[test]
fn salesperson_sees_only_own_rows() {
    let me = Uuid::new_v4();
    let others = vec![Uuid::new_v4()];
    assert_eq!(visible_ids(Some(Role::Salesperson), me, &others, &others), vec![me]);
}

#[test]
fn manager_sees_self_and_subordinates() {
    let me = Uuid::new_v4();
    let reps = vec![Uuid::new_v4(), Uuid::new_v4()];
    let visible = visible_ids(Some(Role::Manager), me, &reps, &[]);
    assert_eq!(visible.len(), 3);
    assert!(visible.contains(&me));
    for rep in &reps {
        assert!(visible.contains(rep));
    }
}

#[test]
fn manager_self_listed_once_even_if_subordinate_of_self() {
    let me = Uuid::new_v4();
    let visible = visible_ids(Some(Role::Manager), me, &[me], &[]);
    assert_eq!(visible, vec![me]);
}

#[test]
fn admin_sees_whole_company() {
    let me = Uuid::new_v4();
    let members = vec![me, Uuid::new_v4(), Uuid::new_v4()];
    assert_eq!(visible_ids(Some(Role::Admin), me, &[], &members), members);
}

#[test]
fn empty_scope_matches_no_owner() {
    let scope = UserScope::empty();
    assert!(scope.is_empty());
    assert!(!scope.contains(Uuid::new_v4()));
    assert!(scope.owner_ids().is_empty());
    assert!(!scope.includes_unowned());
}

#[test]
fn only_admins_reach_unowned_rows() {
    let company = Uuid::new_v4();
    let admin = UserScope::new(Some(company), vec![Uuid::new_v4()], true);
    assert!(admin.includes_unowned());

    let rep = UserScope::new(Some(company), vec![Uuid::new_v4()], false);
    assert!(!rep.includes_unowned());
}
