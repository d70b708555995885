mod common;

use splitify::{
    error::AppError,
    reconcile::{ReconcileReport, reconcile},
    routes::{
        expense::model::{CreateExpenseRequest, Expense},
        group::{guard::load_group_for_member, model::Group},
    },
    seed,
    split::SplitMethod,
    store::GroupStore,
};
use uuid::Uuid;

use common::test_app;

#[tokio::test]
async fn guard_hides_dangling_participants_without_writing() {
    let app = test_app();
    let alice = app.user("alice").await;
    let ghost = app.user("ghost").await;
    let group = app.group(alice.id, &[ghost.id]).await;

    app.store.remove_user(ghost.id).await;

    let first = load_group_for_member(&app.state, group.id, alice.id).await.unwrap();
    let second = load_group_for_member(&app.state, group.id, alice.id).await.unwrap();
    assert_eq!(first.participants, second.participants);
    assert_eq!(first.active_participants(), vec![alice.id]);

    let stored = app.store.find_group(group.id).await.unwrap().unwrap();
    assert_eq!(stored.participants.len(), 2);
}

#[tokio::test]
async fn guard_rejects_missing_deleted_and_foreign_groups() {
    let app = test_app();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let group = app.group(alice.id, &[]).await;

    let err = load_group_for_member(&app.state, Uuid::new_v4(), alice.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = load_group_for_member(&app.state, group.id, bob.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    Group::soft_delete(&app.state, group.id, alice.id).await.unwrap();
    let err = load_group_for_member(&app.state, group.id, alice.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn participant_rules() {
    let app = test_app();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let carol = app.user("carol").await;
    let group = app.group(alice.id, &[bob.id]).await;

    let err = Group::add_participant(&app.state, group.id, bob.id, carol.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = Group::add_participant(&app.state, group.id, alice.id, bob.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = Group::remove_participant(&app.state, group.id, bob.id, alice.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = Group::remove_participant(&app.state, group.id, alice.id, alice.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let group = Group::remove_participant(&app.state, group.id, alice.id, bob.id)
        .await
        .unwrap();
    assert!(!group.is_active_participant(bob.id));

    // Re-adding reactivates the existing entry.
    let group = Group::add_participant(&app.state, group.id, alice.id, bob.id)
        .await
        .unwrap();
    assert!(group.is_active_participant(bob.id));
    assert_eq!(group.participants.len(), 2);
}

#[tokio::test]
async fn removal_deactivates_every_duplicate_entry() {
    let app = test_app();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let mut group = app.group(alice.id, &[bob.id]).await;

    let duplicate = group
        .participants
        .iter()
        .find(|p| p.user == Some(bob.id))
        .cloned()
        .unwrap();
    group.participants.push(duplicate);
    app.store.save_group(&group).await.unwrap();

    let group = Group::remove_participant(&app.state, group.id, alice.id, bob.id)
        .await
        .unwrap();
    assert!(!group.is_active_participant(bob.id));
    assert_eq!(group.active_participants(), vec![alice.id]);

    let err = load_group_for_member(&app.state, group.id, bob.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = Group::remove_participant(&app.state, group.id, alice.id, bob.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn members_may_only_remove_themselves() {
    let app = test_app();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let stranger = app.user("stranger").await;
    let group = app.group(alice.id, &[bob.id]).await;

    let err = Group::remove_participant(&app.state, group.id, bob.id, stranger.id)
        .await
        .unwrap_err();
    let AppError::Forbidden(message) = err else {
        panic!("expected forbidden");
    };
    assert_eq!(message, "You can only remove yourself from this group");

    let err = Group::remove_participant(&app.state, group.id, alice.id, stranger.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let group = Group::remove_participant(&app.state, group.id, bob.id, bob.id)
        .await
        .unwrap();
    assert!(!group.is_active_participant(bob.id));
}

#[tokio::test]
async fn listing_only_returns_active_memberships() {
    let app = test_app();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let shared = app.group(alice.id, &[bob.id]).await;
    let left = app.group(alice.id, &[bob.id]).await;
    let _private = app.group(alice.id, &[]).await;

    Group::remove_participant(&app.state, left.id, bob.id, bob.id)
        .await
        .unwrap();

    let groups = Group::list_for_user(&app.state, bob.id).await.unwrap();
    assert_eq!(groups.iter().map(|g| g.id).collect::<Vec<_>>(), vec![shared.id]);
    assert_eq!(Group::list_for_user(&app.state, alice.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn reconcile_repairs_once() {
    let app = test_app();
    let alice = app.user("alice").await;
    let ghost = app.user("ghost").await;
    let group = app.group(alice.id, &[ghost.id]).await;
    let clean = app.group(alice.id, &[]).await;

    let expense = Expense::create(
        &app.state,
        alice.id,
        CreateExpenseRequest {
            group_id: group.id,
            title: "Taxi".to_string(),
            amount: 18.0,
            paid_by: None,
            category: None,
            split_method: SplitMethod::Equally,
            date: None,
            notes: String::new(),
            receipt_image: None,
        },
    )
    .await
    .unwrap();

    app.store.remove_user(ghost.id).await;
    app.store.unlink_expense(group.id, expense.id).await;

    let report = reconcile(app.state.store.as_ref()).await.unwrap();
    assert_eq!(
        report,
        ReconcileReport {
            groups_scanned: 2,
            participants_purged: 1,
            expense_links_repaired: 1,
        }
    );

    let repaired = app.store.find_group(group.id).await.unwrap().unwrap();
    assert_eq!(repaired.expenses, vec![expense.id]);
    assert_eq!(repaired.active_participants(), vec![alice.id]);

    let untouched = app.store.find_group(clean.id).await.unwrap().unwrap();
    assert_eq!(untouched, clean);

    let again = reconcile(app.state.store.as_ref()).await.unwrap();
    assert_eq!(again.participants_purged, 0);
    assert_eq!(again.expense_links_repaired, 0);
}

#[tokio::test]
async fn test_account_enrollment_is_idempotent() {
    let app = test_app();
    let alice = app.user("alice").await;
    let tester = app.user("tester").await;
    let first = app.group(alice.id, &[]).await;
    let second = app.group(alice.id, &[]).await;
    let closed = app.group(alice.id, &[]).await;
    Group::soft_delete(&app.state, closed.id, alice.id).await.unwrap();

    assert_eq!(seed::enroll_test_account(app.state.store.as_ref(), tester.id).await.unwrap(), 2);
    assert_eq!(seed::enroll_test_account(app.state.store.as_ref(), tester.id).await.unwrap(), 0);

    for id in [first.id, second.id] {
        let group = app.store.find_group(id).await.unwrap().unwrap();
        assert!(group.is_active_participant(tester.id));
    }
    let closed = app.store.find_group(closed.id).await.unwrap().unwrap();
    assert!(!closed.is_active_participant(tester.id));

    let err = seed::enroll_test_account(app.state.store.as_ref(), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
