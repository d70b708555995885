mod common;

use approx::assert_relative_eq;
use splitify::{
    error::AppError,
    events::GroupEventKind,
    routes::expense::model::{CreateExpenseRequest, Expense, UpdateExpenseRequest},
    split::SplitMethod,
    store::{ExpenseStore, GroupStore},
};
use uuid::Uuid;

use common::test_app;

fn expense_request(group_id: Uuid, amount: f64) -> CreateExpenseRequest {
    CreateExpenseRequest {
        group_id,
        title: "Dinner".to_string(),
        amount,
        paid_by: None,
        category: None,
        split_method: SplitMethod::Equally,
        date: None,
        notes: String::new(),
        receipt_image: None,
    }
}

#[tokio::test]
async fn equal_split_covers_active_participants() {
    let app = test_app();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let carol = app.user("carol").await;
    let group = app.group(alice.id, &[bob.id, carol.id]).await;

    let expense = Expense::create(&app.state, alice.id, expense_request(group.id, 100.0))
        .await
        .unwrap();

    assert_eq!(expense.paid_by, alice.id);
    assert_eq!(expense.category, "Uncategorized");
    assert_eq!(expense.splits.len(), 3);
    let total: f64 = expense.splits.iter().map(|s| s.amount).sum();
    assert_relative_eq!(total, 100.0, epsilon = 1e-9);
    for split in &expense.splits {
        assert_relative_eq!(split.amount, 100.0 / 3.0);
        assert!(!split.paid);
    }

    let stored = app.store.find_group(group.id).await.unwrap().unwrap();
    assert_eq!(stored.expenses, vec![expense.id]);
}

#[tokio::test]
async fn removed_participants_are_left_out_of_new_splits() {
    let app = test_app();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let group = app.group(alice.id, &[bob.id]).await;

    splitify::routes::group::model::Group::remove_participant(&app.state, group.id, bob.id, bob.id)
        .await
        .unwrap();

    let expense = Expense::create(&app.state, alice.id, expense_request(group.id, 30.0))
        .await
        .unwrap();
    assert_eq!(expense.splits.len(), 1);
    assert_eq!(expense.splits[0].user, alice.id);

    let err = Expense::list_for_group(&app.state, bob.id, group.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn outsiders_and_foreign_payers_are_rejected() {
    let app = test_app();
    let alice = app.user("alice").await;
    let mallory = app.user("mallory").await;
    let group = app.group(alice.id, &[]).await;

    let err = Expense::create(&app.state, mallory.id, expense_request(group.id, 10.0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let mut req = expense_request(group.id, 10.0);
    req.paid_by = Some(mallory.id);
    let err = Expense::create(&app.state, alice.id, req).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = Expense::create(&app.state, alice.id, expense_request(Uuid::new_v4(), 10.0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn invalid_input_reports_every_field() {
    let app = test_app();
    let alice = app.user("alice").await;
    let group = app.group(alice.id, &[]).await;

    let mut req = expense_request(group.id, -5.0);
    req.title = "   ".to_string();
    let err = Expense::create(&app.state, alice.id, req).await.unwrap_err();
    let AppError::Validation(errors) = err else {
        panic!("expected validation error");
    };
    let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
    assert_eq!(fields, vec!["title", "amount"]);
}

#[tokio::test]
async fn unimplemented_methods_fall_back_to_equal_division() {
    let app = test_app();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let group = app.group(alice.id, &[bob.id]).await;

    let mut req = expense_request(group.id, 50.0);
    req.split_method = SplitMethod::Percentage;
    let expense = Expense::create(&app.state, alice.id, req).await.unwrap();
    assert_eq!(expense.split_method, SplitMethod::Percentage);
    assert!(expense.splits.iter().all(|s| s.amount == 25.0));

    let view = expense.into_view(&app.state).await.unwrap();
    assert!(view.split_fallback);
    assert_eq!(view.paid_by.username, "alice");
}

#[tokio::test]
async fn deleted_expense_is_gone_everywhere() {
    let app = test_app();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let group = app.group(alice.id, &[bob.id]).await;

    let kept = Expense::create(&app.state, alice.id, expense_request(group.id, 10.0))
        .await
        .unwrap();
    let doomed = Expense::create(&app.state, bob.id, expense_request(group.id, 20.0))
        .await
        .unwrap();

    let err = Expense::delete(&app.state, alice.id, doomed.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    Expense::delete(&app.state, bob.id, doomed.id).await.unwrap();

    let err = Expense::find_for_member(&app.state, alice.id, doomed.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let listed = Expense::list_for_group(&app.state, alice.id, group.id)
        .await
        .unwrap();
    assert_eq!(listed.iter().map(|e| e.id).collect::<Vec<_>>(), vec![kept.id]);

    let stored = app.store.find_group(group.id).await.unwrap().unwrap();
    assert_eq!(stored.expenses, vec![kept.id]);
    assert!(app.store.find_expense(doomed.id).await.unwrap().is_none());
}

#[tokio::test]
async fn amount_change_recomputes_splits() {
    let app = test_app();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let group = app.group(alice.id, &[bob.id]).await;

    let expense = Expense::create(&app.state, alice.id, expense_request(group.id, 10.0))
        .await
        .unwrap();

    let updated = Expense::update(
        &app.state,
        alice.id,
        expense.id,
        UpdateExpenseRequest {
            amount: Some(42.0),
            category: Some("groceries".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(updated.amount, 42.0);
    assert!(updated.splits.iter().all(|s| s.amount == 21.0));
    // Free text when the catalog has no match.
    assert_eq!(updated.category, "groceries");

    let stored = app.store.find_expense(expense.id).await.unwrap().unwrap();
    assert_eq!(stored, updated);
}

#[tokio::test]
async fn outsiders_cannot_modify_expenses() {
    let app = test_app();
    let alice = app.user("alice").await;
    let mallory = app.user("mallory").await;
    let group = app.group(alice.id, &[]).await;
    let expense = Expense::create(&app.state, alice.id, expense_request(group.id, 10.0))
        .await
        .unwrap();

    let err = Expense::update(
        &app.state,
        mallory.id,
        expense.id,
        UpdateExpenseRequest {
            amount: Some(1.0),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = Expense::delete(&app.state, mallory.id, expense.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let stored = app.store.find_expense(expense.id).await.unwrap().unwrap();
    assert_eq!(stored, expense);
}

#[tokio::test]
async fn only_creator_or_payer_may_edit() {
    let app = test_app();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let carol = app.user("carol").await;
    let group = app.group(alice.id, &[bob.id, carol.id]).await;

    let mut req = expense_request(group.id, 60.0);
    req.paid_by = Some(bob.id);
    let expense = Expense::create(&app.state, alice.id, req).await.unwrap();

    let err = Expense::update(
        &app.state,
        carol.id,
        expense.id,
        UpdateExpenseRequest {
            title: Some("Mine now".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let updated = Expense::update(
        &app.state,
        bob.id,
        expense.id,
        UpdateExpenseRequest {
            title: Some("Brunch".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.title, "Brunch");
    assert_eq!(updated.splits, expense.splits);
}

#[tokio::test]
async fn recomputed_splits_follow_current_membership() {
    let app = test_app();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let carol = app.user("carol").await;
    let group = app.group(alice.id, &[bob.id]).await;

    let expense = Expense::create(&app.state, alice.id, expense_request(group.id, 60.0))
        .await
        .unwrap();
    assert_eq!(expense.splits.len(), 2);

    splitify::routes::group::model::Group::add_participant(&app.state, group.id, alice.id, carol.id)
        .await
        .unwrap();

    // A title edit leaves the stored splits alone.
    let renamed = Expense::update(
        &app.state,
        alice.id,
        expense.id,
        UpdateExpenseRequest {
            title: Some("Dinner out".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(renamed.splits, expense.splits);

    let updated = Expense::update(
        &app.state,
        alice.id,
        expense.id,
        UpdateExpenseRequest {
            split_method: Some(SplitMethod::Custom),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.split_method, SplitMethod::Custom);
    assert_eq!(
        updated.splits.iter().map(|s| (s.user, s.amount)).collect::<Vec<_>>(),
        vec![(alice.id, 20.0), (bob.id, 20.0), (carol.id, 20.0)]
    );

    splitify::routes::group::model::Group::remove_participant(&app.state, group.id, alice.id, bob.id)
        .await
        .unwrap();

    let updated = Expense::update(
        &app.state,
        alice.id,
        expense.id,
        UpdateExpenseRequest {
            amount: Some(80.0),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(
        updated.splits.iter().map(|s| (s.user, s.amount)).collect::<Vec<_>>(),
        vec![(alice.id, 40.0), (carol.id, 40.0)]
    );
}

#[tokio::test]
async fn list_is_newest_first() {
    let app = test_app();
    let alice = app.user("alice").await;
    let group = app.group(alice.id, &[]).await;

    let mut older = expense_request(group.id, 1.0);
    older.date = Some(chrono::Utc::now() - chrono::Duration::days(3));
    let older = Expense::create(&app.state, alice.id, older).await.unwrap();
    let newer = Expense::create(&app.state, alice.id, expense_request(group.id, 2.0))
        .await
        .unwrap();

    let listed = Expense::list_for_group(&app.state, alice.id, group.id)
        .await
        .unwrap();
    assert_eq!(
        listed.iter().map(|e| e.id).collect::<Vec<_>>(),
        vec![newer.id, older.id]
    );
}

#[tokio::test]
async fn mutations_are_published_to_group_subscribers() {
    let app = test_app();
    let alice = app.user("alice").await;
    let group = app.group(alice.id, &[]).await;
    let mut events = app.state.events.subscribe(group.id);

    let expense = Expense::create(&app.state, alice.id, expense_request(group.id, 12.5))
        .await
        .unwrap();
    Expense::delete(&app.state, alice.id, expense.id).await.unwrap();

    let added = events.recv().await.unwrap();
    assert_eq!(added.event, GroupEventKind::ExpenseAdded);
    assert_eq!(added.expense_id, expense.id);
    assert_eq!(added.expense.as_ref().map(|e| e.amount), Some(12.5));

    let deleted = events.recv().await.unwrap();
    assert_eq!(deleted.event, GroupEventKind::ExpenseDeleted);
    assert_eq!(deleted.group_id, group.id);
    assert!(deleted.expense.is_none());
}

#[tokio::test]
async fn broken_receipt_does_not_block_creation() {
    let app = test_app();
    let alice = app.user("alice").await;
    let group = app.group(alice.id, &[]).await;

    let mut req = expense_request(group.id, 9.0);
    req.receipt_image = Some("definitely not an image".to_string());
    let expense = Expense::create(&app.state, alice.id, req).await.unwrap();
    assert!(expense.receipt.is_none());
}

#[tokio::test]
async fn three_way_dinner() {
    let app = test_app();
    let a = app.user("anna").await;
    let b = app.user("ben").await;
    let c = app.user("cleo").await;
    let group = app.group(a.id, &[b.id, c.id]).await;
    let mut events = app.state.events.subscribe(group.id);

    let expense = Expense::create(&app.state, a.id, expense_request(group.id, 90.0))
        .await
        .unwrap();

    assert_eq!(expense.amount, 90.0);
    assert_eq!(expense.paid_by, a.id);
    assert_eq!(
        expense.splits.iter().map(|s| (s.user, s.amount)).collect::<Vec<_>>(),
        vec![(a.id, 30.0), (b.id, 30.0), (c.id, 30.0)]
    );

    assert_eq!(events.recv().await.unwrap().event, GroupEventKind::ExpenseAdded);
    assert!(events.try_recv().is_err());
}
