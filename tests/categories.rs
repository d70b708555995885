mod common;

use splitify::{
    error::AppError,
    routes::category::model::{Category, CreateCategoryRequest, UNCATEGORIZED, UpdateCategoryRequest},
    seed::DEFAULT_SYSTEM_CATEGORIES,
};

use common::test_app;

fn named(name: &str) -> CreateCategoryRequest {
    CreateCategoryRequest {
        name: name.to_string(),
        icon: None,
    }
}

#[tokio::test]
async fn own_names_are_unique_per_creator() {
    let app = test_app();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;

    Category::create(&app.state, alice.id, named("Coffee")).await.unwrap();
    Category::create(&app.state, bob.id, named("coffee")).await.unwrap();

    let err = Category::create(&app.state, alice.id, named(" COFFEE "))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn system_names_cannot_be_shadowed() {
    let app = test_app();
    let alice = app.user("alice").await;
    Category::setup_system(&app.state).await.unwrap();

    let err = Category::create(&app.state, alice.id, named("transport"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let own = Category::create(&app.state, alice.id, named("Ferries")).await.unwrap();
    let err = Category::update(
        &app.state,
        alice.id,
        own.id,
        UpdateCategoryRequest {
            name: Some("TRANSPORT".to_string()),
            icon: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let catalog = Category::list_for_user(&app.state, alice.id).await.unwrap();
    let transports = catalog
        .iter()
        .filter(|c| c.name.eq_ignore_ascii_case("transport"))
        .count();
    assert_eq!(transports, 1);
}

#[tokio::test]
async fn deleted_names_can_be_reused() {
    let app = test_app();
    let alice = app.user("alice").await;

    let first = Category::create(&app.state, alice.id, named("Gym")).await.unwrap();
    Category::soft_delete(&app.state, alice.id, first.id).await.unwrap();
    let second = Category::create(&app.state, alice.id, named("Gym")).await.unwrap();
    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn setup_is_idempotent_and_refreshes_cached_catalogs() {
    let app = test_app();
    let alice = app.user("alice").await;

    // Warm the per-user cache before the system catalog exists.
    assert!(Category::list_for_user(&app.state, alice.id).await.unwrap().is_empty());

    let created = Category::setup_system(&app.state).await.unwrap();
    assert_eq!(created.len(), DEFAULT_SYSTEM_CATEGORIES.len());
    assert!(Category::setup_system(&app.state).await.unwrap().is_empty());

    let catalog = Category::list_for_user(&app.state, alice.id).await.unwrap();
    assert_eq!(catalog.len(), DEFAULT_SYSTEM_CATEGORIES.len());
    assert!(catalog.iter().all(|c| c.is_system));
}

#[tokio::test]
async fn catalog_lists_system_before_own_entries() {
    let app = test_app();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    Category::setup_system(&app.state).await.unwrap();

    Category::create(&app.state, alice.id, named("Aardvark food")).await.unwrap();
    Category::create(&app.state, bob.id, named("Bob only")).await.unwrap();

    let catalog = Category::list_for_user(&app.state, alice.id).await.unwrap();
    assert_eq!(catalog.len(), DEFAULT_SYSTEM_CATEGORIES.len() + 1);
    assert_eq!(catalog.last().unwrap().name, "Aardvark food");
    assert!(catalog.iter().all(|c| c.name != "Bob only"));
}

#[tokio::test]
async fn resolve_maps_ids_and_names_to_canonical_names() {
    let app = test_app();
    let alice = app.user("alice").await;
    Category::setup_system(&app.state).await.unwrap();
    let own = Category::create(&app.state, alice.id, named("Board games")).await.unwrap();

    let id = own.id.to_string();
    assert_eq!(
        Category::resolve(&app.state, alice.id, Some(id.as_str())).await.unwrap(),
        "Board games"
    );
    assert_eq!(
        Category::resolve(&app.state, alice.id, Some("groceries")).await.unwrap(),
        "Groceries"
    );
    assert_eq!(
        Category::resolve(&app.state, alice.id, Some("Llama rental")).await.unwrap(),
        "Llama rental"
    );
    assert_eq!(
        Category::resolve(&app.state, alice.id, Some("  ")).await.unwrap(),
        UNCATEGORIZED
    );
    assert_eq!(Category::resolve(&app.state, alice.id, None).await.unwrap(), UNCATEGORIZED);
}

#[tokio::test]
async fn only_the_creator_can_change_a_category() {
    let app = test_app();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let created = Category::setup_system(&app.state).await.unwrap();
    let own = Category::create(&app.state, alice.id, named("Snacks")).await.unwrap();

    let err = Category::update(&app.state, bob.id, own.id, UpdateCategoryRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = Category::soft_delete(&app.state, alice.id, created[0].id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let renamed = Category::update(
        &app.state,
        alice.id,
        own.id,
        UpdateCategoryRequest {
            name: Some("Treats".to_string()),
            icon: Some("ice-cream".to_string()),
        },
    )
    .await
    .unwrap();
    assert_eq!(renamed.name, "Treats");
    assert_eq!(renamed.icon, "ice-cream");

    // The cached catalog reflects the rename.
    let catalog = Category::list_for_user(&app.state, alice.id).await.unwrap();
    assert!(catalog.iter().any(|c| c.name == "Treats"));
}
