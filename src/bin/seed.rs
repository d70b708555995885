//! Prepares a database outside of request handling: seeds the system
//! category catalog and, when `SEED_TEST_ACCOUNT_ID` is set, enrolls that
//! account in every active group.

use splitify::{config::Config, seed, store::PgStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");
    let database_url = config
        .database_url
        .as_deref()
        .expect("DATABASE_URL must be set to seed a database");

    let store = PgStore::connect(database_url)
        .await
        .expect("Failed to connect to Postgres");
    store.migrate().await.expect("Failed to run migrations");

    let created = seed::seed_system_categories(&store)
        .await
        .expect("Failed to seed system categories");
    tracing::info!(created = created.len(), "system categories ready");

    if let Some(account) = config.seed_test_account_id {
        let groups = seed::enroll_test_account(&store, account)
            .await
            .expect("Failed to enroll test account");
        tracing::info!(account = %account, groups, "test account enrolled");
    }
}
