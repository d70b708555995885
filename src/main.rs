use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use splitify::{
    AppState, config::Config, create_router, events::EventHub, reconcile,
    store::{MemoryStore, PgStore, Store},
};
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

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url)
                .await
                .expect("Failed to connect to Postgres");
            store.migrate().await.expect("Failed to run migrations");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL is not set, using the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let redis = config.redis_url.as_deref().map(|url| {
        redis::Client::open(url).expect("Failed to create Redis client")
    });
    if redis.is_none() {
        tracing::info!("REDIS_URL is not set, group events stay in-process");
    }

    let backend = store.backend_tag();
    let state = AppState::new(config.clone(), store.clone(), EventHub::new(redis));
    if state.push.is_none() {
        tracing::info!("Push delivery is not configured");
    }

    match config.reconcile_interval() {
        Some(every) => {
            tracing::info!(secs = every.as_secs(), "starting reconciliation job");
            reconcile::spawn(store, every);
        }
        None => tracing::info!("Reconciliation job disabled"),
    }

    let app = create_router(state);

    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!(store = backend, "Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app,
    )
    .await
    .expect("Failed to start server");
}
