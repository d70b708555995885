use std::sync::Arc;

use cache::TtlCache;
use config::Config;
use events::EventHub;
use firebase::{FcmGateway, FirebaseTokenVerifier, PhoneTokenVerifier, PushGateway};
use receipt::ReceiptProcessor;
use routes::category::model::Category;
use store::{MemoryStore, Store};

pub mod cache;
pub mod common;
pub mod config;
pub mod error;
pub mod events;
pub mod firebase;
pub mod middleware;
pub mod receipt;
pub mod reconcile;
pub mod router;
pub mod routes;
pub mod seed;
pub mod split;
pub mod store;
pub mod utils;
pub mod validation;

pub use router::create_router;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub category_cache: Arc<TtlCache<Vec<Category>>>,
    pub events: EventHub,
    pub receipts: ReceiptProcessor,
    pub push: Option<Arc<dyn PushGateway>>,
    pub phone_verifier: Option<Arc<dyn PhoneTokenVerifier>>,
}

impl AppState {
    /// Wires the Firebase integrations that the configuration enables.
    pub fn new(config: Config, store: Arc<dyn Store>, events: EventHub) -> Self {
        let phone_verifier = config
            .firebase_project_id
            .clone()
            .map(|project| Arc::new(FirebaseTokenVerifier::new(project)) as Arc<dyn PhoneTokenVerifier>);
        let push = match (&config.firebase_project_id, &config.fcm_access_token) {
            (Some(project), Some(token)) => {
                Some(Arc::new(FcmGateway::new(project.clone(), token.clone())) as Arc<dyn PushGateway>)
            }
            _ => None,
        };

        Self {
            receipts: ReceiptProcessor::new(&config.upload_dir, &config.public_base_url)
                .with_max_encoded_bytes(config.max_receipt_bytes),
            category_cache: Arc::new(TtlCache::new()),
            config,
            store,
            events,
            push,
            phone_verifier,
        }
    }

    /// Memory-backed state without Redis.
    pub fn in_memory(config: Config) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()), EventHub::new(None))
    }

    pub fn with_push(mut self, push: Arc<dyn PushGateway>) -> Self {
        self.push = Some(push);
        self
    }

    pub fn with_phone_verifier(mut self, verifier: Arc<dyn PhoneTokenVerifier>) -> Self {
        self.phone_verifier = Some(verifier);
        self
    }
}
