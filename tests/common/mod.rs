#![allow(dead_code)]

use std::sync::Arc;

use splitify::{
    AppState,
    config::Config,
    events::EventHub,
    routes::{
        auth::model::{RegisterRequest, User},
        group::model::{CreateGroupRequest, Group},
    },
    store::MemoryStore,
};
use tempdir::TempDir;
use uuid::Uuid;

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub uploads: TempDir,
}

pub fn test_config(uploads: &TempDir) -> Config {
    Config {
        bcrypt_cost: 4,
        upload_dir: uploads.path().to_string_lossy().into_owned(),
        ..Config::default()
    }
}

pub fn test_app() -> TestApp {
    test_app_with(|_| {})
}

pub fn test_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let uploads = TempDir::new("splitify").expect("temp dir");
    let mut config = test_config(&uploads);
    configure(&mut config);

    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(config, store.clone(), EventHub::new(None));
    TestApp {
        state,
        store,
        uploads,
    }
}

impl TestApp {
    pub async fn user(&self, username: &str) -> User {
        User::register(
            &self.state,
            RegisterRequest {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password: "secret-password".to_string(),
                phone: None,
            },
        )
        .await
        .expect("register user")
    }

    pub async fn group(&self, owner: Uuid, members: &[Uuid]) -> Group {
        let mut group = Group::create(
            &self.state,
            owner,
            CreateGroupRequest {
                name: "Weekend trip".to_string(),
                description: String::new(),
                image: None,
                currency: Some("EUR".to_string()),
                categories: Vec::new(),
            },
        )
        .await
        .expect("create group");

        for member in members {
            group = Group::add_participant(&self.state, group.id, owner, *member)
                .await
                .expect("add participant");
        }
        group
    }
}
