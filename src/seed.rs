//! Setup steps that run outside request handling.

use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    routes::{category::model::Category, group::model::Participant},
    store::Store,
};

/// `(name, icon)` pairs of the system catalog.
pub const DEFAULT_SYSTEM_CATEGORIES: &[(&str, &str)] = &[
    ("Food & Drink", "restaurant"),
    ("Groceries", "cart"),
    ("Transport", "car"),
    ("Housing", "home"),
    ("Utilities", "flash"),
    ("Entertainment", "film"),
    ("Shopping", "bag"),
    ("Travel", "airplane"),
    ("Health", "medkit"),
    ("Uncategorized", "pricetag"),
];

/// Inserts every default system category whose name is not present yet and
/// returns the ones created. Running it twice creates nothing the second time.
pub async fn seed_system_categories(store: &dyn Store) -> AppResult<Vec<Category>> {
    let existing: HashSet<String> = store
        .system_categories()
        .await?
        .into_iter()
        .filter(|c| c.active)
        .map(|c| c.name.to_lowercase())
        .collect();

    let mut created = Vec::new();
    for (name, icon) in DEFAULT_SYSTEM_CATEGORIES {
        if existing.contains(&name.to_lowercase()) {
            continue;
        }
        let category = Category::system(name, icon);
        store.insert_category(&category).await?;
        created.push(category);
    }

    tracing::info!(created = created.len(), "seeded system categories");
    Ok(created)
}

/// Makes `account` an active participant of every active group.
///
/// Fixture step for a shared test identity; gated on `SEED_TEST_ACCOUNT_ID`
/// by the `seed` binary. Returns the number of groups changed.
pub async fn enroll_test_account(store: &dyn Store, account: Uuid) -> AppResult<usize> {
    if store.find_user(account).await?.is_none() {
        return Err(AppError::not_found(format!(
            "Test account {} does not exist",
            account
        )));
    }

    let mut changed = 0;
    for mut group in store.all_groups().await? {
        if !group.active || group.is_active_participant(account) {
            continue;
        }

        let now = Utc::now();
        match group
            .participants
            .iter_mut()
            .find(|p| p.user == Some(account))
        {
            Some(existing) => existing.active = true,
            None => group.participants.push(Participant {
                user: Some(account),
                active: true,
                joined_at: now,
            }),
        }
        group.updated_at = now;
        store.save_group(&group).await?;
        changed += 1;
    }

    tracing::info!(account = %account, groups = changed, "enrolled test account");
    Ok(changed)
}
