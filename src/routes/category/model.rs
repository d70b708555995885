use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, AppResult},
    validation::Validator,
};

pub const UNCATEGORIZED: &str = "Uncategorized";
const DEFAULT_ICON: &str = "pricetag";

// Cache keys
const SYSTEM_CATEGORIES_KEY: &str = "categories:system";
const USER_CATEGORIES_PREFIX: &str = "categories:user:";

fn user_categories_key(user_id: Uuid) -> String {
    format!("{}{}", USER_CATEGORIES_PREFIX, user_id)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub icon: String,
    pub is_system: bool,
    pub created_by: Option<Uuid>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub icon: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub icon: Option<String>,
}

/// System categories first, then alphabetical ignoring case.
pub fn sort_catalog(categories: &mut [Category]) {
    categories.sort_by(|a, b| {
        b.is_system
            .cmp(&a.is_system)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

impl Category {
    pub fn system(name: &str, icon: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            icon: icon.to_string(),
            is_system: true,
            created_by: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn system_categories(state: &AppState) -> AppResult<Vec<Self>> {
        if let Some(cached) = state.category_cache.get(SYSTEM_CATEGORIES_KEY).await {
            tracing::debug!("Get system categories from cache");
            return Ok(cached);
        }

        let mut categories = state.store.system_categories().await?;
        categories.retain(|c| c.active);
        sort_catalog(&mut categories);

        state
            .category_cache
            .set(
                SYSTEM_CATEGORIES_KEY,
                categories.clone(),
                state.config.system_category_cache_ttl(),
            )
            .await;
        Ok(categories)
    }

    pub async fn list_for_user(state: &AppState, user_id: Uuid) -> AppResult<Vec<Self>> {
        let key = user_categories_key(user_id);
        if let Some(cached) = state.category_cache.get(&key).await {
            tracing::debug!(user_id = %user_id, "Get categories from cache");
            return Ok(cached);
        }

        let mut categories = Self::system_categories(state).await?;
        categories.extend(
            state
                .store
                .user_categories(user_id)
                .await?
                .into_iter()
                .filter(|c| c.active),
        );
        sort_catalog(&mut categories);

        state
            .category_cache
            .set(&key, categories.clone(), state.config.category_cache_ttl())
            .await;
        Ok(categories)
    }

    /// Maps a category id or name to the catalog's canonical name. Strings
    /// that match nothing are kept as free text.
    pub async fn resolve(state: &AppState, user_id: Uuid, raw: Option<&str>) -> AppResult<String> {
        let raw = match raw.map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Ok(UNCATEGORIZED.to_string()),
        };

        let catalog = Self::list_for_user(state, user_id).await?;
        let by_id = Uuid::parse_str(raw)
            .ok()
            .and_then(|id| catalog.iter().find(|c| c.id == id));
        let matched = by_id.or_else(|| catalog.iter().find(|c| c.name.eq_ignore_ascii_case(raw)));

        Ok(matched
            .map(|c| c.name.clone())
            .unwrap_or_else(|| raw.to_string()))
    }

    pub async fn create(state: &AppState, user_id: Uuid, req: CreateCategoryRequest) -> AppResult<Self> {
        let name = req.name.trim().to_string();
        let icon = clean_icon(req.icon);

        let mut validator = Validator::new();
        validator
            .required(&name, "name", 50)
            .max_len(&icon, "icon", 50);
        validator.result()?;

        ensure_name_available(state, user_id, &name, None).await?;

        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4(),
            name,
            icon,
            is_system: false,
            created_by: Some(user_id),
            active: true,
            created_at: now,
            updated_at: now,
        };
        state.store.insert_category(&category).await?;
        evict_user(state, user_id).await;
        Ok(category)
    }

    pub async fn update(
        state: &AppState,
        user_id: Uuid,
        category_id: Uuid,
        req: UpdateCategoryRequest,
    ) -> AppResult<Self> {
        let mut category = load_owned(state, user_id, category_id).await?;

        let mut validator = Validator::new();
        if let Some(name) = &req.name {
            validator.required(name, "name", 50);
        }
        if let Some(icon) = &req.icon {
            validator.max_len(icon, "icon", 50);
        }
        validator.result()?;

        if let Some(name) = req.name {
            let name = name.trim().to_string();
            ensure_name_available(state, user_id, &name, Some(category.id)).await?;
            category.name = name;
        }
        if req.icon.is_some() {
            category.icon = clean_icon(req.icon);
        }
        category.updated_at = Utc::now();

        state.store.save_category(&category).await?;
        evict_user(state, user_id).await;
        Ok(category)
    }

    pub async fn soft_delete(state: &AppState, user_id: Uuid, category_id: Uuid) -> AppResult<()> {
        let mut category = load_owned(state, user_id, category_id).await?;
        category.active = false;
        category.updated_at = Utc::now();

        state.store.save_category(&category).await?;
        evict_user(state, user_id).await;
        Ok(())
    }

    /// Seeds the default system catalog, skipping names already present.
    pub async fn setup_system(state: &AppState) -> AppResult<Vec<Self>> {
        let created = crate::seed::seed_system_categories(state.store.as_ref()).await?;
        evict_system(state).await;
        Ok(created)
    }
}

fn clean_icon(icon: Option<String>) -> String {
    icon.map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .unwrap_or_else(|| DEFAULT_ICON.to_string())
}

async fn load_owned(state: &AppState, user_id: Uuid, category_id: Uuid) -> AppResult<Category> {
    let category = state
        .store
        .find_category(category_id)
        .await?
        .filter(|c| c.active)
        .ok_or_else(|| AppError::not_found("Category not found"))?;

    if category.is_system {
        return Err(AppError::forbidden("System categories cannot be modified"));
    }
    if category.created_by != Some(user_id) {
        return Err(AppError::forbidden("You can only modify your own categories"));
    }
    Ok(category)
}

/// A name must not collide, case-insensitively, with an active system
/// category or with another of the creator's own.
async fn ensure_name_available(
    state: &AppState,
    user_id: Uuid,
    name: &str,
    except: Option<Uuid>,
) -> AppResult<()> {
    let same_name =
        |c: &Category| c.active && Some(c.id) != except && c.name.to_lowercase() == name.to_lowercase();

    if state.store.system_categories().await?.iter().any(same_name) {
        return Err(AppError::bad_request(format!(
            "\"{}\" is already a system category",
            name
        )));
    }
    if state.store.user_categories(user_id).await?.iter().any(same_name) {
        return Err(AppError::bad_request(format!(
            "You already have a category named \"{}\"",
            name
        )));
    }
    Ok(())
}

async fn evict_user(state: &AppState, user_id: Uuid) {
    state.category_cache.delete(&user_categories_key(user_id)).await;
}

/// Per-user entries embed the system list, so they go too.
async fn evict_system(state: &AppState) {
    state.category_cache.delete(SYSTEM_CATEGORIES_KEY).await;
    state.category_cache.delete_prefix(USER_CATEGORIES_PREFIX).await;
}
