use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, AppResult},
    routes::auth::model::UserSummary,
    validation::{Validator, is_valid_currency},
};

use super::guard::load_group_for_member;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    /// `None` marks a dangling reference left behind by a removed user.
    pub user: Option<Uuid>,
    pub active: bool,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub image: Option<String>,
    pub currency: String,
    pub categories: Vec<String>,
    pub owner: Uuid,
    pub participants: Vec<Participant>,
    pub expenses: Vec<Uuid>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub image: Option<String>,
    pub currency: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateGroupRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub currency: Option<String>,
    pub categories: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct AddParticipantRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ParticipantView {
    pub user: UserSummary,
    pub active: bool,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct GroupView {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub image: Option<String>,
    pub currency: String,
    pub categories: Vec<String>,
    pub owner: UserSummary,
    pub participants: Vec<ParticipantView>,
    pub expenses: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const DEFAULT_CURRENCY: &str = "USD";

impl Group {
    pub fn is_active_participant(&self, user_id: Uuid) -> bool {
        self.participants
            .iter()
            .any(|p| p.active && p.user == Some(user_id))
    }

    /// Users currently sharing the group's expenses, in join order.
    pub fn active_participants(&self) -> Vec<Uuid> {
        self.participants
            .iter()
            .filter(|p| p.active)
            .filter_map(|p| p.user)
            .collect()
    }

    pub async fn create(state: &AppState, owner: Uuid, req: CreateGroupRequest) -> AppResult<Self> {
        let currency = req
            .currency
            .as_deref()
            .map(|c| c.trim().to_uppercase())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        let mut validator = Validator::new();
        validator
            .required(&req.name, "name", 100)
            .max_len(&req.description, "description", 500)
            .check(
                is_valid_currency(&currency),
                "currency",
                "Currency must be a 3-letter code",
            );
        validator.result()?;

        let now = Utc::now();
        let group = Group {
            id: Uuid::new_v4(),
            name: req.name.trim().to_string(),
            description: req.description.trim().to_string(),
            image: req.image,
            currency,
            categories: clean_tags(req.categories),
            owner,
            participants: vec![Participant {
                user: Some(owner),
                active: true,
                joined_at: now,
            }],
            expenses: Vec::new(),
            active: true,
            created_at: now,
            updated_at: now,
        };
        state.store.insert_group(&group).await?;

        tracing::info!(group_id = %group.id, owner = %owner, "created group");
        Ok(group)
    }

    pub async fn list_for_user(state: &AppState, user_id: Uuid) -> AppResult<Vec<Self>> {
        let mut groups = state.store.groups_for_user(user_id).await?;
        groups.retain(|g| g.active && g.is_active_participant(user_id));
        groups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(groups)
    }

    pub async fn update(
        state: &AppState,
        group_id: Uuid,
        caller: Uuid,
        req: UpdateGroupRequest,
    ) -> AppResult<Self> {
        let mut group = load_owned_group(state, group_id, caller).await?;

        let currency = req.currency.as_deref().map(|c| c.trim().to_uppercase());
        let mut validator = Validator::new();
        if let Some(name) = &req.name {
            validator.required(name, "name", 100);
        }
        if let Some(description) = &req.description {
            validator.max_len(description, "description", 500);
        }
        if let Some(currency) = &currency {
            validator.check(
                is_valid_currency(currency),
                "currency",
                "Currency must be a 3-letter code",
            );
        }
        validator.result()?;

        if let Some(name) = req.name {
            group.name = name.trim().to_string();
        }
        if let Some(description) = req.description {
            group.description = description.trim().to_string();
        }
        if let Some(image) = req.image {
            group.image = Some(image).filter(|i| !i.trim().is_empty());
        }
        if let Some(currency) = currency {
            group.currency = currency;
        }
        if let Some(categories) = req.categories {
            group.categories = clean_tags(categories);
        }
        group.updated_at = Utc::now();
        state.store.save_group(&group).await?;
        Ok(group)
    }

    pub async fn soft_delete(state: &AppState, group_id: Uuid, caller: Uuid) -> AppResult<()> {
        let mut group = load_owned_group(state, group_id, caller).await?;
        group.active = false;
        group.updated_at = Utc::now();
        state.store.save_group(&group).await?;

        tracing::info!(group_id = %group_id, "soft-deleted group");
        Ok(())
    }

    pub async fn add_participant(
        state: &AppState,
        group_id: Uuid,
        caller: Uuid,
        user_id: Uuid,
    ) -> AppResult<Self> {
        let mut group = load_owned_group(state, group_id, caller).await?;

        if state.store.find_user(user_id).await?.is_none() {
            return Err(AppError::not_found("User not found"));
        }
        if group.is_active_participant(user_id) {
            return Err(AppError::bad_request("User is already a participant"));
        }

        let now = Utc::now();
        match group
            .participants
            .iter_mut()
            .find(|p| p.user == Some(user_id))
        {
            Some(existing) => {
                existing.active = true;
                existing.joined_at = now;
            }
            None => group.participants.push(Participant {
                user: Some(user_id),
                active: true,
                joined_at: now,
            }),
        }
        group.updated_at = now;
        state.store.save_group(&group).await?;
        Ok(group)
    }

    pub async fn remove_participant(
        state: &AppState,
        group_id: Uuid,
        caller: Uuid,
        user_id: Uuid,
    ) -> AppResult<Self> {
        let mut group = load_group_for_member(state, group_id, caller).await?;

        if caller != group.owner && caller != user_id {
            return Err(AppError::forbidden(
                "You can only remove yourself from this group",
            ));
        }
        if user_id == group.owner {
            return Err(AppError::bad_request("The group owner cannot be removed"));
        }

        // Duplicate entries for one user all go inactive together.
        let mut removed = 0;
        for participant in group
            .participants
            .iter_mut()
            .filter(|p| p.active && p.user == Some(user_id))
        {
            participant.active = false;
            removed += 1;
        }
        if removed == 0 {
            return Err(AppError::not_found("Participant not found"));
        }

        group.updated_at = Utc::now();
        state.store.save_group(&group).await?;
        Ok(group)
    }

    pub async fn into_view(self, state: &AppState) -> AppResult<GroupView> {
        let mut ids: Vec<Uuid> = self.participants.iter().filter_map(|p| p.user).collect();
        ids.push(self.owner);
        let users = UserSummary::lookup(state, &ids).await?;
        let summary = |id: Uuid| {
            users
                .get(&id)
                .cloned()
                .unwrap_or_else(|| UserSummary::unknown(id))
        };

        Ok(GroupView {
            id: self.id,
            name: self.name,
            description: self.description,
            image: self.image,
            currency: self.currency,
            categories: self.categories,
            owner: summary(self.owner),
            participants: self
                .participants
                .iter()
                .filter_map(|p| {
                    p.user.map(|user| ParticipantView {
                        user: summary(user),
                        active: p.active,
                        joined_at: p.joined_at,
                    })
                })
                .collect(),
            expenses: self.expenses,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

async fn load_owned_group(state: &AppState, group_id: Uuid, caller: Uuid) -> AppResult<Group> {
    let group = load_group_for_member(state, group_id, caller).await?;
    if group.owner != caller {
        return Err(AppError::forbidden("Only the group owner can do this"));
    }
    Ok(group)
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !cleaned.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
            cleaned.push(tag);
        }
    }
    cleaned
}
