//! Membership guard applied to every single-group read.
//!
//! Participant entries whose user reference is missing, or points at a user
//! that no longer exists, are dropped from the returned copy only. Nothing is
//! written here; [`crate::reconcile`] persists the same repair in the
//! background.

use std::collections::HashSet;

use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, AppResult},
    store::Store,
};

use super::model::{Group, Participant};

pub async fn load_group_for_member(
    state: &AppState,
    group_id: Uuid,
    caller: Uuid,
) -> AppResult<Group> {
    let mut group = state
        .store
        .find_group(group_id)
        .await?
        .filter(|g| g.active)
        .ok_or_else(|| AppError::not_found("Group not found"))?;

    let purged = filter_unresolvable(state.store.as_ref(), &mut group).await?;
    if purged > 0 {
        tracing::warn!(
            group_id = %group_id,
            purged,
            "group has corrupted participant entries, filtered from response"
        );
    }

    if !group.is_active_participant(caller) {
        return Err(AppError::forbidden("You are not a member of this group"));
    }
    Ok(group)
}

/// Drops participants that cannot be resolved to an existing user and returns
/// how many were removed.
pub async fn filter_unresolvable(store: &dyn Store, group: &mut Group) -> AppResult<usize> {
    let referenced: Vec<Uuid> = group.participants.iter().filter_map(|p| p.user).collect();
    let known: HashSet<Uuid> = store
        .find_users(&referenced)
        .await?
        .into_iter()
        .map(|u| u.id)
        .collect();
    Ok(purge_corrupted(&mut group.participants, &known))
}

pub fn purge_corrupted(participants: &mut Vec<Participant>, known: &HashSet<Uuid>) -> usize {
    let before = participants.len();
    participants.retain(|p| p.user.is_some_and(|user| known.contains(&user)));
    before - participants.len()
}
