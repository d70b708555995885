use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    AppState,
    common::{AppJson, AppPath, message_to_api_response, success_to_api_response},
    error::AppResult,
    middleware::AuthUser,
};

use super::{
    guard::load_group_for_member,
    model::{AddParticipantRequest, CreateGroupRequest, Group, UpdateGroupRequest},
};

#[axum::debug_handler]
pub async fn create_group(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    AppJson(req): AppJson<CreateGroupRequest>,
) -> AppResult<impl IntoResponse> {
    let group = Group::create(&state, caller.id, req).await?;
    Ok((
        StatusCode::CREATED,
        message_to_api_response(group.into_view(&state).await?, "Group created"),
    ))
}

#[axum::debug_handler]
pub async fn list_groups(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> AppResult<impl IntoResponse> {
    let groups = Group::list_for_user(&state, caller.id).await?;
    let mut views = Vec::with_capacity(groups.len());
    for group in groups {
        views.push(group.into_view(&state).await?);
    }
    Ok(success_to_api_response(views))
}

#[axum::debug_handler]
pub async fn get_group(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    AppPath(group_id): AppPath<Uuid>,
) -> AppResult<impl IntoResponse> {
    let group = load_group_for_member(&state, group_id, caller.id).await?;
    Ok(success_to_api_response(group.into_view(&state).await?))
}

#[axum::debug_handler]
pub async fn update_group(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    AppPath(group_id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateGroupRequest>,
) -> AppResult<impl IntoResponse> {
    let group = Group::update(&state, group_id, caller.id, req).await?;
    Ok(message_to_api_response(
        group.into_view(&state).await?,
        "Group updated",
    ))
}

#[axum::debug_handler]
pub async fn delete_group(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    AppPath(group_id): AppPath<Uuid>,
) -> AppResult<impl IntoResponse> {
    Group::soft_delete(&state, group_id, caller.id).await?;
    Ok(message_to_api_response(
        serde_json::json!({ "id": group_id }),
        "Group deleted",
    ))
}

#[axum::debug_handler]
pub async fn add_participant(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    AppPath(group_id): AppPath<Uuid>,
    AppJson(req): AppJson<AddParticipantRequest>,
) -> AppResult<impl IntoResponse> {
    let group = Group::add_participant(&state, group_id, caller.id, req.user_id).await?;
    Ok(message_to_api_response(
        group.into_view(&state).await?,
        "Participant added",
    ))
}

#[axum::debug_handler]
pub async fn remove_participant(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    AppPath((group_id, user_id)): AppPath<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    let group = Group::remove_participant(&state, group_id, caller.id, user_id).await?;
    Ok(message_to_api_response(
        group.into_view(&state).await?,
        "Participant removed",
    ))
}
