use axum::{
    extract::{Extension, State},
    response::IntoResponse,
};

use crate::{
    AppState,
    common::{AppJson, message_to_api_response, success_to_api_response},
    error::AppResult,
    middleware::AuthUser,
};

use super::model::{
    self, BroadcastRequest, RegisterTokenRequest, SendNotificationRequest, TopicRequest,
};

#[axum::debug_handler]
pub async fn register_token(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    AppJson(req): AppJson<RegisterTokenRequest>,
) -> AppResult<impl IntoResponse> {
    let registered = model::register_token(&state, caller.id, &req.token).await?;
    Ok(message_to_api_response(registered, "Device token registered"))
}

#[axum::debug_handler]
pub async fn send(
    State(state): State<AppState>,
    Extension(_caller): Extension<AuthUser>,
    AppJson(req): AppJson<SendNotificationRequest>,
) -> AppResult<impl IntoResponse> {
    Ok(success_to_api_response(model::send_to_users(&state, req).await?))
}

#[axum::debug_handler]
pub async fn broadcast(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    AppJson(req): AppJson<BroadcastRequest>,
) -> AppResult<impl IntoResponse> {
    caller.require_admin(&state)?;
    Ok(success_to_api_response(model::broadcast(&state, req).await?))
}

#[axum::debug_handler]
pub async fn subscribe(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    AppJson(req): AppJson<TopicRequest>,
) -> AppResult<impl IntoResponse> {
    let report = model::update_subscription(&state, caller.id, req, true).await?;
    Ok(message_to_api_response(report, "Subscribed to topic"))
}

#[axum::debug_handler]
pub async fn unsubscribe(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    AppJson(req): AppJson<TopicRequest>,
) -> AppResult<impl IntoResponse> {
    let report = model::update_subscription(&state, caller.id, req, false).await?;
    Ok(message_to_api_response(report, "Unsubscribed from topic"))
}
