use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    common::{AppJson, message_to_api_response, success_to_api_response},
    error::AppResult,
    middleware::AuthUser,
};

use super::model::{LoginRequest, PhoneTokenRequest, RegisterRequest, User};

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    AppJson(req): AppJson<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    let user = User::register(&state, req).await?;
    let auth = user.issue_token(&state)?;
    Ok((
        StatusCode::CREATED,
        message_to_api_response(auth, "User registered successfully"),
    ))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let user = User::login(&state, req).await?;
    tracing::info!(user_id = %user.id, "user logged in");
    Ok(success_to_api_response(user.issue_token(&state)?))
}

#[axum::debug_handler]
pub async fn phone_login(
    State(state): State<AppState>,
    AppJson(req): AppJson<PhoneTokenRequest>,
) -> AppResult<impl IntoResponse> {
    let user = User::phone_login(&state, req).await?;
    tracing::info!(user_id = %user.id, "user logged in with phone");
    Ok(success_to_api_response(user.issue_token(&state)?))
}

#[axum::debug_handler]
pub async fn link_phone(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    AppJson(req): AppJson<PhoneTokenRequest>,
) -> AppResult<impl IntoResponse> {
    let user = User::link_phone(&state, caller.id, req).await?;
    Ok(message_to_api_response(user, "Phone number linked"))
}

#[axum::debug_handler]
pub async fn me(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> AppResult<impl IntoResponse> {
    Ok(success_to_api_response(User::find(&state, caller.id).await?))
}
