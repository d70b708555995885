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

use super::model::{Category, CreateCategoryRequest, UpdateCategoryRequest};

#[axum::debug_handler]
pub async fn create_category(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    AppJson(req): AppJson<CreateCategoryRequest>,
) -> AppResult<impl IntoResponse> {
    let category = Category::create(&state, caller.id, req).await?;
    Ok((
        StatusCode::CREATED,
        message_to_api_response(category, "Category created"),
    ))
}

#[axum::debug_handler]
pub async fn list_categories(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> AppResult<impl IntoResponse> {
    Ok(success_to_api_response(
        Category::list_for_user(&state, caller.id).await?,
    ))
}

#[axum::debug_handler]
pub async fn list_system_categories(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    Ok(success_to_api_response(
        Category::system_categories(&state).await?,
    ))
}

#[axum::debug_handler]
pub async fn update_category(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    AppPath(category_id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateCategoryRequest>,
) -> AppResult<impl IntoResponse> {
    let category = Category::update(&state, caller.id, category_id, req).await?;
    Ok(message_to_api_response(category, "Category updated"))
}

#[axum::debug_handler]
pub async fn delete_category(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    AppPath(category_id): AppPath<Uuid>,
) -> AppResult<impl IntoResponse> {
    Category::soft_delete(&state, caller.id, category_id).await?;
    Ok(message_to_api_response(
        serde_json::json!({ "id": category_id }),
        "Category deleted",
    ))
}

#[axum::debug_handler]
pub async fn setup_system_categories(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> AppResult<impl IntoResponse> {
    caller.require_admin(&state)?;
    let created = Category::setup_system(&state).await?;
    let message = format!("{} system categories created", created.len());
    Ok(message_to_api_response(created, &message))
}
