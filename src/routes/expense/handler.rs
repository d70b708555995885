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

use super::model::{CreateExpenseRequest, Expense, UpdateExpenseRequest};

#[axum::debug_handler]
pub async fn create_expense(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    AppJson(req): AppJson<CreateExpenseRequest>,
) -> AppResult<impl IntoResponse> {
    let expense = Expense::create(&state, caller.id, req).await?;
    Ok((
        StatusCode::CREATED,
        message_to_api_response(expense.into_view(&state).await?, "Expense created"),
    ))
}

#[axum::debug_handler]
pub async fn list_group_expenses(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    AppPath(group_id): AppPath<Uuid>,
) -> AppResult<impl IntoResponse> {
    let expenses = Expense::list_for_group(&state, caller.id, group_id).await?;
    Ok(success_to_api_response(
        Expense::into_views(&state, expenses).await?,
    ))
}

#[axum::debug_handler]
pub async fn get_expense(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    AppPath(expense_id): AppPath<Uuid>,
) -> AppResult<impl IntoResponse> {
    let (expense, _) = Expense::find_for_member(&state, caller.id, expense_id).await?;
    Ok(success_to_api_response(expense.into_view(&state).await?))
}

#[axum::debug_handler]
pub async fn update_expense(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    AppPath(expense_id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateExpenseRequest>,
) -> AppResult<impl IntoResponse> {
    let expense = Expense::update(&state, caller.id, expense_id, req).await?;
    Ok(message_to_api_response(
        expense.into_view(&state).await?,
        "Expense updated",
    ))
}

#[axum::debug_handler]
pub async fn delete_expense(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    AppPath(expense_id): AppPath<Uuid>,
) -> AppResult<impl IntoResponse> {
    Expense::delete(&state, caller.id, expense_id).await?;
    Ok(message_to_api_response(
        serde_json::json!({ "id": expense_id }),
        "Expense deleted",
    ))
}
