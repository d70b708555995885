use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde_json::json;
use tower_http::services::ServeDir;

use crate::{
    AppState,
    common::success_to_api_response,
    middleware::{auth_middleware, log_errors},
    routes::{auth, category, expense, group, notification},
};

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/phone-login", post(auth::phone_login))
}

fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/link-phone", post(auth::link_phone))
        .route("/auth/me", get(auth::me))
}

fn group_routes() -> Router<AppState> {
    Router::new()
        .route("/groups", post(group::create_group).get(group::list_groups))
        .route(
            "/groups/{id}",
            get(group::get_group)
                .put(group::update_group)
                .delete(group::delete_group),
        )
        .route("/groups/{id}/participants", post(group::add_participant))
        .route(
            "/groups/{id}/participants/{user_id}",
            delete(group::remove_participant),
        )
        .route("/groups/{id}/events", get(group::group_events))
}

/// Receipts travel base64-encoded inside the JSON body, so these routes get
/// a larger body limit than axum's default.
fn expense_routes(body_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/expenses", post(expense::create_expense))
        .route("/expenses/group/{group_id}", get(expense::list_group_expenses))
        .route(
            "/expenses/{expense_id}",
            get(expense::get_expense)
                .put(expense::update_expense)
                .delete(expense::delete_expense),
        )
        .layer(DefaultBodyLimit::max(body_limit))
}

fn category_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/categories",
            post(category::create_category).get(category::list_categories),
        )
        .route("/categories/system", get(category::list_system_categories))
        .route(
            "/categories/system/setup",
            post(category::setup_system_categories),
        )
        .route(
            "/categories/{id}",
            put(category::update_category).delete(category::delete_category),
        )
}

fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/notifications/register-token", post(notification::register_token))
        .route("/notifications/send", post(notification::send))
        .route("/notifications/broadcast", post(notification::broadcast))
        .route("/notifications/subscribe", post(notification::subscribe))
        .route("/notifications/unsubscribe", post(notification::unsubscribe))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    success_to_api_response(json!({
        "status": "ok",
        "store": state.store.backend_tag(),
    }))
}

/// Builds the full application: public and bearer-protected routes under the
/// configured base URI, `/health`, and the upload directory at `/uploads`.
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .merge(account_routes())
        .merge(group_routes())
        .merge(expense_routes(state.config.max_body_bytes))
        .merge(category_routes())
        .merge(notification_routes())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let router = Router::new()
        .nest(
            &state.config.api_base_uri,
            Router::new().merge(public_routes()).merge(protected_routes),
        )
        .route("/health", get(health))
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir))
        .layer(axum::middleware::from_fn(log_errors));

    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding permissive CORS layer for development");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    router.with_state(state)
}
