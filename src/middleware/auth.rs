use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
    typed_header::TypedHeaderRejection,
};
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, AppResult},
    utils::verify_token,
};

/// The caller of a protected route, taken from a verified bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
}

impl AuthUser {
    pub fn require_admin(&self, state: &AppState) -> AppResult<()> {
        if state.config.is_admin(self.id) {
            Ok(())
        } else {
            Err(AppError::forbidden("Administrator access required"))
        }
    }
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut req: Request,
    next: Next,
) -> AppResult<Response> {
    let TypedHeader(Authorization(bearer)) = bearer
        .map_err(|_| AppError::Unauthorized("Missing bearer token".to_string()))?;

    let claims = verify_token(bearer.token(), &state.config).map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        AppError::Unauthorized("Invalid or expired token".to_string())
    })?;
    let user = AuthUser {
        id: claims.user_id()?,
    };

    req.extensions_mut().insert(claims);
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
