use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, AppResult},
    utils::{generate_token, hash_password, verify_password},
    validation::{Validator, is_valid_email, is_valid_phone, is_valid_username},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    #[serde(skip_serializing)]
    pub device_tokens: Vec<String>,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Display fields used wherever another entity references a user.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email.
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PhoneTokenRequest {
    pub id_token: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
    pub expires_at: i64,
}

impl UserSummary {
    pub fn unknown(id: Uuid) -> Self {
        Self {
            id,
            username: "Deleted user".to_string(),
        }
    }

    /// Resolves ids to display fields; ids without a user map to a placeholder.
    pub async fn lookup(state: &AppState, ids: &[Uuid]) -> AppResult<HashMap<Uuid, UserSummary>> {
        let mut unique = ids.to_vec();
        unique.sort();
        unique.dedup();

        let users = state.store.find_users(&unique).await?;
        let mut summaries: HashMap<Uuid, UserSummary> = users
            .into_iter()
            .map(|user| {
                (
                    user.id,
                    UserSummary {
                        id: user.id,
                        username: user.username,
                    },
                )
            })
            .collect();

        for id in unique {
            summaries.entry(id).or_insert_with(|| UserSummary::unknown(id));
        }
        Ok(summaries)
    }
}

impl User {
    pub async fn register(state: &AppState, req: RegisterRequest) -> AppResult<Self> {
        let username = req.username.trim().to_string();
        let email = req.email.trim().to_lowercase();
        let phone = req
            .phone
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        let mut validator = Validator::new();
        validator
            .check(
                is_valid_username(&username),
                "username",
                "Username must be 3-32 letters, digits or underscores",
            )
            .check(is_valid_email(&email), "email", "Email is invalid")
            .check(
                (6..=128).contains(&req.password.chars().count()),
                "password",
                "Password must be between 6 and 128 characters",
            )
            .check(
                phone.as_deref().is_none_or(is_valid_phone),
                "phone",
                "Phone must be in international format, e.g. +14155550123",
            );
        validator.result()?;

        if state.store.find_user_by_login(&username).await?.is_some() {
            return Err(AppError::bad_request("Username is already taken"));
        }
        if state.store.find_user_by_login(&email).await?.is_some() {
            return Err(AppError::bad_request("Email is already registered"));
        }
        if let Some(phone) = &phone {
            if state.store.find_user_by_phone(phone).await?.is_some() {
                return Err(AppError::bad_request("Phone number is already registered"));
            }
        }

        let password_hash = hash_password(&req.password, state.config.bcrypt_cost)?;
        let user = User {
            id: Uuid::new_v4(),
            username,
            email,
            phone,
            password_hash: Some(password_hash),
            device_tokens: Vec::new(),
            email_verified: false,
            phone_verified: false,
            created_at: Utc::now(),
        };
        state.store.insert_user(&user).await?;

        tracing::info!(user_id = %user.id, "registered user");
        Ok(user)
    }

    pub async fn login(state: &AppState, req: LoginRequest) -> AppResult<Self> {
        let identifier = req.identifier.trim();
        let rejected = || AppError::Unauthorized("Invalid credentials".to_string());

        let user = state
            .store
            .find_user_by_login(identifier)
            .await?
            .ok_or_else(rejected)?;

        let hash = user.password_hash.as_deref().ok_or_else(rejected)?;
        if !verify_password(&req.password, hash)? {
            return Err(rejected());
        }
        Ok(user)
    }

    pub async fn phone_login(state: &AppState, req: PhoneTokenRequest) -> AppResult<Self> {
        let phone = verified_phone(state, &req.id_token).await?;
        state
            .store
            .find_user_by_phone(&phone)
            .await?
            .ok_or_else(|| AppError::not_found("No account is linked to this phone number"))
    }

    pub async fn link_phone(
        state: &AppState,
        user_id: Uuid,
        req: PhoneTokenRequest,
    ) -> AppResult<Self> {
        let phone = verified_phone(state, &req.id_token).await?;

        if let Some(owner) = state.store.find_user_by_phone(&phone).await? {
            if owner.id != user_id {
                return Err(AppError::bad_request(
                    "Phone number is linked to another account",
                ));
            }
        }

        let mut user = Self::find(state, user_id).await?;
        user.phone = Some(phone);
        user.phone_verified = true;
        state.store.update_user(&user).await?;
        Ok(user)
    }

    pub async fn find(state: &AppState, user_id: Uuid) -> AppResult<Self> {
        state
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    pub fn issue_token(self, state: &AppState) -> AppResult<AuthResponse> {
        let (token, expires_at) = generate_token(self.id, &state.config)?;
        Ok(AuthResponse {
            user: self,
            token,
            expires_at,
        })
    }
}

async fn verified_phone(state: &AppState, id_token: &str) -> AppResult<String> {
    let verifier = state
        .phone_verifier
        .as_ref()
        .ok_or_else(|| AppError::internal("Phone authentication is not configured"))?;
    let identity = verifier.verify(id_token).await?;
    identity
        .phone_number
        .ok_or_else(|| AppError::bad_request("Token does not carry a verified phone number"))
}
