use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, AppResult},
    firebase::{PushGateway, PushNotification, PushReport},
    routes::auth::model::User,
    validation::{Validator, is_valid_topic},
};

pub const DEFAULT_TOPIC: &str = "all";
const MAX_TOKEN_LEN: usize = 4096;

#[derive(Debug, Deserialize)]
pub struct RegisterTokenRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct SendNotificationRequest {
    pub user_ids: Vec<Uuid>,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub topic: Option<String>,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct TopicRequest {
    pub topic: String,
    /// Defaults to the caller's registered tokens.
    pub tokens: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct RegisteredTokens {
    pub token_count: usize,
}

#[derive(Debug, Serialize)]
pub struct BroadcastReceipt {
    pub topic: String,
    pub message_id: String,
}

fn gateway(state: &AppState) -> AppResult<Arc<dyn PushGateway>> {
    state
        .push
        .clone()
        .ok_or_else(|| AppError::internal("push delivery is not configured"))
}

fn notification(
    validator: &mut Validator,
    title: String,
    body: String,
    data: HashMap<String, String>,
) -> AppResult<PushNotification> {
    validator
        .required(&title, "title", 200)
        .required(&body, "body", 2000);
    validator.result()?;
    Ok(PushNotification {
        title: title.trim().to_string(),
        body: body.trim().to_string(),
        data,
    })
}

/// Adds `token` to the user's device list. Registering a known token again
/// changes nothing.
pub async fn register_token(state: &AppState, user_id: Uuid, token: &str) -> AppResult<RegisteredTokens> {
    let token = token.trim();
    let mut validator = Validator::new();
    validator.required(token, "token", MAX_TOKEN_LEN);
    validator.result()?;

    let mut user = User::find(state, user_id).await?;
    if !user.device_tokens.iter().any(|t| t == token) {
        user.device_tokens.push(token.to_string());
        state.store.update_user(&user).await?;
        tracing::info!(user_id = %user_id, "registered device token");
    }
    Ok(RegisteredTokens {
        token_count: user.device_tokens.len(),
    })
}

pub async fn send_to_users(state: &AppState, req: SendNotificationRequest) -> AppResult<PushReport> {
    let mut validator = Validator::new();
    validator.check(!req.user_ids.is_empty(), "user_ids", "At least one recipient is required");
    let message = notification(&mut validator, req.title, req.body, req.data)?;
    let push = gateway(state)?;

    let mut tokens: Vec<String> = state
        .store
        .find_users(&req.user_ids)
        .await?
        .into_iter()
        .flat_map(|u| u.device_tokens)
        .collect();
    tokens.sort();
    tokens.dedup();

    if tokens.is_empty() {
        tracing::debug!(recipients = req.user_ids.len(), "no device tokens for recipients");
        return Ok(PushReport::default());
    }

    let report = push.send_to_tokens(&tokens, &message).await?;
    tracing::info!(
        success = report.success_count,
        failure = report.failure_count,
        "sent push notification"
    );
    Ok(report)
}

pub async fn broadcast(state: &AppState, req: BroadcastRequest) -> AppResult<BroadcastReceipt> {
    let topic = req
        .topic
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TOPIC.to_string());

    let mut validator = Validator::new();
    validator.check(is_valid_topic(&topic), "topic", "Topic name is invalid");
    let message = notification(&mut validator, req.title, req.body, req.data)?;
    let push = gateway(state)?;

    let message_id = push.send_to_topic(&topic, &message).await?;
    tracing::info!(topic = %topic, "broadcast push notification");
    Ok(BroadcastReceipt { topic, message_id })
}

pub async fn update_subscription(
    state: &AppState,
    user_id: Uuid,
    req: TopicRequest,
    subscribe: bool,
) -> AppResult<PushReport> {
    let topic = req.topic.trim().to_string();
    let mut validator = Validator::new();
    validator.check(is_valid_topic(&topic), "topic", "Topic name is invalid");
    validator.result()?;
    let push = gateway(state)?;

    let tokens = match req.tokens {
        Some(tokens) => tokens,
        None => User::find(state, user_id).await?.device_tokens,
    };
    if tokens.is_empty() {
        return Err(AppError::bad_request("No device tokens to update"));
    }

    if subscribe {
        push.subscribe(&tokens, &topic).await
    } else {
        push.unsubscribe(&tokens, &topic).await
    }
}
