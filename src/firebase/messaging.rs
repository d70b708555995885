use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{AppError, AppResult};

const FCM_BASE_URL: &str = "https://fcm.googleapis.com/v1/projects";
const IID_BASE_URL: &str = "https://iid.googleapis.com/iid/v1";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PushNotification {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct PushReport {
    pub success_count: usize,
    pub failure_count: usize,
}

impl PushReport {
    fn record(&mut self, ok: bool) {
        if ok {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
    }
}

#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn send_to_tokens(
        &self,
        tokens: &[String],
        notification: &PushNotification,
    ) -> AppResult<PushReport>;

    /// Returns the provider's message id.
    async fn send_to_topic(&self, topic: &str, notification: &PushNotification) -> AppResult<String>;

    async fn subscribe(&self, tokens: &[String], topic: &str) -> AppResult<PushReport>;

    async fn unsubscribe(&self, tokens: &[String], topic: &str) -> AppResult<PushReport>;
}

/// FCM HTTP v1 client authenticated with a pre-issued OAuth access token.
pub struct FcmGateway {
    client: reqwest::Client,
    project_id: String,
    access_token: String,
}

#[derive(Deserialize)]
struct SendResponse {
    name: String,
}

#[derive(Deserialize)]
struct BatchResponse {
    #[serde(default)]
    results: Vec<Value>,
}

fn message_body(target: (&str, &str), notification: &PushNotification) -> Value {
    let mut message = json!({
        "notification": {
            "title": notification.title,
            "body": notification.body,
        },
    });
    message[target.0] = json!(target.1);
    if !notification.data.is_empty() {
        message["data"] = json!(notification.data);
    }
    json!({ "message": message })
}

/// The batch API answers with one entry per token; an `error` key marks a failure.
fn batch_report(response: &BatchResponse, sent: usize) -> PushReport {
    let mut report = PushReport::default();
    for result in &response.results {
        report.record(result.get("error").is_none());
    }
    report.failure_count += sent.saturating_sub(response.results.len());
    report
}

fn delivery_error(e: reqwest::Error) -> AppError {
    AppError::internal(format!("push delivery failed: {}", e))
}

impl FcmGateway {
    pub fn new(project_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            project_id: project_id.into(),
            access_token: access_token.into(),
        }
    }

    async fn send(&self, body: &Value) -> Result<SendResponse, reqwest::Error> {
        self.client
            .post(format!("{}/{}/messages:send", FCM_BASE_URL, self.project_id))
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    async fn batch(&self, action: &str, tokens: &[String], topic: &str) -> AppResult<PushReport> {
        if tokens.is_empty() {
            return Ok(PushReport::default());
        }
        let response: BatchResponse = self
            .client
            .post(format!("{}:{}", IID_BASE_URL, action))
            .bearer_auth(&self.access_token)
            .header("access_token_auth", "true")
            .json(&json!({
                "to": format!("/topics/{}", topic),
                "registration_tokens": tokens,
            }))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(delivery_error)?
            .json()
            .await
            .map_err(delivery_error)?;
        Ok(batch_report(&response, tokens.len()))
    }
}

#[async_trait]
impl PushGateway for FcmGateway {
    async fn send_to_tokens(
        &self,
        tokens: &[String],
        notification: &PushNotification,
    ) -> AppResult<PushReport> {
        let mut report = PushReport::default();
        for token in tokens {
            let result = self.send(&message_body(("token", token), notification)).await;
            if let Err(e) = &result {
                tracing::warn!(error = %e, "push to device token failed");
            }
            report.record(result.is_ok());
        }
        Ok(report)
    }

    async fn send_to_topic(&self, topic: &str, notification: &PushNotification) -> AppResult<String> {
        let response = self
            .send(&message_body(("topic", topic), notification))
            .await
            .map_err(delivery_error)?;
        Ok(response.name)
    }

    async fn subscribe(&self, tokens: &[String], topic: &str) -> AppResult<PushReport> {
        self.batch("batchAdd", tokens, topic).await
    }

    async fn unsubscribe(&self, tokens: &[String], topic: &str) -> AppResult<PushReport> {
        self.batch("batchRemove", tokens, topic).await
    }
}
