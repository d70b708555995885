use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{
    Algorithm, DecodingKey, Validation, decode, decode_header,
    jwk::{Jwk, JwkSet},
};
use serde::Deserialize;

use crate::{
    cache::TtlCache,
    error::{AppError, AppResult},
};

const JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const JWKS_CACHE_KEY: &str = "firebase:jwks";
const JWKS_TTL: Duration = Duration::from_secs(3600);

/// Identity carried by a verified Firebase ID token.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedPhone {
    pub uid: String,
    pub phone_number: Option<String>,
}

#[async_trait]
pub trait PhoneTokenVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> AppResult<VerifiedPhone>;
}

#[derive(Debug, Deserialize)]
struct FirebaseClaims {
    sub: String,
    phone_number: Option<String>,
}

pub struct FirebaseTokenVerifier {
    project_id: String,
    client: reqwest::Client,
    keys: TtlCache<JwkSet>,
}

impl FirebaseTokenVerifier {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            client: reqwest::Client::new(),
            keys: TtlCache::new(),
        }
    }

    async fn key_set(&self) -> AppResult<JwkSet> {
        if let Some(keys) = self.keys.get(JWKS_CACHE_KEY).await {
            return Ok(keys);
        }

        let keys: JwkSet = self
            .client
            .get(JWKS_URL)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::internal(format!("failed to fetch Firebase signing keys: {}", e)))?
            .json()
            .await
            .map_err(|e| AppError::internal(format!("malformed Firebase signing keys: {}", e)))?;

        tracing::debug!(count = keys.keys.len(), "refreshed Firebase signing keys");
        self.keys.set(JWKS_CACHE_KEY, keys.clone(), JWKS_TTL).await;
        Ok(keys)
    }

    async fn signing_key(&self, kid: &str) -> AppResult<Jwk> {
        self.key_set()
            .await?
            .find(kid)
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Phone token signed with an unknown key".to_string()))
    }
}

pub(crate) fn validation_for(project_id: &str) -> Validation {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[project_id]);
    validation.set_issuer(&[format!("https://securetoken.google.com/{}", project_id)]);
    validation
}

fn invalid_token(e: jsonwebtoken::errors::Error) -> AppError {
    tracing::debug!(error = %e, "rejected phone token");
    AppError::Unauthorized("Invalid phone token".to_string())
}

#[async_trait]
impl PhoneTokenVerifier for FirebaseTokenVerifier {
    async fn verify(&self, id_token: &str) -> AppResult<VerifiedPhone> {
        let header = decode_header(id_token).map_err(invalid_token)?;
        let kid = header
            .kid
            .ok_or_else(|| AppError::Unauthorized("Phone token has no key id".to_string()))?;

        let jwk = self.signing_key(&kid).await?;
        let key = DecodingKey::from_jwk(&jwk).map_err(invalid_token)?;
        let data = decode::<FirebaseClaims>(id_token, &key, &validation_for(&self.project_id))
            .map_err(invalid_token)?;

        Ok(VerifiedPhone {
            uid: data.claims.sub,
            phone_number: data.claims.phone_number,
        })
    }
}
