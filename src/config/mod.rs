use std::env;
use std::time::Duration;

use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub bcrypt_cost: u32,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub upload_dir: String,
    pub public_base_url: String,
    pub admin_user_ids: Vec<Uuid>,
    pub seed_test_account_id: Option<Uuid>,
    pub reconcile_interval_secs: u64,
    pub category_cache_ttl_secs: u64,
    pub system_category_cache_ttl_secs: u64,
    pub firebase_project_id: Option<String>,
    pub fcm_access_token: Option<String>,
    pub max_body_bytes: usize,
    pub max_receipt_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            redis_url: None,
            jwt_secret: "dev-secret-change-me".to_string(),
            jwt_expiration_secs: 24 * 3600,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            server_host: "0.0.0.0".to_string(),
            server_port: 3000,
            api_base_uri: "/api".to_string(),
            upload_dir: "uploads".to_string(),
            public_base_url: "http://localhost:3000".to_string(),
            admin_user_ids: Vec::new(),
            seed_test_account_id: None,
            reconcile_interval_secs: 3600,
            category_cache_ttl_secs: 15 * 60,
            system_category_cache_ttl_secs: 3600,
            firebase_project_id: None,
            fcm_access_token: None,
            max_body_bytes: 16 * 1024 * 1024,
            max_receipt_bytes: 12 * 1024 * 1024,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid value for {name}: {value}")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let defaults = Config::default();

        let jwt_expiration_secs = match optional("JWT_EXPIRATION") {
            Some(raw) => parse_hours(&raw).ok_or(ConfigError {
                name: "JWT_EXPIRATION",
                value: raw,
            })?,
            None => defaults.jwt_expiration_secs,
        };

        Ok(Config {
            database_url: optional("DATABASE_URL"),
            redis_url: optional("REDIS_URL"),
            jwt_secret: optional("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            jwt_expiration_secs,
            bcrypt_cost: parsed("BCRYPT_COST")?.unwrap_or(defaults.bcrypt_cost),
            server_host: optional("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parsed("SERVER_PORT")?.unwrap_or(defaults.server_port),
            api_base_uri: optional("API_BASE_URI").unwrap_or(defaults.api_base_uri),
            upload_dir: optional("UPLOAD_DIR").unwrap_or(defaults.upload_dir),
            public_base_url: optional("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_base_url),
            admin_user_ids: match optional("ADMIN_USER_IDS") {
                Some(raw) => parse_uuid_list(&raw).ok_or(ConfigError {
                    name: "ADMIN_USER_IDS",
                    value: raw,
                })?,
                None => Vec::new(),
            },
            seed_test_account_id: parsed("SEED_TEST_ACCOUNT_ID")?,
            reconcile_interval_secs: parsed("RECONCILE_INTERVAL_SECS")?
                .unwrap_or(defaults.reconcile_interval_secs),
            category_cache_ttl_secs: parsed("CATEGORY_CACHE_TTL_SECS")?
                .unwrap_or(defaults.category_cache_ttl_secs),
            system_category_cache_ttl_secs: parsed("SYSTEM_CATEGORY_CACHE_TTL_SECS")?
                .unwrap_or(defaults.system_category_cache_ttl_secs),
            firebase_project_id: optional("FIREBASE_PROJECT_ID"),
            fcm_access_token: optional("FCM_ACCESS_TOKEN"),
            max_body_bytes: parsed("MAX_BODY_BYTES")?.unwrap_or(defaults.max_body_bytes),
            max_receipt_bytes: parsed("MAX_RECEIPT_BYTES")?.unwrap_or(defaults.max_receipt_bytes),
        })
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }

    pub fn reconcile_interval(&self) -> Option<Duration> {
        (self.reconcile_interval_secs > 0).then(|| Duration::from_secs(self.reconcile_interval_secs))
    }

    pub fn category_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.category_cache_ttl_secs)
    }

    pub fn system_category_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.system_category_cache_ttl_secs)
    }

    pub fn is_admin(&self, user_id: Uuid) -> bool {
        self.admin_user_ids.contains(&user_id)
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parsed<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    optional(name)
        .map(|raw| raw.parse().map_err(|_| ConfigError { name, value: raw }))
        .transpose()
}

/// Accepts `24h` or a bare number of hours.
fn parse_hours(raw: &str) -> Option<u64> {
    raw.trim_end_matches('h')
        .parse::<u64>()
        .ok()
        .and_then(|hours| hours.checked_mul(3600))
}

fn parse_uuid_list(raw: &str) -> Option<Vec<Uuid>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| Uuid::parse_str(part).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hour_suffix() {
        assert_eq!(parse_hours("24h"), Some(86400));
        assert_eq!(parse_hours("2"), Some(7200));
        assert_eq!(parse_hours("soon"), None);
        assert_eq!(parse_hours(&format!("{}h", u64::MAX)), None);
    }

    #[test]
    fn parses_admin_list() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let parsed = parse_uuid_list(&format!("{a}, {b},")).unwrap();
        assert_eq!(parsed, vec![a, b]);
        assert!(parse_uuid_list("not-a-uuid").is_none());
    }

    #[test]
    fn zero_interval_disables_reconciliation() {
        let config = Config {
            reconcile_interval_secs: 0,
            ..Config::default()
        };
        assert!(config.reconcile_interval().is_none());
        assert_eq!(
            Config::default().reconcile_interval(),
            Some(Duration::from_secs(3600))
        );
    }
}
