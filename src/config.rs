// config.rs
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{AppError, Result};
use crate::services::poller::RetryPolicy;

const DEFAULT_TRANSACTION_TYPE: &str = "CustomerPayBillOnline";
const DEFAULT_LOG_FILE: &str = "transaction_log.json";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mpesa_base_api_url: String,
    pub mpesa_short_code: String,
    pub mpesa_consumer_key: String,
    pub mpesa_consumer_secret: String,
    pub mpesa_passkey: String,
    pub mpesa_callback_url: String,
    pub transaction_type: String,
    pub party_b: String,
    pub transaction_log_file: PathBuf,
    pub http_timeout: Duration,
    pub retry_policy: RetryPolicy,
}

impl AppConfig {
    /// Loads `.env` (if present) and reads the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |var: &'static str, label: &'static str| {
            get(var).ok_or(AppError::ConfigurationMissing { var, label })
        };

        let mpesa_base_api_url = required("MPESA_BASE_API_URL", "Base API URL")?
            .trim_end_matches('/')
            .to_string();
        let mpesa_short_code = required("SHORTCODE", "Short Code")?;
        let mpesa_consumer_key = required("CONSUMER_KEY", "Consumer Key")?;
        let mpesa_consumer_secret = required("CONSUMER_SECRET", "Consumer Secret")?;
        let mpesa_passkey = required("PASSKEY", "Passkey")?;
        let mpesa_callback_url = required("CALLBACK_URL", "Callback URL")?;

        let defaults = RetryPolicy::default();
        let retry_policy = RetryPolicy {
            interval: seconds(&get, "POLL_INTERVAL_SECS")?.unwrap_or(defaults.interval),
            max_duration: seconds(&get, "POLL_TIMEOUT_SECS")?.unwrap_or(defaults.max_duration),
            max_attempts: number(&get, "POLL_MAX_ATTEMPTS")?.or(defaults.max_attempts),
            max_consecutive_errors: number(&get, "POLL_MAX_ERRORS")?
                .unwrap_or(defaults.max_consecutive_errors)
                .max(1),
        };

        Ok(AppConfig {
            transaction_type: get("TRANS_TYPE")
                .unwrap_or_else(|| DEFAULT_TRANSACTION_TYPE.to_string()),
            party_b: get("PARTY_B").unwrap_or_else(|| mpesa_short_code.clone()),
            transaction_log_file: get("TRANSACTION_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            http_timeout: seconds(&get, "HTTP_TIMEOUT_SECS")?
                .unwrap_or(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)),
            retry_policy,
            mpesa_base_api_url,
            mpesa_short_code,
            mpesa_consumer_key,
            mpesa_consumer_secret,
            mpesa_passkey,
            mpesa_callback_url,
        })
    }

    pub fn auth_url(&self) -> String {
        format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.mpesa_base_api_url
        )
    }

    pub fn stk_push_url(&self) -> String {
        format!("{}/mpesa/stkpush/v1/processrequest", self.mpesa_base_api_url)
    }

    pub fn stk_query_url(&self) -> String {
        format!("{}/mpesa/stkpushquery/v1/query", self.mpesa_base_api_url)
    }

    /// Non-secret settings, safe to print at startup.
    pub fn get_config_info(&self) -> serde_json::Value {
        serde_json::json!({
            "base_api_url": self.mpesa_base_api_url,
            "business_shortcode": self.mpesa_short_code,
            "party_b": self.party_b,
            "transaction_type": self.transaction_type,
            "callback_url": self.mpesa_callback_url,
            "transaction_log_file": self.transaction_log_file.display().to_string(),
            "consumer_key_set": !self.mpesa_consumer_key.is_empty(),
            "consumer_secret_set": !self.mpesa_consumer_secret.is_empty(),
            "poll_interval_secs": self.retry_policy.interval.as_secs(),
            "poll_timeout_secs": self.retry_policy.max_duration.as_secs(),
        })
    }
}

fn number<G, T>(get: &G, key: &str) -> Result<Option<T>>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| AppError::invalid_config(format!("{} must be a number, got {:?}", key, raw)))
        })
        .transpose()
}

fn seconds<G>(get: &G, key: &str) -> Result<Option<Duration>>
where
    G: Fn(&str) -> Option<String>,
{
    Ok(number::<G, u64>(get, key)?.map(Duration::from_secs))
}
