// services/credentials.rs
use base64::{engine::general_purpose::STANDARD as base64, Engine as _};
use chrono::{DateTime, Local, TimeZone};

use crate::config::AppConfig;

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Timestamp/password pair signing one transaction. The provider checks the
/// status query against the pair used at initiation, so it is generated once
/// per transaction and never refreshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthMaterial {
    pub timestamp: String,
    pub password: String,
}

impl AuthMaterial {
    pub fn generate(config: &AppConfig) -> Self {
        Self::at(config, Local::now())
    }

    pub fn at<Tz: TimeZone>(config: &AppConfig, now: DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        let timestamp = now.format(TIMESTAMP_FORMAT).to_string();
        Self::from_timestamp(&config.mpesa_short_code, &config.mpesa_passkey, timestamp)
    }

    pub fn from_timestamp(short_code: &str, passkey: &str, timestamp: String) -> Self {
        AuthMaterial {
            password: generate_password(short_code, passkey, &timestamp),
            timestamp,
        }
    }
}

pub fn generate_password(short_code: &str, passkey: &str, timestamp: &str) -> String {
    base64.encode(format!("{}{}{}", short_code, passkey, timestamp))
}

/// `Authorization` header value for the OAuth endpoint.
pub fn basic_credentials(consumer_key: &str, consumer_secret: &str) -> String {
    format!(
        "Basic {}",
        base64.encode(format!("{}:{}", consumer_key, consumer_secret))
    )
}
