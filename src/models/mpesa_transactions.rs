// models/mpesa_transactions.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{AppError, Result};

#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkPushRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "TransactionType")]
    pub transaction_type: String,
    #[serde(rename = "Amount")]
    pub amount: u64,
    #[serde(rename = "PartyA")]
    pub party_a: String,
    #[serde(rename = "PartyB")]
    pub party_b: String,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    #[serde(rename = "AccountReference")]
    pub account_reference: String,
    #[serde(rename = "TransactionDesc")]
    pub transaction_desc: String,
}

#[derive(Debug, Deserialize)]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "CustomerMessage", default)]
    pub customer_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkQueryRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StkQueryResponse {
    #[serde(rename = "ResultCode", default)]
    pub result_code: Option<Value>,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: Option<String>,
}

/// Non-failing states of a status query. Failure codes surface as
/// `AppError::TransactionFailed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Completed,
    Pending,
}

pub const RESULT_SUCCESS: i64 = 0;
pub const RESULT_FAILED: i64 = 1;
pub const RESULT_PROCESSING: i64 = 500;

impl StkQueryResponse {
    /// `ResultCode` arrives as a numeric string, sometimes as a bare number.
    pub fn result_code(&self) -> Result<i64> {
        match &self.result_code {
            None | Some(Value::Null) => Err(AppError::shape("ResultCode missing in response")),
            Some(Value::String(raw)) => raw
                .trim()
                .parse::<i64>()
                .map_err(|_| AppError::shape(format!("ResultCode {:?} is not numeric", raw))),
            Some(Value::Number(n)) => n
                .as_i64()
                .ok_or_else(|| AppError::shape(format!("ResultCode {} is not an integer", n))),
            Some(other) => Err(AppError::shape(format!("ResultCode has unexpected type: {}", other))),
        }
    }

    pub fn classify(&self) -> Result<QueryStatus> {
        let code = self.result_code()?;
        let description = self.result_desc.clone().unwrap_or_default();
        match code {
            RESULT_SUCCESS => Ok(QueryStatus::Completed),
            RESULT_PROCESSING => Ok(QueryStatus::Pending),
            _ => Err(AppError::TransactionFailed { code, description }),
        }
    }
}

/// Decodes a provider document into a typed view, reporting shape errors.
pub fn decode<T: serde::de::DeserializeOwned>(raw: &Value, what: &str) -> Result<T> {
    T::deserialize(raw).map_err(|e| AppError::shape(format!("{}: {}", what, e)))
}
