// models/callback.rs
//! Decoding of the document the provider POSTs to `CallBackURL` once the
//! payer answers the prompt. Serving that endpoint is left to the host
//! application.
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::Result;
use crate::models::mpesa_transactions::{decode, RESULT_SUCCESS};

#[derive(Debug, Deserialize)]
pub struct StkCallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: CallbackBody,
}

#[derive(Debug, Deserialize)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata", default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<CallbackItem>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDetails {
    pub checkout_request_id: String,
    pub result_code: i64,
    pub result_desc: String,
    pub amount: Option<Value>,
    pub mpesa_receipt_number: Option<String>,
    pub transaction_date: Option<Value>,
    pub phone_number: Option<Value>,
}

impl TransactionDetails {
    /// Stricter than a loose map lookup: a callback without a string
    /// `CheckoutRequestID` or an integer `ResultCode` cannot be correlated
    /// with a transaction and is rejected as `ResponseShape`.
    pub fn from_callback(raw: &Value) -> Result<Self> {
        let envelope: StkCallbackEnvelope = decode(raw, "stk callback")?;
        let callback = envelope.body.stk_callback;

        let mut details = TransactionDetails {
            checkout_request_id: callback.checkout_request_id,
            result_code: callback.result_code,
            result_desc: callback.result_desc,
            amount: None,
            mpesa_receipt_number: None,
            transaction_date: None,
            phone_number: None,
        };

        // Metadata is only meaningful on success.
        if details.result_code == RESULT_SUCCESS {
            let items = callback.callback_metadata.map(|m| m.items).unwrap_or_default();
            for item in items {
                match item.name.as_str() {
                    "Amount" => details.amount = item.value,
                    "MpesaReceiptNumber" => {
                        details.mpesa_receipt_number =
                            item.value.as_ref().and_then(Value::as_str).map(str::to_string)
                    }
                    "TransactionDate" => details.transaction_date = item.value,
                    "PhoneNumber" => details.phone_number = item.value,
                    _ => {}
                }
            }
        }

        Ok(details)
    }

    pub fn is_success(&self) -> bool {
        self.result_code == RESULT_SUCCESS
    }
}

/// Body the callback receiver answers the provider with.
pub fn acknowledgement(accepted: bool, description: &str) -> Value {
    json!({
        "ResultCode": if accepted { 0 } else { 1 },
        "ResultDesc": description,
    })
}
