// models/payment.rs
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::errors::Result;

pub const DEFAULT_REFERENCE: &str = "Testing Daraja API";

const MAX_ACCOUNT_REFERENCE: usize = 12;
const MAX_TRANSACTION_DESC: usize = 13;

/// Caller input for one STK push.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PaymentDetails {
    #[validate(custom(function = "validate_msisdn"))]
    pub phone_number: String,

    #[validate(range(min = 1, message = "Amount must be at least 1"))]
    pub amount: u64,

    #[validate(length(min = 1, max = 12, message = "Account reference must be 1-12 characters"))]
    pub account_reference: String,

    #[validate(length(min = 1, max = 13, message = "Description must be 1-13 characters"))]
    pub transaction_desc: String,
}

impl PaymentDetails {
    pub fn new(phone_number: &str, amount: u64) -> Self {
        PaymentDetails {
            phone_number: format_phone_number(phone_number),
            amount,
            account_reference: truncate(DEFAULT_REFERENCE, MAX_ACCOUNT_REFERENCE),
            transaction_desc: truncate(DEFAULT_REFERENCE, MAX_TRANSACTION_DESC),
        }
    }

    pub fn with_account_reference(mut self, reference: &str) -> Self {
        self.account_reference = reference.trim().to_string();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.transaction_desc = description.trim().to_string();
        self
    }

    /// Runs the field validators, mapping failures to `AppError::Validation`.
    pub fn checked(&self) -> Result<&Self> {
        self.validate()?;
        Ok(self)
    }
}

/// Normalizes local Kenyan formats to `2547XXXXXXXX`.
pub fn format_phone_number(phone: &str) -> String {
    let phone = phone.trim();
    let phone = phone.strip_prefix('+').unwrap_or(phone);
    if phone.starts_with("254") && phone.len() == 12 {
        return phone.to_string();
    }
    if phone.starts_with('0') && phone.len() == 10 {
        return format!("254{}", &phone[1..]);
    }
    if (phone.starts_with('7') || phone.starts_with('1')) && phone.len() == 9 {
        return format!("254{}", phone);
    }
    phone.to_string()
}

fn validate_msisdn(phone: &str) -> std::result::Result<(), ValidationError> {
    if phone.len() == 12 && phone.starts_with("254") && phone.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("msisdn");
        err.message = Some("Phone number must look like 2547XXXXXXXX".into());
        Err(err)
    }
}

fn truncate(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
