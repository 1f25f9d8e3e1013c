// src/errors.rs
use reqwest::StatusCode;
use thiserror::Error;

use crate::models::mpesa_transactions::RESULT_FAILED;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Environment variable {var} ({label}) is not set")]
    ConfigurationMissing { var: &'static str, label: &'static str },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{operation} failed: {source}")]
    Network {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} failed, status: {status}, response: {body}")]
    RemoteApi {
        operation: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("Unexpected response shape: {0}")]
    ResponseShape(String),

    #[error("{}", describe_failure(.code, .description))]
    TransactionFailed { code: i64, description: String },
}

fn describe_failure(code: &i64, description: &str) -> String {
    match *code {
        RESULT_FAILED => format!("transaction failed: {}", description),
        _ => format!("unknown result code: {}, description: {}", code, description),
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

// Helper conversion functions
impl AppError {
    pub fn network(operation: &'static str, source: reqwest::Error) -> Self {
        AppError::Network { operation, source }
    }

    pub fn shape(msg: impl Into<String>) -> Self {
        AppError::ResponseShape(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        AppError::InvalidConfiguration(msg.into())
    }

    /// Errors a status poll may recover from on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Network { .. } | AppError::RemoteApi { .. } | AppError::ResponseShape(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
