// services/mpesa_service.rs
use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::models::mpesa_transactions::{
    decode, AuthResponse, QueryStatus, StkPushRequest, StkPushResponse, StkQueryRequest,
    StkQueryResponse,
};
use crate::models::payment::PaymentDetails;
use crate::services::credentials::{basic_credentials, AuthMaterial};
use crate::services::transaction_log::TransactionLog;

pub const STK_PUSH_LOG_TYPE: &str = "STK Push Response";
pub const STK_QUERY_LOG_TYPE: &str = "Query Status Response";

/// Client for the Daraja OAuth, STK push and STK query endpoints.
#[derive(Debug, Clone)]
pub struct MpesaService {
    config: Arc<AppConfig>,
    client: Client,
    log: TransactionLog,
}

impl MpesaService {
    pub fn new(config: AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| AppError::network("building HTTP client", e))?;
        let log = TransactionLog::new(config.transaction_log_file.clone());

        Ok(MpesaService {
            config: Arc::new(config),
            client,
            log,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn transaction_log(&self) -> &TransactionLog {
        &self.log
    }

    /// Fetches a fresh bearer token. Tokens are not cached: every outbound
    /// call pays one extra round trip.
    pub async fn get_access_token(&self) -> Result<String> {
        info!("Requesting new access token");

        let response = self
            .client
            .get(self.config.auth_url())
            .header(
                header::AUTHORIZATION,
                basic_credentials(
                    &self.config.mpesa_consumer_key,
                    &self.config.mpesa_consumer_secret,
                ),
            )
            .send()
            .await
            .map_err(|e| AppError::network("token request", e))?;

        let response = ensure_success("token request", response).await?;
        let raw: Value = response
            .json()
            .await
            .map_err(|e| AppError::shape(format!("decoding token response: {}", e)))?;
        let auth: AuthResponse = decode(&raw, "token response")?;

        if auth.access_token.is_empty() {
            return Err(AppError::shape("access_token is empty"));
        }

        info!(
            "Access token obtained (expires_in={})",
            auth.expires_in.as_ref().map_or_else(|| "-".to_string(), serde_json::Value::to_string)
        );
        Ok(auth.access_token)
    }

    /// Opens a transaction session signed with freshly generated auth material.
    pub fn session(&self) -> StkSession {
        self.session_with(AuthMaterial::generate(&self.config))
    }

    pub fn session_with(&self, material: AuthMaterial) -> StkSession {
        StkSession {
            service: self.clone(),
            material,
        }
    }

    async fn post_json<T: Serialize>(
        &self,
        operation: &'static str,
        url: &str,
        payload: &T,
    ) -> Result<Value> {
        let access_token = self.get_access_token().await?;

        let response = self
            .client
            .post(url)
            .header(header::AUTHORIZATION, format!("Bearer {}", access_token))
            .header(header::CONTENT_TYPE, "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| AppError::network(operation, e))?;

        let response = ensure_success(operation, response).await?;
        response
            .json()
            .await
            .map_err(|e| AppError::shape(format!("decoding {} response: {}", operation, e)))
    }
}

async fn ensure_success(operation: &'static str, response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AppError::network(operation, e))?;
    error!("{} failed: {} - {}", operation, status, body);
    Err(AppError::RemoteApi {
        operation,
        status,
        body,
    })
}

/// One STK push transaction: a single auth material pair shared by the
/// initiation and every status query that follows.
#[derive(Debug, Clone)]
pub struct StkSession {
    service: MpesaService,
    material: AuthMaterial,
}

impl StkSession {
    pub fn material(&self) -> &AuthMaterial {
        &self.material
    }

    pub fn build_request(&self, details: &PaymentDetails) -> StkPushRequest {
        let config = self.service.config();
        StkPushRequest {
            business_short_code: config.mpesa_short_code.clone(),
            password: self.material.password.clone(),
            timestamp: self.material.timestamp.clone(),
            transaction_type: config.transaction_type.clone(),
            amount: details.amount,
            party_a: details.phone_number.clone(),
            party_b: config.party_b.clone(),
            phone_number: details.phone_number.clone(),
            callback_url: config.mpesa_callback_url.clone(),
            account_reference: details.account_reference.clone(),
            transaction_desc: details.transaction_desc.clone(),
        }
    }

    /// Sends the STK push and returns the provider's `CheckoutRequestID`.
    pub async fn initiate(&self, details: &PaymentDetails) -> Result<String> {
        details.checked()?;
        info!("STK push for {} - KSh {}", details.phone_number, details.amount);

        let request = self.build_request(details);
        let raw = self
            .service
            .post_json("STK push request", &self.service.config().stk_push_url(), &request)
            .await?;

        self.service.log.record(STK_PUSH_LOG_TYPE, &raw).await;

        let response: StkPushResponse = decode(&raw, "checkout request ID missing in response")?;
        info!(
            "STK push accepted: checkout={} merchant={} message={}",
            response.checkout_request_id,
            response.merchant_request_id.as_deref().unwrap_or("-"),
            response.customer_message.as_deref().unwrap_or("-")
        );
        Ok(response.checkout_request_id)
    }

    /// One status query. Result code `1` and unknown codes come back as
    /// `AppError::TransactionFailed`.
    pub async fn query_status(&self, checkout_request_id: &str) -> Result<QueryStatus> {
        let config = self.service.config();
        let request = StkQueryRequest {
            business_short_code: config.mpesa_short_code.clone(),
            password: self.material.password.clone(),
            timestamp: self.material.timestamp.clone(),
            checkout_request_id: checkout_request_id.to_string(),
        };

        let raw = self
            .service
            .post_json("status query", &config.stk_query_url(), &request)
            .await?;

        self.service.log.record(STK_QUERY_LOG_TYPE, &raw).await;

        let response: StkQueryResponse = decode(&raw, "status query response")?;
        let status = response.classify();
        match &status {
            Ok(QueryStatus::Completed) => info!("Transaction {} successful", checkout_request_id),
            Ok(QueryStatus::Pending) => info!("Transaction {} is still being processed", checkout_request_id),
            Err(e) => warn!("Transaction {}: {}", checkout_request_id, e),
        }
        status
    }
}

/// Seam between the poll loop and whatever answers status queries.
#[async_trait]
pub trait StatusCheck: Send + Sync {
    async fn check(&self, checkout_request_id: &str) -> Result<QueryStatus>;
}

#[async_trait]
impl StatusCheck for StkSession {
    async fn check(&self, checkout_request_id: &str) -> Result<QueryStatus> {
        self.query_status(checkout_request_id).await
    }
}
