//! In-process stand-in for the Daraja endpoints used by the STK push flow.
#![allow(dead_code)]

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stk_push_client::{AppConfig, RetryPolicy};

pub const TOKEN: &str = "mock-access-token";

pub struct MockDaraja {
    pub auth_status: Mutex<StatusCode>,
    pub push_status: Mutex<StatusCode>,
    pub push_response: Mutex<Value>,
    pub query_responses: Mutex<VecDeque<Value>>,
    pub fallback_query: Mutex<Value>,
    pub push_bodies: Mutex<Vec<Value>>,
    pub query_bodies: Mutex<Vec<Value>>,
    pub token_requests: AtomicUsize,
    /// When set, each accepted push gets `ws_<n>` instead of the canned id.
    pub unique_checkouts: AtomicBool,
    pub pushes_accepted: AtomicUsize,
}

impl MockDaraja {
    pub fn new() -> Arc<Self> {
        Arc::new(MockDaraja {
            auth_status: Mutex::new(StatusCode::OK),
            push_status: Mutex::new(StatusCode::OK),
            push_response: Mutex::new(json!({
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_1",
                "ResponseCode": "0",
                "ResponseDescription": "Success. Request accepted for processing",
                "CustomerMessage": "Success. Request accepted for processing"
            })),
            query_responses: Mutex::new(VecDeque::new()),
            fallback_query: Mutex::new(result(500, "The transaction is being processed")),
            push_bodies: Mutex::new(Vec::new()),
            query_bodies: Mutex::new(Vec::new()),
            token_requests: AtomicUsize::new(0),
            unique_checkouts: AtomicBool::new(false),
            pushes_accepted: AtomicUsize::new(0),
        })
    }

    pub fn queue_queries(&self, responses: impl IntoIterator<Item = Value>) {
        self.query_responses.lock().unwrap().extend(responses);
    }

    pub fn token_requests(&self) -> usize {
        self.token_requests.load(Ordering::SeqCst)
    }

    /// Binds to an ephemeral port and returns the base URL.
    pub async fn serve(self: &Arc<Self>) -> String {
        let app = Router::new()
            .route("/oauth/v1/generate", get(token))
            .route("/mpesa/stkpush/v1/processrequest", post(stk_push))
            .route("/mpesa/stkpushquery/v1/query", post(stk_query))
            .with_state(Arc::clone(self));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }
}

pub fn result(code: i64, description: &str) -> Value {
    json!({
        "ResponseCode": "0",
        "ResponseDescription": "The service request has been accepted successfully",
        "MerchantRequestID": "29115-34620561-1",
        "CheckoutRequestID": "ws_1",
        "ResultCode": code.to_string(),
        "ResultDesc": description
    })
}

pub fn config(base_url: &str, log_file: &Path) -> AppConfig {
    AppConfig {
        mpesa_base_api_url: base_url.to_string(),
        mpesa_short_code: "174379".into(),
        mpesa_consumer_key: "key".into(),
        mpesa_consumer_secret: "secret".into(),
        mpesa_passkey: "passkey".into(),
        mpesa_callback_url: "https://example.com/mpesa/callback".into(),
        transaction_type: "CustomerPayBillOnline".into(),
        party_b: "174379".into(),
        transaction_log_file: log_file.to_path_buf(),
        http_timeout: Duration::from_secs(5),
        retry_policy: RetryPolicy::default(),
    }
}

fn bearer_ok(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", TOKEN))
}

async fn token(
    State(mock): State<Arc<MockDaraja>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    mock.token_requests.fetch_add(1, Ordering::SeqCst);

    let status = *mock.auth_status.lock().unwrap();
    if status != StatusCode::OK {
        return (status, "invalid credentials").into_response();
    }
    let basic = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if params.get("grant_type").map(String::as_str) != Some("client_credentials")
        || basic != "Basic a2V5OnNlY3JldA=="
    {
        return (StatusCode::BAD_REQUEST, "bad auth request").into_response();
    }
    Json(json!({"access_token": TOKEN, "expires_in": "3599"})).into_response()
}

async fn stk_push(
    State(mock): State<Arc<MockDaraja>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !bearer_ok(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    mock.push_bodies.lock().unwrap().push(body);

    let status = *mock.push_status.lock().unwrap();
    if status != StatusCode::OK {
        return (status, r#"{"errorCode":"400.002.02","errorMessage":"Bad Request"}"#).into_response();
    }
    let mut response = mock.push_response.lock().unwrap().clone();
    let n = mock.pushes_accepted.fetch_add(1, Ordering::SeqCst) + 1;
    if mock.unique_checkouts.load(Ordering::SeqCst) {
        response["CheckoutRequestID"] = json!(format!("ws_{}", n));
    }
    Json(response).into_response()
}

async fn stk_query(
    State(mock): State<Arc<MockDaraja>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !bearer_ok(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    mock.query_bodies.lock().unwrap().push(body);

    let next = mock.query_responses.lock().unwrap().pop_front();
    let response = next.unwrap_or_else(|| mock.fallback_query.lock().unwrap().clone());
    Json(response).into_response()
}
