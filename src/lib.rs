//! Reference client for the M-Pesa Daraja STK push flow: fetch an OAuth
//! token, prompt the payer's phone, then poll the query endpoint until the
//! payment settles or the deadline passes.

pub mod config;
pub mod errors;
pub mod models;
pub mod services;

pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use models::payment::PaymentDetails;
pub use services::mpesa_service::{MpesaService, StkSession};
pub use services::poller::{PollOutcome, RetryPolicy};
