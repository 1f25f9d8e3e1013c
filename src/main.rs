use anyhow::Context;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use stk_push_client::services::poller::{PollOutcome, SystemClock};
use stk_push_client::services::workflow::run_stk_push;
use stk_push_client::{AppConfig, MpesaService, PaymentDetails};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(outcome) => {
            println!("{}", outcome.summary());
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<PollOutcome> {
    let config = AppConfig::from_env().context("loading configuration")?;
    tracing::info!("Configuration: {}", config.get_config_info());

    let details = payment_from_env()?;
    let policy = config.retry_policy.clone();
    let service = MpesaService::new(config)?;

    let outcome = run_stk_push(&service, &details, &policy, &SystemClock)
        .await
        .context("Error initiating STK push")?;

    match &outcome {
        PollOutcome::Completed { polls } => {
            tracing::info!("Transaction successful after {} polls", polls)
        }
        PollOutcome::Failed { code, description, .. } => {
            tracing::warn!("Transaction failed ({}): {}", code, description)
        }
        PollOutcome::TimedOut { polls, elapsed } => {
            tracing::warn!("No final status after {} polls in {:?}", polls, elapsed)
        }
        PollOutcome::Aborted { error, polls } => {
            tracing::warn!("Polling stopped after {} polls: {}", polls, error)
        }
    }
    Ok(outcome)
}

fn payment_from_env() -> anyhow::Result<PaymentDetails> {
    let phone = std::env::var("STK_PHONE_NUMBER").context("STK_PHONE_NUMBER must be set")?;
    let amount = match std::env::var("STK_AMOUNT") {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("STK_AMOUNT must be a whole number, got {:?}", raw))?,
        Err(_) => 1,
    };

    let mut details = PaymentDetails::new(&phone, amount);
    if let Ok(reference) = std::env::var("STK_ACCOUNT_REFERENCE") {
        details = details.with_account_reference(&reference);
    }
    if let Ok(description) = std::env::var("STK_DESCRIPTION") {
        details = details.with_description(&description);
    }
    Ok(details)
}
