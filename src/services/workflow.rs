// services/workflow.rs
use tracing::info;

use crate::errors::Result;
use crate::models::payment::PaymentDetails;
use crate::services::mpesa_service::MpesaService;
use crate::services::poller::{poll_until_settled, Clock, PollOutcome, RetryPolicy};

/// Initiates an STK push and polls it to a final outcome. Initiation errors
/// are returned; everything after initiation is reported as a `PollOutcome`.
pub async fn run_stk_push<C>(
    service: &MpesaService,
    details: &PaymentDetails,
    policy: &RetryPolicy,
    clock: &C,
) -> Result<PollOutcome>
where
    C: Clock + ?Sized,
{
    let session = service.session();
    let checkout_request_id = session.initiate(details).await?;
    info!("Polling {} every {:?}", checkout_request_id, policy.interval);

    Ok(poll_until_settled(&session, &checkout_request_id, policy, clock).await)
}
