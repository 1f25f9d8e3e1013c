// services/dispatcher.rs
//! Runs several STK push transactions side by side. Every transaction gets
//! its own task, session and poll loop; progress flows back over a channel.
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::payment::PaymentDetails;
use crate::services::mpesa_service::MpesaService;
use crate::services::poller::{poll_until_settled, Clock, PollOutcome, RetryPolicy, SystemClock};

/// Hands every transaction its own clock, so one poll loop's sleeps never
/// move another's deadline.
pub type ClockFactory = Arc<dyn Fn() -> Arc<dyn Clock> + Send + Sync>;

/// Wall-clock time for every transaction. `SystemClock` holds no state, so a
/// single instance is shared.
pub fn system_clocks() -> ClockFactory {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    Arc::new(move || Arc::clone(&clock))
}

#[derive(Debug)]
pub enum TransactionUpdate {
    Initiated { id: Uuid, checkout_request_id: String },
    Settled { id: Uuid, outcome: PollOutcome },
    Rejected { id: Uuid, error: String },
}

impl TransactionUpdate {
    pub fn id(&self) -> Uuid {
        match self {
            TransactionUpdate::Initiated { id, .. }
            | TransactionUpdate::Settled { id, .. }
            | TransactionUpdate::Rejected { id, .. } => *id,
        }
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, TransactionUpdate::Initiated { .. })
    }
}

pub struct TransactionDispatcher {
    service: MpesaService,
    policy: RetryPolicy,
    clocks: ClockFactory,
    updates: mpsc::UnboundedSender<TransactionUpdate>,
}

impl TransactionDispatcher {
    pub fn new(
        service: MpesaService,
        policy: RetryPolicy,
        clocks: ClockFactory,
    ) -> (Self, mpsc::UnboundedReceiver<TransactionUpdate>) {
        let (updates, receiver) = mpsc::unbounded_channel();
        let dispatcher = TransactionDispatcher {
            service,
            policy,
            clocks,
            updates,
        };
        (dispatcher, receiver)
    }

    /// Starts a transaction in the background and returns its local id.
    pub fn submit(&self, details: PaymentDetails) -> (Uuid, JoinHandle<()>) {
        let id = Uuid::new_v4();
        let session = self.service.session();
        let policy = self.policy.clone();
        let clock = (self.clocks)();
        let updates = self.updates.clone();

        let handle = tokio::spawn(async move {
            let checkout_request_id = match session.initiate(&details).await {
                Ok(checkout_request_id) => checkout_request_id,
                Err(e) => {
                    error!("Transaction {} rejected: {}", id, e);
                    if updates.send(TransactionUpdate::Rejected { id, error: e.to_string() }).is_err() {
                        warn!("Transaction {}: update receiver dropped", id);
                    }
                    return;
                }
            };
            info!("Transaction {} initiated as {}", id, checkout_request_id);
            let initiated = TransactionUpdate::Initiated {
                id,
                checkout_request_id: checkout_request_id.clone(),
            };
            if updates.send(initiated).is_err() {
                warn!("Transaction {}: update receiver dropped, not polling", id);
                return;
            }

            let outcome = poll_until_settled(&session, &checkout_request_id, &policy, clock.as_ref()).await;
            info!("Transaction {} settled: {}", id, outcome.summary());
            if updates.send(TransactionUpdate::Settled { id, outcome }).is_err() {
                warn!("Transaction {}: update receiver dropped", id);
            }
        });

        (id, handle)
    }
}
