// services/poller.rs
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::mpesa_transactions::QueryStatus;
use crate::services::mpesa_service::StatusCheck;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause between two status queries.
    pub interval: Duration,
    /// Overall deadline, checked before each query.
    pub max_duration: Duration,
    pub max_attempts: Option<u32>,
    /// Consecutive transient errors tolerated before giving up. `1` stops on
    /// the first error.
    pub max_consecutive_errors: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            interval: Duration::from_secs(30),
            max_duration: Duration::from_secs(90),
            max_attempts: None,
            max_consecutive_errors: 1,
        }
    }
}

#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock that only moves when slept on, for deterministic tests.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

#[derive(Debug)]
pub enum PollOutcome {
    Completed { polls: u32 },
    Failed { code: i64, description: String, polls: u32 },
    TimedOut { polls: u32, elapsed: Duration },
    Aborted { error: AppError, polls: u32 },
}

impl PollOutcome {
    pub fn polls(&self) -> u32 {
        match self {
            PollOutcome::Completed { polls }
            | PollOutcome::Failed { polls, .. }
            | PollOutcome::TimedOut { polls, .. }
            | PollOutcome::Aborted { polls, .. } => *polls,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Completed { .. })
    }

    pub fn summary(&self) -> String {
        match self {
            PollOutcome::Completed { .. } => "Transaction completed.".to_string(),
            PollOutcome::Failed { code, description, .. } => {
                AppError::TransactionFailed { code: *code, description: description.clone() }
                    .to_string()
            }
            PollOutcome::TimedOut { .. } => "Timeout reached. Exiting.".to_string(),
            PollOutcome::Aborted { error, .. } => format!("Error querying status: {}", error),
        }
    }
}

/// Queries `checkout_request_id` until it settles or the policy runs out.
pub async fn poll_until_settled<S, C>(
    source: &S,
    checkout_request_id: &str,
    policy: &RetryPolicy,
    clock: &C,
) -> PollOutcome
where
    S: StatusCheck + ?Sized,
    C: Clock + ?Sized,
{
    let started = clock.now();
    let mut polls = 0u32;
    let mut consecutive_errors = 0u32;

    loop {
        let elapsed = clock.now().saturating_duration_since(started);
        if elapsed >= policy.max_duration {
            info!("Deadline of {:?} reached after {} polls", policy.max_duration, polls);
            return PollOutcome::TimedOut { polls, elapsed };
        }
        if policy.max_attempts.is_some_and(|max| polls >= max) {
            info!("Poll attempts exhausted after {} polls", polls);
            return PollOutcome::TimedOut { polls, elapsed };
        }

        polls += 1;
        match source.check(checkout_request_id).await {
            Ok(QueryStatus::Completed) => return PollOutcome::Completed { polls },
            Ok(QueryStatus::Pending) => {
                consecutive_errors = 0;
                info!(
                    "Transaction is still being processed. Retrying in {} seconds.",
                    policy.interval.as_secs()
                );
            }
            Err(AppError::TransactionFailed { code, description }) => {
                return PollOutcome::Failed { code, description, polls };
            }
            Err(error) => {
                consecutive_errors += 1;
                warn!(
                    "Status query error ({}/{}): {}",
                    consecutive_errors, policy.max_consecutive_errors, error
                );
                if !error.is_transient() || consecutive_errors >= policy.max_consecutive_errors {
                    return PollOutcome::Aborted { error, polls };
                }
            }
        }

        clock.sleep(policy.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::collections::VecDeque;

    /// Replays scripted answers; repeats the last one when exhausted.
    struct Scripted {
        answers: Mutex<VecDeque<Result<QueryStatus, AppError>>>,
        last: fn() -> Result<QueryStatus, AppError>,
    }

    impl Scripted {
        fn new(answers: Vec<Result<QueryStatus, AppError>>, last: fn() -> Result<QueryStatus, AppError>) -> Self {
            Scripted { answers: Mutex::new(answers.into()), last }
        }
    }

    #[async_trait]
    impl StatusCheck for Scripted {
        async fn check(&self, _checkout_request_id: &str) -> Result<QueryStatus, AppError> {
            let next = self.answers.lock().unwrap().pop_front();
            next.unwrap_or_else(self.last)
        }
    }

    fn pending() -> Result<QueryStatus, AppError> {
        Ok(QueryStatus::Pending)
    }

    fn outage() -> Result<QueryStatus, AppError> {
        Err(AppError::RemoteApi {
            operation: "status query",
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: "down".into(),
        })
    }

    #[tokio::test]
    async fn completes_after_pending_polls() {
        let clock = ManualClock::new();
        let source = Scripted::new(vec![pending(), pending(), Ok(QueryStatus::Completed)], pending);
        let policy = RetryPolicy { max_duration: Duration::from_secs(600), ..RetryPolicy::default() };

        let outcome = poll_until_settled(&source, "ws_1", &policy, &clock).await;
        assert!(outcome.is_success());
        assert_eq!(outcome.polls(), 3);
        assert_eq!(clock.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn default_deadline_allows_three_polls() {
        let clock = ManualClock::new();
        let source = Scripted::new(vec![], pending);

        let outcome = poll_until_settled(&source, "ws_1", &RetryPolicy::default(), &clock).await;
        match outcome {
            PollOutcome::TimedOut { polls, elapsed } => {
                assert_eq!(polls, 3);
                assert_eq!(elapsed, Duration::from_secs(90));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn attempt_cap_ends_the_loop() {
        let clock = ManualClock::new();
        let source = Scripted::new(vec![], pending);
        let policy = RetryPolicy {
            max_attempts: Some(2),
            max_duration: Duration::from_secs(3600),
            ..RetryPolicy::default()
        };

        let outcome = poll_until_settled(&source, "ws_1", &policy, &clock).await;
        assert!(matches!(outcome, PollOutcome::TimedOut { polls: 2, .. }));
    }

    #[tokio::test]
    async fn failure_code_is_terminal() {
        let clock = ManualClock::new();
        let source = Scripted::new(
            vec![
                pending(),
                Err(AppError::TransactionFailed { code: 1, description: "insufficient".into() }),
            ],
            pending,
        );

        let outcome = poll_until_settled(&source, "ws_1", &RetryPolicy::default(), &clock).await;
        match outcome {
            PollOutcome::Failed { code, description, polls } => {
                assert_eq!((code, polls), (1, 2));
                assert_eq!(description, "insufficient");
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn first_error_stops_by_default() {
        let clock = ManualClock::new();
        let source = Scripted::new(vec![outage()], pending);

        let outcome = poll_until_settled(&source, "ws_1", &RetryPolicy::default(), &clock).await;
        assert!(matches!(outcome, PollOutcome::Aborted { polls: 1, .. }));
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn bounded_retries_ride_out_transient_errors() {
        let clock = ManualClock::new();
        let source = Scripted::new(
            vec![outage(), outage(), pending(), outage(), Ok(QueryStatus::Completed)],
            pending,
        );
        let policy = RetryPolicy {
            interval: Duration::from_secs(5),
            max_consecutive_errors: 3,
            ..RetryPolicy::default()
        };

        let outcome = poll_until_settled(&source, "ws_1", &policy, &clock).await;
        assert!(matches!(outcome, PollOutcome::Completed { polls: 5 }));
    }

    #[tokio::test]
    async fn validation_errors_are_never_retried() {
        let clock = ManualClock::new();
        let source = Scripted::new(vec![Err(AppError::Validation("bad".into()))], pending);
        let policy = RetryPolicy { max_consecutive_errors: 5, ..RetryPolicy::default() };

        let outcome = poll_until_settled(&source, "ws_1", &policy, &clock).await;
        assert!(matches!(outcome, PollOutcome::Aborted { polls: 1, .. }));
    }
}
