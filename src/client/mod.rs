//! Serialized, retrying access to the remote API.
//!
//! One [`RateLimitedClient`] is shared by every stage that talks to the
//! remote side. It lets one logical request through at a time, backoff
//! sleeps included, so the throttling budget and the retry state are global
//! to the run rather than per caller.

mod backoff;
mod sleeper;

pub use backoff::{format_wait, BackoffEvent, BackoffPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_WAIT};
pub use sleeper::{RecordingSleeper, Sleeper, TokioSleeper};

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{ApiError, FatalError};

pub type BackoffObserver = Box<dyn Fn(&BackoffEvent<'_>) + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct ClientStats {
    pub requests: u64,
    pub retries: u64,
    pub waited: Duration,
}

pub struct RateLimitedClient<S = TokioSleeper> {
    policy: BackoffPolicy,
    sleeper: S,
    observer: BackoffObserver,
    gate: Mutex<()>,
    requests: AtomicU64,
    retries: AtomicU64,
    waited_ms: AtomicU64,
}

impl RateLimitedClient<TokioSleeper> {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self::with_sleeper(policy, TokioSleeper)
    }
}

impl<S: Sleeper> RateLimitedClient<S> {
    pub fn with_sleeper(policy: BackoffPolicy, sleeper: S) -> Self {
        Self {
            policy,
            sleeper,
            observer: Box::new(|event| warn!("{event}")),
            gate: Mutex::new(()),
            requests: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            waited_ms: AtomicU64::new(0),
        }
    }

    /// Replaces the default `tracing` notification emitted before each wait.
    pub fn on_backoff(mut self, observer: impl Fn(&BackoffEvent<'_>) + Send + Sync + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Runs `request` until it succeeds, fails with a non-transient error, or
    /// the attempt budget is spent.
    pub async fn call<T, F, Fut>(&self, label: &str, mut request: F) -> Result<T, FatalError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let _permit = self.gate.lock().await;
        let worst_case_total = self.policy.worst_case_total();
        let mut waited = Duration::ZERO;
        let mut attempt = 1;

        loop {
            self.requests.fetch_add(1, Ordering::Relaxed);
            let err = match request().await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            if !err.is_transient() {
                debug!(label, attempt, error = %err, "request rejected");
                return Err(FatalError::Rejected(err));
            }
            if attempt >= self.policy.max_attempts {
                return Err(FatalError::Exhausted {
                    attempts: attempt,
                    waited,
                    last: err,
                });
            }

            let wait = self.policy.wait_for_attempt(attempt);
            waited += wait;
            (self.observer)(&BackoffEvent {
                label,
                attempt,
                max_attempts: self.policy.max_attempts,
                wait,
                total_waited: waited,
                worst_case_total,
                cause: &err,
            });
            self.retries.fetch_add(1, Ordering::Relaxed);
            self.waited_ms
                .fetch_add(wait.as_millis() as u64, Ordering::Relaxed);
            self.sleeper.sleep(wait).await;
            attempt += 1;
        }
    }

    pub fn stats(&self) -> ClientStats {
        ClientStats {
            requests: self.requests.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            waited: Duration::from_millis(self.waited_ms.load(Ordering::Relaxed)),
        }
    }
}
