use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{QueueError, Result};

/// Custom retry decision: receives the retries made so far and the failed
/// attempt's error, returns the delay before the next attempt or `None` to
/// surface the error.
pub type RetryFn = Arc<dyn Fn(u32, &QueueError) -> Option<Duration> + Send + Sync>;

/// An HTTP status or error code that marks a failure as transient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransientError {
    Status(u16),
    Code(String),
}

impl From<u16> for TransientError {
    fn from(status: u16) -> Self {
        Self::Status(status)
    }
}

impl From<&str> for TransientError {
    fn from(code: &str) -> Self {
        Self::Code(code.to_owned())
    }
}

/// Exponential backoff with jitter over a fixed set of transient errors.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub retries: u32,
    /// Delay before the first retry.
    pub first_delay: Duration,
    /// Multiplier applied to the previous delay for each further retry.
    pub next_delay_mult: f64,
    /// Jitter fraction: `delay *= 1 + (random in [-0.5, 0.5]) * variability`.
    pub variability: f64,
    pub transient_errors: Vec<TransientError>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            first_delay: Duration::from_millis(2_000),
            next_delay_mult: 2.0,
            variability: 0.2,
            transient_errors: default_transient_errors(),
        }
    }
}

pub fn default_transient_errors() -> Vec<TransientError> {
    vec![
        500.into(),
        501.into(),
        502.into(),
        503.into(),
        "ETIMEDOUT".into(),
        "ECONNRESET".into(),
        "EADDRINUSE".into(),
        "ESOCKETTIMEDOUT".into(),
        "ECONNREFUSED".into(),
    ]
}

impl RetryPolicy {
    /// Returns true when `err`'s status or code is in the transient set.
    pub fn is_transient(&self, err: &QueueError) -> bool {
        self.transient_errors.iter().any(|transient| match transient {
            TransientError::Status(status) => err.status() == Some(*status),
            TransientError::Code(code) => err.code() == Some(code.as_str()),
        })
    }

    /// Advances `state` and returns the next delay. `jitter` is expected in
    /// `[-0.5, 0.5]`.
    fn next_delay(&self, state: &mut RetryState, jitter: f64) -> Duration {
        state.retries += 1;
        let base = if state.retries == 1 {
            self.first_delay.as_millis() as f64
        } else {
            state.delay_ms * self.next_delay_mult
        };
        state.delay_ms = (base + jitter * self.variability * base).floor().max(0.0);
        Duration::from_millis(state.delay_ms as u64)
    }
}

/// Backoff state for one logical call. Never shared between calls.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct RetryState {
    retries: u32,
    delay_ms: f64,
}

/// How failed attempts are retried.
#[derive(Clone)]
pub enum RetryMode {
    /// The first outcome is returned as is.
    Disabled,
    Policy(RetryPolicy),
    Custom(RetryFn),
}

impl Default for RetryMode {
    fn default() -> Self {
        Self::Policy(RetryPolicy::default())
    }
}

impl fmt::Debug for RetryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("Disabled"),
            Self::Policy(policy) => f.debug_tuple("Policy").field(policy).finish(),
            Self::Custom(_) => f.write_str("Custom(<fn>)"),
        }
    }
}

impl RetryMode {
    /// Runs `attempt` until it succeeds, fails with a non-retryable error or
    /// the retry budget is spent. Errors carry the number of retries made.
    pub async fn run<T, F, Fut>(&self, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let policy = match self {
            Self::Disabled => return attempt().await,
            Self::Policy(policy) => Some(policy),
            Self::Custom(_) => None,
        };

        let mut state = RetryState::default();
        loop {
            let err = match attempt().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let delay = match (policy, self) {
                (Some(policy), _) => (state.retries < policy.retries && policy.is_transient(&err))
                    .then(|| policy.next_delay(&mut state, jitter())),
                (None, Self::Custom(decide)) => decide(state.retries, &err).map(|delay| {
                    state.retries += 1;
                    delay
                }),
                (None, _) => None,
            };

            match delay {
                Some(delay) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        retry = state.retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying queue request"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(retries_made = state.retries, error = %err, "giving up on queue request");
                    return Err(err.with_retries_made(state.retries));
                }
            }
        }
    }
}

fn jitter() -> f64 {
    rand::thread_rng().gen_range(-0.5..=0.5)
}
