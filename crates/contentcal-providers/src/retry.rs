//! Retrying executor for remote operations.
//!
//! Every outbound API call goes through [`RetryExecutor::execute`]. A failed
//! call is classified (see [`ErrorClass`]) and [`RetryExecutor::decide`]
//! picks the next step: retry after an exponential delay with jitter, or
//! give up with a [`RemoteError`].
//!
//! Operations that are not idempotent (creating a spreadsheet, adding a
//! permission) are only retried when the failure proves the request was
//! never processed, which is the case for rate limiting.

use std::future::Future;
use std::time::Duration;

use rand::Rng as _;
use tracing::{debug, warn};

use crate::error::{ErrorClass, ProviderError, ProviderResult, RemoteError, RemoteErrorKind};

/// Default number of calls per operation, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default growth factor between retries.
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Default cap on the backoff delay (jitter and `Retry-After` excluded).
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);

/// Default upper bound of the random jitter added to each delay.
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(1000);

/// A named API action and how safely it can be repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteOperation {
    name: &'static str,
    idempotent: bool,
    required: bool,
}

impl RemoteOperation {
    /// An operation that can be repeated without changing the outcome.
    pub const fn idempotent(name: &'static str) -> Self {
        Self {
            name,
            idempotent: true,
            required: true,
        }
    }

    /// An operation with side effects that must not be duplicated.
    pub const fn non_idempotent(name: &'static str) -> Self {
        Self {
            name,
            idempotent: false,
            required: true,
        }
    }

    /// Marks the operation as optional: its failure is logged, not fatal.
    pub const fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_idempotent(&self) -> bool {
        self.idempotent
    }

    pub fn is_required(&self) -> bool {
        self.required
    }
}

/// Backoff configuration. Built once at startup and never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Calls per operation, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Growth factor applied per retry.
    pub multiplier: f64,
    /// Cap on the exponential part of the delay.
    pub max_delay: Duration,
    /// Upper bound of the uniform random jitter.
    pub max_jitter: Duration,
    /// Whether a rate-limited non-idempotent operation may be retried.
    pub retry_rate_limited_non_idempotent: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
            max_delay: DEFAULT_MAX_DELAY,
            max_jitter: DEFAULT_MAX_JITTER,
            retry_rate_limited_non_idempotent: true,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_max_jitter(mut self, jitter: Duration) -> Self {
        self.max_jitter = jitter;
        self
    }

    pub fn with_rate_limited_non_idempotent_retries(mut self, allow: bool) -> Self {
        self.retry_rate_limited_non_idempotent = allow;
        self
    }

    /// Validates the policy.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(format!(
                "multiplier must be a finite number >= 1.0, got {}",
                self.multiplier
            ));
        }
        if self.base_delay > self.max_delay {
            return Err(format!(
                "base_delay ({:?}) cannot be greater than max_delay ({:?})",
                self.base_delay, self.max_delay
            ));
        }
        Ok(())
    }

    /// Exponential delay before retry number `attempt + 1`, without jitter.
    ///
    /// `base_delay * multiplier^attempt`, capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let nanos = self.base_delay.as_nanos() as f64 * self.multiplier.powi(exponent);
        let cap = self.max_delay.as_nanos() as f64;
        if !nanos.is_finite() || nanos >= cap {
            return self.max_delay;
        }
        Duration::from_nanos(nanos.round() as u64)
    }

    /// Draws a random jitter in `[0, max_jitter]`.
    pub fn jitter(&self) -> Duration {
        if self.max_jitter.is_zero() {
            return Duration::ZERO;
        }
        let max_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }

    /// Full delay before the next retry, honouring a server `Retry-After`.
    ///
    /// The requested wait is capped at `max_delay`.
    pub fn delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let computed = self.backoff(attempt) + self.jitter();
        match retry_after {
            Some(requested) => computed.max(requested.min(self.max_delay)),
            None => computed,
        }
    }
}

/// What to do after a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the given delay, then call again.
    Retry(Duration),
    /// Stop and report a failure of the given kind.
    GiveUp(RemoteErrorKind),
}

/// Runs remote operations under a [`RetryPolicy`].
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Decides how to proceed after `calls` failed calls ending in `error`.
    pub fn decide(
        &self,
        operation: &RemoteOperation,
        error: &ProviderError,
        calls: u32,
    ) -> RetryDecision {
        let class = error.class();

        if class == ErrorClass::Fatal {
            return RetryDecision::GiveUp(RemoteErrorKind::Fatal);
        }

        let known_safe = class == ErrorClass::RateLimited
            && self.policy.retry_rate_limited_non_idempotent;
        if !operation.is_idempotent() && !known_safe {
            return RetryDecision::GiveUp(class.into());
        }

        if calls >= self.policy.max_attempts {
            return RetryDecision::GiveUp(RemoteErrorKind::RetriesExhausted);
        }

        // The server wants a longer pause than the policy allows.
        if error.retry_after().is_some_and(|wait| wait > self.policy.max_delay) {
            return RetryDecision::GiveUp(class.into());
        }

        RetryDecision::Retry(self.policy.delay(calls - 1, error.retry_after()))
    }

    /// Runs `call` until it succeeds or the policy gives up.
    ///
    /// `call` is invoked once per attempt and must build a fresh request
    /// each time.
    pub async fn execute<T, F, Fut>(
        &self,
        operation: &RemoteOperation,
        mut call: F,
    ) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let mut calls: u32 = 0;

        loop {
            calls += 1;
            let error = match call().await {
                Ok(value) => {
                    if calls > 1 {
                        debug!(
                            operation = operation.name(),
                            attempts = calls,
                            "operation succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            match self.decide(operation, &error, calls) {
                RetryDecision::Retry(delay) => {
                    warn!(
                        operation = operation.name(),
                        attempt = calls,
                        max_attempts = self.policy.max_attempts,
                        code = %error.code(),
                        delay_ms = delay.as_millis() as u64,
                        "remote call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp(kind) => {
                    debug!(
                        operation = operation.name(),
                        attempts = calls,
                        kind = %kind,
                        code = %error.code(),
                        "giving up on remote call"
                    );
                    return Err(RemoteError::new(kind, operation.name(), calls, error));
                }
            }
        }
    }
}
