//! Throttled call executor
//!
//! Every outbound Gmail call goes through [`ThrottledExecutor`], which
//! stacks three independent gates in front of the operation:
//!
//! 1. an admission gate: a permit pool capping concurrent calls,
//! 2. a quota window: at most `quota` counted requests per `window`,
//! 3. exponential backoff retry when the provider signals throttling.
//!
//! The quota counter is reserved atomically at admission, so concurrent
//! callers cannot race past an exhausted window.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, warn};

/// Retry policy for throttled calls.
///
/// Attempts are numbered from 1. After attempt `n` fails with a
/// throttling error the executor sleeps `2^n * base_delay` before the
/// next attempt, up to `max_attempts` attempts in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Limits applied by a [`ThrottledExecutor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Capacity of the admission gate.
    pub max_in_flight: usize,
    /// Requests counted per quota window.
    pub quota: u32,
    /// Length of one quota window.
    pub window: Duration,
    pub retry: RetryPolicy,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 100,
            quota: 100,
            window: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

impl ThrottleConfig {
    /// Reject limits that would stall every call.
    pub fn validate(&self) -> Result<()> {
        if self.max_in_flight == 0 || self.max_in_flight > Semaphore::MAX_PERMITS {
            return Err(Error::Config(format!(
                "max_in_flight must be between 1 and {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.quota == 0 {
            return Err(Error::Config("quota must be at least 1".into()));
        }
        if self.window.is_zero() {
            return Err(Error::Config("quota window must be non-zero".into()));
        }
        // Two windows of headroom: the reset instant is advanced from a
        // point that can already be one window ahead of now.
        if Instant::now()
            .checked_add(self.window.saturating_mul(2))
            .is_none()
        {
            return Err(Error::Config(format!(
                "quota window of {}s is too large",
                self.window.as_secs()
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

/// Point-in-time view of the quota window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetSnapshot {
    pub requests_used: u32,
    pub window_reset_at: Instant,
}

/// Request counter for the current quota window.
#[derive(Debug)]
struct CallBudget {
    used: u32,
    reset_at: Instant,
    /// Bumped on every reset so stale reservations can be told apart.
    epoch: u64,
}

impl CallBudget {
    fn new(now: Instant, window: Duration) -> Self {
        Self {
            used: 0,
            reset_at: next_reset(now, window),
            epoch: 0,
        }
    }

    /// Start a new window if the current one has elapsed.
    fn roll(&mut self, now: Instant, window: Duration) -> bool {
        if now < self.reset_at {
            return false;
        }
        self.used = 0;
        self.reset_at = match self.reset_at.checked_add(window) {
            Some(at) if at > now => at,
            // Idle for more than a full window.
            _ => next_reset(now, window),
        };
        self.epoch += 1;
        true
    }
}

/// `from + window`, saturating at `from` when the sum is not
/// representable.
fn next_reset(from: Instant, window: Duration) -> Instant {
    from.checked_add(window).unwrap_or(from)
}

/// A quota slot held by one in-flight attempt.
#[derive(Debug, Clone, Copy)]
struct Reservation {
    epoch: u64,
}

/// Wraps remote calls with admission control, a quota window and
/// retry on throttling.
///
/// Share one executor between all tasks (e.g. behind an `Arc`); the
/// gate and the budget are only meaningful when shared.
#[derive(Debug)]
pub struct ThrottledExecutor {
    gate: Semaphore,
    budget: Mutex<CallBudget>,
    config: ThrottleConfig,
}

impl ThrottledExecutor {
    /// Create an executor with the given limits.
    pub fn new(config: ThrottleConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            gate: Semaphore::new(config.max_in_flight),
            budget: Mutex::new(CallBudget::new(Instant::now(), config.window)),
            config,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// Current quota window state.
    #[must_use]
    pub fn budget(&self) -> BudgetSnapshot {
        let budget = self.budget.lock();
        BudgetSnapshot {
            requests_used: budget.used,
            window_reset_at: budget.reset_at,
        }
    }

    /// Number of calls currently holding an admission permit.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.config.max_in_flight - self.gate.available_permits()
    }

    /// Run `operation`, retrying only on [`Error::RateLimited`].
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_with(operation, Error::is_rate_limited).await
    }

    /// Run `operation`, retrying errors for which `is_throttled` holds.
    ///
    /// The operation is invoked once per attempt. Any error that is not
    /// classified as throttling is returned after a single invocation.
    pub async fn execute_with<T, F, Fut, C>(&self, mut operation: F, is_throttled: C) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        C: Fn(&Error) -> bool,
    {
        let _window = WindowGuard { executor: self };
        let retry = self.config.retry;
        let mut attempt: u32 = 1;

        loop {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| Error::Task("admission gate closed".into()))?;
            let reservation = self.reserve().await;

            let outcome = operation().await;
            drop(permit);

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            self.refund(reservation);

            if !is_throttled(&err) {
                return Err(err);
            }
            if attempt >= retry.max_attempts {
                warn!("Giving up after {} throttled attempts: {}", attempt, err);
                return Err(err);
            }

            let delay = retry.backoff(attempt);
            warn!(
                "Rate limit exceeded. Waiting {} ms before retrying (attempt {}/{})",
                delay.as_millis(),
                attempt,
                retry.max_attempts
            );
            sleep(delay).await;
            attempt += 1;
        }
    }

    /// Take one quota slot, waiting for the window reset when exhausted.
    async fn reserve(&self) -> Reservation {
        loop {
            let wait_until = {
                let mut budget = self.budget.lock();
                budget.roll(Instant::now(), self.config.window);
                if budget.used < self.config.quota {
                    budget.used += 1;
                    break Reservation {
                        epoch: budget.epoch,
                    };
                }
                budget.reset_at
            };
            debug!(
                "Quota of {} requests exhausted, waiting {} ms for window reset",
                self.config.quota,
                wait_until
                    .saturating_duration_since(Instant::now())
                    .as_millis()
            );
            sleep_until(wait_until).await;
        }
    }

    /// Return a slot whose attempt did not succeed.
    fn refund(&self, reservation: Reservation) {
        let mut budget = self.budget.lock();
        if budget.epoch == reservation.epoch {
            budget.used = budget.used.saturating_sub(1);
        }
    }

    fn roll_window(&self) {
        let mut budget = self.budget.lock();
        if budget.roll(Instant::now(), self.config.window) {
            debug!("Quota window reset");
        }
    }
}

/// Runs the window check exactly once when a call returns, whatever
/// path it returns through.
struct WindowGuard<'a> {
    executor: &'a ThrottledExecutor,
}

impl Drop for WindowGuard<'_> {
    fn drop(&mut self) {
        self.executor.roll_window();
    }
}
