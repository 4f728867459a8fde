//! Condition polling
//!
//! Turns eventually-consistent cluster state into a verdict. Both checks the
//! scenarios need are built on one routine, [`poll`]:
//!
//! - [`wait_for_count`] succeeds as soon as an observation equals the target
//!   and gives up once the attempt budget is spent.
//! - [`assert_stable`] samples across a whole window and fails on the first
//!   observation that differs from the expected value. Sampling throughout
//!   the window catches transient scale-ups a single final read would miss.
//!   A sample that could not be read is a gap, and a window with gaps is
//!   not proven stable.
//!
//! Exhaustion is reported through the return value, never as an error, so
//! the caller decides how severe a missed convergence is.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::retry::RetryConfig;
use crate::Error;

/// How an `observe()` failure (e.g. a transient API error) is accounted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ObserveErrorPolicy {
    /// The failed observation counts as a non-matching attempt
    #[default]
    ConsumeAttempt,
    /// The failed observation is retried after the usual interval without
    /// consuming budget, up to `max_consecutive` failures in a row. Past
    /// that, failures consume budget again so the loop still terminates.
    Free {
        /// Consecutive failures tolerated for free
        max_consecutive: u32,
    },
}

/// What a check makes of a single observation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// The condition holds; stop polling with success
    Satisfied,
    /// Not there yet; keep polling
    Pending,
    /// The observation breaks the condition; stop polling with failure
    Violated,
}

/// Result of a [`poll`] run
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// A check returned [`Verdict::Satisfied`]
    Satisfied {
        /// Attempts used, including the satisfying one
        attempts: u32,
        /// The satisfying observation
        value: T,
    },
    /// A check returned [`Verdict::Violated`]
    Violated {
        /// Attempt number of the violating observation
        attempt: u32,
        /// The violating observation
        value: T,
    },
    /// The attempt budget ran out while checks were pending
    Exhausted {
        /// Attempts used
        attempts: u32,
        /// Last successful observation, if any
        last: Option<T>,
    },
}

impl<T> PollOutcome<T> {
    /// Whether the run ended with [`Verdict::Satisfied`]
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied { .. })
    }

    /// Whether the run ended with [`Verdict::Violated`]
    pub fn is_violated(&self) -> bool {
        matches!(self, Self::Violated { .. })
    }
}

/// Options shared by the convergence and stability checks
#[derive(Clone, Debug, PartialEq)]
pub struct PollOptions {
    /// Attempt budget and interval
    pub retry: RetryConfig,
    /// Accounting for failed observations
    pub on_error: ObserveErrorPolicy,
}

impl PollOptions {
    /// Fixed-interval polling with failed observations consuming attempts
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            retry: RetryConfig::fixed(max_attempts, interval),
            on_error: ObserveErrorPolicy::default(),
        }
    }

    /// Override the observe-error accounting
    pub fn on_error(mut self, policy: ObserveErrorPolicy) -> Self {
        self.on_error = policy;
        self
    }
}

/// Generic poll loop: observe, check, sleep, repeat.
///
/// Evaluates `observe()` immediately and then after each delay of the retry
/// schedule, at most `retry.max_attempts` counted evaluations in total.
/// Never sleeps after the final attempt. A `max_attempts` of 0 is an empty
/// budget: nothing is observed and the outcome is `Exhausted` at once.
pub async fn poll<T, F, Fut, C>(
    options: &PollOptions,
    description: &str,
    mut observe: F,
    mut check: C,
) -> PollOutcome<T>
where
    T: fmt::Debug,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
    C: FnMut(&T) -> Verdict,
{
    let retry = &options.retry;
    if retry.max_attempts == 0 {
        warn!(condition = %description, "empty attempt budget, nothing observed");
        return PollOutcome::Exhausted {
            attempts: 0,
            last: None,
        };
    }

    let mut attempt = 0u32;
    let mut consecutive_errors = 0u32;
    let mut last = None;

    loop {
        let counted = match observe().await {
            Ok(value) => {
                consecutive_errors = 0;
                attempt += 1;
                match check(&value) {
                    Verdict::Satisfied => {
                        debug!(condition = %description, attempt, value = ?value, "condition satisfied");
                        return PollOutcome::Satisfied {
                            attempts: attempt,
                            value,
                        };
                    }
                    Verdict::Violated => {
                        warn!(condition = %description, attempt, value = ?value, "condition violated");
                        return PollOutcome::Violated { attempt, value };
                    }
                    Verdict::Pending => {
                        trace!(condition = %description, attempt, value = ?value, "condition pending");
                        last = Some(value);
                        true
                    }
                }
            }
            Err(e) => {
                consecutive_errors += 1;
                let free = match options.on_error {
                    ObserveErrorPolicy::ConsumeAttempt => false,
                    ObserveErrorPolicy::Free { max_consecutive } => {
                        consecutive_errors <= max_consecutive
                    }
                };
                debug!(
                    condition = %description,
                    error = %e,
                    consecutive_errors,
                    consumes_attempt = !free,
                    "observation failed, retrying"
                );
                if !free {
                    attempt += 1;
                }
                !free
            }
        };

        if counted && attempt >= retry.max_attempts {
            return PollOutcome::Exhausted {
                attempts: attempt,
                last,
            };
        }

        tokio::time::sleep(retry.delay_after(attempt.max(1))).await;
    }
}

/// Wait until `observe()` returns `target`.
///
/// Returns `true` iff some evaluation matched within `max_attempts`
/// evaluations spaced `interval` apart.
pub async fn wait_for_count<F, Fut>(
    description: &str,
    observe: F,
    target: i32,
    options: &PollOptions,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<i32, Error>>,
{
    let outcome = poll(options, description, observe, |count| {
        if *count == target {
            Verdict::Satisfied
        } else {
            Verdict::Pending
        }
    })
    .await;

    if let PollOutcome::Exhausted { attempts, last } = &outcome {
        warn!(
            condition = %description,
            target,
            attempts,
            last = ?last,
            "count did not converge"
        );
    }
    outcome.is_satisfied()
}

/// Prove `observe()` stays at `expected` for the whole `window`.
///
/// Takes one sample every `interval` (`window / interval` samples, at least
/// one) and returns `false` at the first deviating sample. Every counted
/// sample must be a successful read: a failed read that consumes a sample
/// leaves a gap and fails the check. Under [`ObserveErrorPolicy::Free`]
/// failed reads are retried in place instead.
pub async fn assert_stable<F, Fut>(
    description: &str,
    observe: F,
    expected: i32,
    window: Duration,
    interval: Duration,
    on_error: ObserveErrorPolicy,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<i32, Error>>,
{
    let options = PollOptions::fixed(stability_samples(window, interval), interval).on_error(on_error);

    let mut read = 0u32;
    let outcome = poll(&options, description, observe, |count| {
        read += 1;
        if *count == expected {
            Verdict::Pending
        } else {
            Verdict::Violated
        }
    })
    .await;

    match outcome {
        PollOutcome::Violated { .. } => false,
        PollOutcome::Satisfied { .. } => true,
        PollOutcome::Exhausted { attempts, .. } => {
            if read < attempts {
                warn!(
                    condition = %description,
                    expected,
                    samples = attempts,
                    failed_reads = attempts - read,
                    "stability not proven, some samples could not be read"
                );
            }
            read == attempts
        }
    }
}

/// Number of samples taken across a stability window
pub fn stability_samples(window: Duration, interval: Duration) -> u32 {
    if interval.is_zero() {
        return 1;
    }
    let samples = window.as_millis() / interval.as_millis().max(1);
    samples.clamp(1, u32::MAX as u128) as u32
}
