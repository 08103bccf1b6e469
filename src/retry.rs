use std::time::Duration;

use crate::gateway::GatewayError;

/// Errors that can tell whether a repeat attempt is worthwhile.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for GatewayError {
    fn is_transient(&self) -> bool {
        GatewayError::is_transient(self)
    }
}

/// Fixed backoff schedule: one attempt per delay, each attempt preceded by
/// its delay.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_millis(&[0, 1000, 2000])
    }
}

impl RetryPolicy {
    pub fn new(delays: Vec<Duration>) -> Self {
        if delays.is_empty() {
            // Always make at least one attempt.
            return Self {
                delays: vec![Duration::ZERO],
            };
        }
        Self { delays }
    }

    pub fn from_millis(delays: &[u64]) -> Self {
        Self::new(delays.iter().copied().map(Duration::from_millis).collect())
    }

    pub fn max_attempts(&self) -> usize {
        self.delays.len()
    }

    /// Run `op` until it succeeds, fails permanently, or the attempts run out.
    /// Sleeps on the calling thread between attempts.
    pub fn run<T, E, F>(&self, op: F) -> Result<T, E>
    where
        E: Transient + std::fmt::Display,
        F: FnMut(usize) -> Result<T, E>,
    {
        self.run_with_sleep(op, std::thread::sleep)
    }

    pub fn run_with_sleep<T, E, F, S>(&self, mut op: F, mut sleep: S) -> Result<T, E>
    where
        E: Transient + std::fmt::Display,
        F: FnMut(usize) -> Result<T, E>,
        S: FnMut(Duration),
    {
        let mut attempt = 0;
        loop {
            let delay = self.delays[attempt];
            if !delay.is_zero() {
                tracing::info!(attempt = attempt + 1, ?delay, "retrying after delay");
                sleep(delay);
            }
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if !err.is_transient() {
                        tracing::warn!("permanent failure, not retrying: {err}");
                        return Err(err);
                    }
                    if attempt >= self.delays.len() {
                        tracing::warn!(attempts = attempt, "giving up after transient failures: {err}");
                        return Err(err);
                    }
                    tracing::warn!(attempt, "transient failure: {err}");
                }
            }
        }
    }
}
