//! Bounded retry with a fixed delay between attempts.
//!
//! Used for both the container-runtime recheck and web-app readiness polling.
//! The bound is an attempt count, not a wall-clock deadline.
use anyhow::Result;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

/// Result of a single attempt.
#[derive(Debug)]
pub enum Attempt<T> {
    Ready(T),
    /// Not ready yet; the string describes why.
    Pending(String),
}

#[derive(Debug, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    Ready(T),
    Exhausted { attempts: u32, last: String },
    /// `before_retry` declined to continue.
    Aborted,
}

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Run `attempt` until it reports ready or the attempt budget is spent.
    ///
    /// Between attempts, `before_retry` is consulted with the number of the
    /// attempt that just failed; returning `false` stops with `Aborted`. The
    /// delay is applied after `before_retry` agrees and never after the last
    /// attempt. Errors from either closure propagate immediately.
    pub fn run<T>(
        &self,
        sleeper: &dyn Sleeper,
        mut before_retry: impl FnMut(u32) -> Result<bool>,
        mut attempt: impl FnMut(u32) -> Result<Attempt<T>>,
    ) -> Result<RetryOutcome<T>> {
        let mut last = String::from("no attempts made");
        for number in 1..=self.max_attempts {
            match attempt(number)? {
                Attempt::Ready(value) => return Ok(RetryOutcome::Ready(value)),
                Attempt::Pending(reason) => {
                    tracing::debug!(
                        attempt = number,
                        max = self.max_attempts,
                        %reason,
                        "not ready"
                    );
                    last = reason;
                }
            }
            if number < self.max_attempts {
                if !before_retry(number)? {
                    return Ok(RetryOutcome::Aborted);
                }
                sleeper.sleep(self.delay);
            }
        }
        Ok(RetryOutcome::Exhausted {
            attempts: self.max_attempts,
            last,
        })
    }
}
