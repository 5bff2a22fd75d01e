//! Elapsed-time bounded retry.
//!
//! Registry propagation after a release is eventually consistent, so the
//! post-release install check keeps retrying until it either succeeds or a
//! wall-clock ceiling is exhausted. The ceiling is measured, not counted:
//! attempts are unbounded and run back to back, and the clock is sampled
//! once when the session starts and once after every failure.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use conveyor_retry::{SystemClock, retry_until};
//!
//! let clock = SystemClock::default();
//! let value = retry_until(&clock, Duration::from_secs(5), "install", |attempt| {
//!     if attempt < 3 { Err("registry not ready") } else { Ok(attempt) }
//! })
//! .expect("succeeds before the ceiling");
//! assert_eq!(value, 3);
//! ```

use std::cell::Cell;
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Source of elapsed time.
///
/// Readings only need to be monotonic relative to each other; the origin is
/// arbitrary.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Monotonic clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven clock for simulations and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get().saturating_add(by));
    }

    pub fn set(&self, to: Duration) {
        self.now.set(to);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// State of a [`RetrySession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryState {
    Attempting,
    Succeeded,
    Exceeded,
}

/// Bookkeeping for one bounded-retry invocation.
#[derive(Debug)]
pub struct RetrySession<'c, C: Clock + ?Sized> {
    clock: &'c C,
    started_at: Duration,
    ceiling: Duration,
    attempts: u32,
    elapsed: Duration,
    state: RetryState,
}

impl<'c, C: Clock + ?Sized> RetrySession<'c, C> {
    pub fn start(clock: &'c C, ceiling: Duration) -> Self {
        Self {
            clock,
            started_at: clock.now(),
            ceiling,
            attempts: 0,
            elapsed: Duration::ZERO,
            state: RetryState::Attempting,
        }
    }

    /// Count a new attempt and return its 1-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        self.attempts
    }

    pub fn succeed(&mut self) {
        self.state = RetryState::Succeeded;
    }

    /// Record a failed attempt; samples the clock.
    pub fn fail(&mut self) -> RetryState {
        self.elapsed = self.clock.now().saturating_sub(self.started_at);
        self.state = if self.elapsed >= self.ceiling {
            RetryState::Exceeded
        } else {
            RetryState::Attempting
        };
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Elapsed time as of the last failure.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    pub fn state(&self) -> RetryState {
        self.state
    }
}

/// Raised once the ceiling is reached; wraps the last underlying error.
#[derive(Debug)]
pub struct RetryExceeded<E> {
    pub operation: String,
    pub attempts: u32,
    pub elapsed: Duration,
    pub last_error: E,
}

impl<E: fmt::Display> fmt::Display for RetryExceeded<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // whole milliseconds keep the rendering stable
        let elapsed = Duration::from_millis(self.elapsed.as_millis() as u64);
        write!(
            f,
            "unable to {} after {} attempt(s) over {}: {}",
            self.operation,
            self.attempts,
            humantime::format_duration(elapsed),
            self.last_error
        )
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryExceeded<E> {}

/// Run `attempt` until it succeeds or `ceiling` has elapsed.
///
/// `attempt` receives the 1-based attempt number. `operation` names what is
/// being retried and ends up in the error message (`unable to <operation>`).
pub fn retry_until<C, T, E, F>(
    clock: &C,
    ceiling: Duration,
    operation: &str,
    mut attempt: F,
) -> Result<T, RetryExceeded<E>>
where
    C: Clock + ?Sized,
    E: fmt::Display,
    F: FnMut(u32) -> Result<T, E>,
{
    let mut session = RetrySession::start(clock, ceiling);

    loop {
        let number = session.begin_attempt();
        match attempt(number) {
            Ok(value) => {
                session.succeed();
                return Ok(value);
            }
            Err(err) => {
                if session.fail() == RetryState::Exceeded {
                    tracing::warn!(
                        operation,
                        attempts = session.attempts(),
                        elapsed_ms = session.elapsed().as_millis() as u64,
                        "retry ceiling reached"
                    );
                    return Err(RetryExceeded {
                        operation: operation.to_string(),
                        attempts: session.attempts(),
                        elapsed: session.elapsed(),
                        last_error: err,
                    });
                }
                tracing::debug!(
                    operation,
                    attempt = number,
                    elapsed_ms = session.elapsed().as_millis() as u64,
                    error = %err,
                    "attempt failed; retrying"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CEILING: Duration = Duration::from_secs(180);

    #[test]
    fn succeeds_on_first_attempt_without_sampling_failure_time() {
        let clock = ManualClock::new();
        let result: Result<u32, RetryExceeded<&str>> =
            retry_until(&clock, CEILING, "install", Ok);
        assert_eq!(result.expect("ok"), 1);
    }

    #[test]
    fn retries_immediately_until_success() {
        let clock = ManualClock::new();
        let mut seen = Vec::new();
        let result = retry_until(&clock, CEILING, "install", |attempt| {
            seen.push(attempt);
            clock.advance(Duration::from_millis(100));
            if attempt < 2 { Err("fake error") } else { Ok("done") }
        });

        assert_eq!(result.expect("ok"), "done");
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn fails_once_ceiling_is_reached() {
        // readings mirror a clock that jumps far past the ceiling on the fifth failure
        let readings = [100u64, 200, 300, 400, 500, 99_999_999];
        let clock = ManualClock::new();
        clock.set(Duration::from_millis(readings[0]));

        let err = retry_until(
            &clock,
            Duration::from_secs(180),
            "install",
            |attempt| -> Result<(), String> {
                clock.set(Duration::from_millis(readings[attempt as usize]));
                Err("fake error".to_string())
            },
        )
        .expect_err("must exceed");

        assert_eq!(err.attempts, 5);
        assert_eq!(err.last_error, "fake error");
        assert!(err.to_string().starts_with("unable to install"));
    }

    #[test]
    fn elapsed_equal_to_ceiling_is_exceeded() {
        let clock = ManualClock::new();
        let err = retry_until(&clock, Duration::from_secs(1), "install", |_| -> Result<(), &'static str> {
            clock.advance(Duration::from_secs(1));
            Err("nope")
        })
        .expect_err("must exceed");
        assert_eq!(err.attempts, 1);
    }

    #[test]
    fn zero_ceiling_allows_exactly_one_attempt() {
        let clock = ManualClock::new();
        let err = retry_until(&clock, Duration::ZERO, "install", |_| -> Result<(), &'static str> {
            Err("nope")
        })
        .expect_err("must exceed");
        assert_eq!(err.attempts, 1);
        assert_eq!(err.elapsed, Duration::ZERO);
    }

    #[test]
    fn session_tracks_state_transitions() {
        let clock = ManualClock::new();
        let mut session = RetrySession::start(&clock, Duration::from_secs(10));
        assert_eq!(session.state(), RetryState::Attempting);

        session.begin_attempt();
        clock.advance(Duration::from_secs(3));
        assert_eq!(session.fail(), RetryState::Attempting);
        assert_eq!(session.elapsed(), Duration::from_secs(3));

        session.begin_attempt();
        session.succeed();
        assert_eq!(session.state(), RetryState::Succeeded);
        assert_eq!(session.attempts(), 2);
        assert_eq!(session.ceiling(), Duration::from_secs(10));
    }

    #[test]
    fn exceeded_error_message_is_readable() {
        let err = RetryExceeded {
            operation: "install".to_string(),
            attempts: 3,
            elapsed: Duration::from_secs(181),
            last_error: "npm ERR! 404",
        };
        insta::assert_snapshot!(
            err.to_string(),
            @"unable to install after 3 attempt(s) over 3m 1s: npm ERR! 404"
        );
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::default();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn retry_state_serializes_snake_case() {
        let json = serde_json::to_string(&RetryState::Exceeded).expect("serialize");
        assert_eq!(json, "\"exceeded\"");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// With per-failure steps, the verifier stops on exactly the attempt
            /// whose cumulative elapsed time first reaches the ceiling.
            #[test]
            fn stops_on_first_attempt_reaching_ceiling(
                steps in proptest::collection::vec(1u64..50, 1..40),
                ceiling in 1u64..500,
            ) {
                let clock = ManualClock::new();
                let mut cumulative = 0u64;
                let mut expected = None;
                for (i, step) in steps.iter().enumerate() {
                    cumulative += step;
                    if cumulative >= ceiling {
                        expected = Some(i as u32 + 1);
                        break;
                    }
                }

                let result = retry_until(&clock, Duration::from_millis(ceiling), "install", |attempt| {
                    let idx = attempt as usize - 1;
                    match steps.get(idx) {
                        Some(step) => {
                            clock.advance(Duration::from_millis(*step));
                            Err("transient")
                        }
                        None => Ok(attempt),
                    }
                });

                match expected {
                    Some(n) => {
                        let err = result.expect_err("ceiling reached");
                        prop_assert_eq!(err.attempts, n);
                    }
                    None => {
                        prop_assert_eq!(result.expect("succeeds"), steps.len() as u32 + 1);
                    }
                }
            }

            /// Success before the ceiling is returned immediately.
            #[test]
            fn success_short_circuits(succeed_on in 1u32..20) {
                let clock = ManualClock::new();
                let mut calls = 0;
                let result = retry_until(&clock, CEILING, "install", |attempt| {
                    calls += 1;
                    clock.advance(Duration::from_millis(1));
                    if attempt == succeed_on { Ok(()) } else { Err("transient") }
                });
                prop_assert!(result.is_ok());
                prop_assert_eq!(calls, succeed_on);
            }
        }
    }
}
