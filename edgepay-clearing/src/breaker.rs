use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// The three states a circuit breaker can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: BreakerState,
    failure_count: u32,
    window_start: Instant,
    opened_at: Instant,
    /// Set while a HALF_OPEN trial call is outstanding, so a second
    /// concurrent caller doesn't also get admitted as a trial.
    trial_in_flight: bool,
}

/// Whether a caller is admitted to attempt the remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    ShortCircuited,
}

/// Process-global (per clearing endpoint) circuit breaker state. CLOSED
/// counts failures inside a rolling `window_seconds`; at
/// `failure_threshold` it trips OPEN for `open_seconds`, then admits one
/// HALF_OPEN trial whose outcome decides CLOSED (reset) or OPEN again.
pub struct CircuitBreaker {
    window: Duration,
    failure_threshold: u32,
    open_duration: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(window: Duration, failure_threshold: u32, open_duration: Duration) -> Self {
        let now = Instant::now();
        CircuitBreaker {
            window,
            failure_threshold,
            open_duration,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failure_count: 0,
                window_start: now,
                opened_at: now,
                trial_in_flight: false,
            }),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    /// Decides whether to admit a call right now. Must be paired with
    /// exactly one of `record_success`/`record_failure` if `Allowed` is
    /// returned and the call was actually attempted.
    pub fn admit(&self) -> Admission {
        self.admit_at(Instant::now())
    }

    pub fn admit_at(&self, now: Instant) -> Admission {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => {
                if now.duration_since(inner.window_start) >= self.window {
                    inner.window_start = now;
                    inner.failure_count = 0;
                }
                Admission::Allowed
            }
            BreakerState::Open => {
                if now.duration_since(inner.opened_at) >= self.open_duration {
                    if inner.trial_in_flight {
                        Admission::ShortCircuited
                    } else {
                        inner.state = BreakerState::HalfOpen;
                        inner.trial_in_flight = true;
                        Admission::Allowed
                    }
                } else {
                    Admission::ShortCircuited
                }
            }
            BreakerState::HalfOpen => Admission::ShortCircuited,
        }
    }

    pub fn record_success(&self) {
        self.record_success_at(Instant::now());
    }

    pub fn record_success_at(&self, now: Instant) {
        let mut inner = self.inner.lock();
        inner.state = BreakerState::Closed;
        inner.failure_count = 0;
        inner.window_start = now;
        inner.trial_in_flight = false;
    }

    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now());
    }

    pub fn record_failure_at(&self, now: Instant) {
        let mut inner = self.inner.lock();
        inner.trial_in_flight = false;
        match inner.state {
            BreakerState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at = now;
                }
            }
            BreakerState::HalfOpen | BreakerState::Open => {
                inner.state = BreakerState::Open;
                inner.opened_at = now;
                inner.failure_count = self.failure_threshold;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_failure_threshold_within_window() {
        let breaker = CircuitBreaker::new(Duration::from_secs(60), 3, Duration::from_secs(30));
        let t0 = Instant::now();
        for _ in 0..3 {
            assert_eq!(breaker.admit_at(t0), Admission::Allowed);
            breaker.record_failure_at(t0);
        }
        assert_eq!(breaker.state(), BreakerState::Open);
        assert_eq!(breaker.admit_at(t0), Admission::ShortCircuited);
    }

    #[test]
    fn half_open_trial_after_open_duration_elapses() {
        let breaker = CircuitBreaker::new(Duration::from_secs(60), 2, Duration::from_secs(10));
        let t0 = Instant::now();
        breaker.admit_at(t0);
        breaker.record_failure_at(t0);
        breaker.admit_at(t0);
        breaker.record_failure_at(t0);
        assert_eq!(breaker.state(), BreakerState::Open);

        let t1 = t0 + Duration::from_secs(11);
        assert_eq!(breaker.admit_at(t1), Admission::Allowed);
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        // A second concurrent caller must not also get a trial.
        assert_eq!(breaker.admit_at(t1), Admission::ShortCircuited);
    }

    #[test]
    fn successful_trial_closes_the_breaker() {
        let breaker = CircuitBreaker::new(Duration::from_secs(60), 1, Duration::from_secs(10));
        let t0 = Instant::now();
        breaker.admit_at(t0);
        breaker.record_failure_at(t0);
        let t1 = t0 + Duration::from_secs(11);
        breaker.admit_at(t1);
        breaker.record_success_at(t1);
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert_eq!(breaker.admit_at(t1), Admission::Allowed);
    }

    #[test]
    fn failed_trial_reopens_the_breaker() {
        let breaker = CircuitBreaker::new(Duration::from_secs(60), 1, Duration::from_secs(10));
        let t0 = Instant::now();
        breaker.admit_at(t0);
        breaker.record_failure_at(t0);
        let t1 = t0 + Duration::from_secs(11);
        breaker.admit_at(t1);
        breaker.record_failure_at(t1);
        assert_eq!(breaker.state(), BreakerState::Open);
    }
}
