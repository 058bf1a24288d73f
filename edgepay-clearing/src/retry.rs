use std::thread;
use std::time::Duration;

/// Runs `f` up to `max_retries + 1` times (attempts `0..=max_retries`),
/// sleeping `base_ms * 2^attempt` between attempts. Returns
/// the first success, or the last error if every attempt failed.
pub fn retry_with_backoff<T, E>(
    max_retries: u32,
    base_ms: u64,
    mut f: impl FnMut(u32) -> Result<T, E>,
) -> Result<T, E> {
    let mut last_err = None;
    for attempt in 0..=max_retries {
        match f(attempt) {
            Ok(value) => return Ok(value),
            Err(err) => {
                last_err = Some(err);
                if attempt < max_retries {
                    let backoff = base_ms.saturating_mul(1u64 << attempt.min(20));
                    thread::sleep(Duration::from_millis(backoff));
                }
            }
        }
    }
    Err(last_err.expect("loop runs at least once"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn succeeds_on_first_try_without_sleeping() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = retry_with_backoff(3, 1, |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn exhausts_all_attempts_then_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = retry_with_backoff(2, 1, |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("boom")
        });
        assert_eq!(result, Err("boom"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = retry_with_backoff(5, 1, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            if attempt < 2 {
                Err("transient")
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
