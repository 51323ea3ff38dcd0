//! Drive one engine call through the retry policy.

use crate::retry::classify::classify;
use crate::retry::error::EngineError;
use crate::retry::policy::{ErrorKind, RetryDecision, RetryPolicy};

/// Successful outcome and the number of retries it took.
#[derive(Debug)]
pub struct Attempt<T> {
    pub value: T,
    pub retries: u32,
}

/// Last error after the policy said to stop retrying on this engine.
#[derive(Debug)]
pub struct Exhausted {
    pub error: EngineError,
    pub kind: ErrorKind,
    pub retries: u32,
}

/// Runs a closure until it succeeds or the retry policy says to advance.
/// The closure receives the 0-based retry number. On a retryable failure,
/// sleeps for the backoff duration then tries again.
pub fn run_with_retry<T, F>(policy: &RetryPolicy, mut f: F) -> Result<Attempt<T>, Exhausted>
where
    F: FnMut(u32) -> Result<T, EngineError>,
{
    let mut retries = 0u32;
    loop {
        match f(retries) {
            Ok(value) => return Ok(Attempt { value, retries }),
            Err(error) => {
                let kind = classify(&error);
                match policy.decide(retries, kind) {
                    RetryDecision::Advance => {
                        return Err(Exhausted {
                            error,
                            kind,
                            retries,
                        })
                    }
                    RetryDecision::RetryAfter(d) => {
                        tracing::debug!(
                            kind = kind.as_str(),
                            retry = retries + 1,
                            delay_ms = d.as_millis() as u64,
                            "retrying engine call: {}",
                            error
                        );
                        std::thread::sleep(d);
                        retries += 1;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_attempted_max_retries_plus_one() {
        let policy = RetryPolicy::immediate();
        let mut calls = 0;
        let res: Result<Attempt<()>, _> = run_with_retry(&policy, |_| {
            calls += 1;
            Err(EngineError::Opaque("connection refused".into()))
        });
        let ex = res.unwrap_err();
        assert_eq!(calls, policy.max_retries + 1);
        assert_eq!(ex.retries, policy.max_retries);
        assert_eq!(ex.kind, ErrorKind::Network);
    }

    #[test]
    fn memory_attempted_once() {
        let policy = RetryPolicy::immediate();
        let mut calls = 0;
        let res: Result<Attempt<()>, _> = run_with_retry(&policy, |_| {
            calls += 1;
            Err(EngineError::Opaque("ENOMEM".into()))
        });
        assert_eq!(calls, 1);
        assert_eq!(res.unwrap_err().kind, ErrorKind::Memory);
    }

    #[test]
    fn succeeds_after_transient_failure() {
        let policy = RetryPolicy::immediate();
        let res = run_with_retry(&policy, |n| {
            if n == 0 {
                Err(EngineError::TransientNetwork("reset".into()))
            } else {
                Ok("text")
            }
        })
        .unwrap();
        assert_eq!(res.value, "text");
        assert_eq!(res.retries, 1);
    }
}
