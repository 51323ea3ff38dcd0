use std::time::Duration;

/// High-level classification of an engine failure for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Out of memory or similar resource exhaustion. Never retried on the same engine.
    Memory,
    /// Timeout, refused connection, TLS failure. Retried with backoff.
    Network,
    /// Any other processing error. Retried once.
    General,
    /// Engine not installed or not configured. Skipped.
    Unavailable,
    /// Engine cannot handle this request shape (e.g. a time range). Skipped.
    Capability,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Memory => "memory",
            ErrorKind::Network => "network",
            ErrorKind::General => "general",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Capability => "capability",
        }
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Move on to the next engine in the chain.
    Advance,
    /// Retry the same engine after the given delay.
    RetryAfter(Duration),
}

/// Exponential backoff policy for one engine in a fallback chain.
///
/// The n-th retry (1-based) waits `base_delay_secs ^ n` seconds, capped at `max_delay`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries allowed for network errors (first attempt not counted).
    pub max_retries: u32,
    pub base_delay_secs: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_secs: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Policy that retries like the default but never sleeps. Used by tests.
    pub fn immediate() -> Self {
        Self {
            base_delay_secs: 0.0,
            ..Self::default()
        }
    }

    /// Decide what to do after a failure, given how many retries were already
    /// spent on this engine for this unit of work.
    pub fn decide(&self, retries_so_far: u32, kind: ErrorKind) -> RetryDecision {
        let allowed = match kind {
            ErrorKind::Network => self.max_retries,
            ErrorKind::General => self.max_retries.min(1),
            ErrorKind::Memory | ErrorKind::Unavailable | ErrorKind::Capability => 0,
        };
        if retries_so_far >= allowed {
            return RetryDecision::Advance;
        }
        RetryDecision::RetryAfter(self.delay_for(retries_so_far + 1))
    }

    /// Backoff before the `retry`-th retry (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.min(16) as i32;
        let secs = self.base_delay_secs.max(0.0).powi(exp);
        let cap = self.max_delay.as_secs_f64();
        if !secs.is_finite() || secs >= cap {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }
}
