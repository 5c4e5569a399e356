use std::{sync::Arc, time::Duration};

/// Message fragments that mark a failure as transient.
const RETRYABLE_KEYWORDS: &[&str] = &[
    "timeout",
    "timed out",
    "network",
    "econnreset",
    "etimedout",
    "connection reset",
    "temporary",
    "temporarily",
];

/// Classifies a failure message as transient.
pub fn is_retryable_message(message: &str) -> bool {
    let message = message.to_lowercase();
    RETRYABLE_KEYWORDS.iter().any(|keyword| message.contains(keyword))
}

pub type RetryPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Bounded retry with exponential backoff.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt is `base_delay * 2`.
    pub base_delay: Duration,
    pub max_delay: Duration,
    retryable: RetryPredicate,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            retryable: Arc::new(is_retryable_message),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_predicate(mut self, retryable: RetryPredicate) -> Self {
        self.retryable = retryable;
        self
    }

    /// Backoff after the given 1-based attempt failed: `base * 2^attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    pub fn is_retryable(&self, message: &str) -> bool {
        (self.retryable)(message)
    }

    /// Whether another attempt should follow a failed `attempt`.
    pub fn should_retry(&self, attempt: u32, message: &str) -> bool {
        attempt < self.max_attempts && self.is_retryable(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_transient_failures() {
        assert!(is_retryable_message("request timeout after 30s"));
        assert!(is_retryable_message("read ECONNRESET"));
        assert!(is_retryable_message("Temporary failure in name resolution"));
        assert!(!is_retryable_message("invalid argument: topic"));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
        assert_eq!(policy.delay_after(10), Duration::from_secs(60));
    }

    #[test]
    fn stops_at_max_attempts() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        assert!(policy.should_retry(2, "network down"));
        assert!(!policy.should_retry(3, "network down"));
        assert!(!policy.should_retry(1, "bad request"));
    }
}
