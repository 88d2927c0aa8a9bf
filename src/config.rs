use crate::core::{MutateError, Result};
use crate::transport::status;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Retry behavior for batched mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Rounds allowed after the first submission. `0` makes the first
    /// round's outcome final.
    pub max_retries: u32,
    /// Base of the exponential delay: round `n` waits at least `2^n * base_backoff_ms`.
    pub base_backoff_ms: u64,
    /// Width of the random window added on top of the exponential delay.
    pub jitter_ms: u64,
    /// Entry status codes worth resubmitting.
    pub retryable_codes: BTreeSet<i32>,
    /// Optional bound on the wall-clock time of a whole call.
    pub deadline_ms: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff_ms: 1_000,
            jitter_ms: 1_000,
            retryable_codes: BTreeSet::from([
                status::DEADLINE_EXCEEDED,
                status::ABORTED,
                status::UNAVAILABLE,
            ]),
            deadline_ms: None,
        }
    }
}

impl RetryPolicy {
    /// Parses a policy from JSON; omitted fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let policy: Self = serde_json::from_str(json)?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn is_retryable(&self, code: i32) -> bool {
        self.retryable_codes.contains(&code)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retryable_codes.contains(&status::OK) {
            return Err(MutateError::InvalidConfig(
                "Status code 0 means success and cannot be retryable".to_string(),
            ));
        }

        if self.deadline_ms == Some(0) {
            return Err(MutateError::InvalidConfig(
                "deadline_ms must be > 0 when set".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration for a [`crate::BatchMutator`].
#[derive(Debug, Clone)]
pub struct MutatorConfig {
    /// Fully qualified table the mutations are sent to.
    pub table_name: String,

    pub retry: RetryPolicy,

    /// Seed for backoff jitter; unseeded mutators draw from the thread RNG.
    pub jitter_seed: Option<u64>,
}

impl MutatorConfig {
    pub fn new(table_name: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            retry: RetryPolicy::default(),
            jitter_seed: None,
        }
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    /// Set exponential base and jitter window
    pub fn backoff(mut self, base: Duration, jitter: Duration) -> Self {
        self.retry.base_backoff_ms = saturating_millis(base);
        self.retry.jitter_ms = saturating_millis(jitter);
        self
    }

    pub fn retryable_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.retry.retryable_codes = codes.into_iter().collect();
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.retry.deadline_ms = Some(saturating_millis(deadline));
        self
    }

    pub fn jitter_seed(mut self, seed: u64) -> Self {
        self.jitter_seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            return Err(MutateError::InvalidConfig(
                "table_name must not be empty".to_string(),
            ));
        }
        self.retry.validate()
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_backoff_ms, 1_000);
        assert_eq!(policy.jitter_ms, 1_000);
        assert!(policy.is_retryable(status::DEADLINE_EXCEEDED));
        assert!(policy.is_retryable(status::UNAVAILABLE));
        assert!(!policy.is_retryable(status::INVALID_ARGUMENT));
        assert!(policy.deadline().is_none());
    }

    #[test]
    fn test_builder_pattern() {
        let config = MutatorConfig::new("projects/p/instances/i/tables/t")
            .max_retries(5)
            .backoff(Duration::from_millis(10), Duration::from_millis(5))
            .retryable_codes([14])
            .deadline(Duration::from_secs(30))
            .jitter_seed(7);

        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base_backoff_ms, 10);
        assert_eq!(config.retry.jitter_ms, 5);
        assert_eq!(config.retry.retryable_codes, BTreeSet::from([14]));
        assert_eq!(config.retry.deadline_ms, Some(30_000));
        assert_eq!(config.jitter_seed, Some(7));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_huge_durations_saturate() {
        let config = MutatorConfig::new("t")
            .backoff(Duration::MAX, Duration::MAX)
            .deadline(Duration::MAX);
        assert_eq!(config.retry.base_backoff_ms, u64::MAX);
        assert_eq!(config.retry.jitter_ms, u64::MAX);
        assert_eq!(config.retry.deadline_ms, Some(u64::MAX));
    }

    #[test]
    fn test_retry_policy_replaces_the_whole_policy() {
        let policy = RetryPolicy::from_json(r#"{"max_retries": 9, "jitter_ms": 0}"#).unwrap();
        let config = MutatorConfig::new("t").max_retries(1).retry_policy(policy.clone());
        assert_eq!(config.retry, policy);
        assert_eq!(config.retry.max_retries, 9);
    }

    #[test]
    fn test_from_json_keeps_defaults() {
        let policy = RetryPolicy::from_json(r#"{"max_retries": 1, "retryable_codes": [14]}"#).unwrap();
        assert_eq!(policy.max_retries, 1);
        assert_eq!(policy.base_backoff_ms, 1_000);
        assert!(policy.is_retryable(14));
        assert!(!policy.is_retryable(4));
    }

    #[test]
    fn test_validate() {
        assert!(RetryPolicy::from_json(r#"{"retryable_codes": [0, 14]}"#).is_err());
        assert!(RetryPolicy::from_json(r#"{"deadline_ms": 0}"#).is_err());
        assert!(RetryPolicy::from_json("not json").is_err());
        assert!(MutatorConfig::new("  ").validate().is_err());
    }
}
