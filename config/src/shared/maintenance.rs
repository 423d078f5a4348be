use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// What happens to a primary write when its index mutations keep failing.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MaintenancePolicy {
    /// Report the failure as drift and let the primary write proceed.
    #[default]
    BestEffort,
    /// Report the failure as drift and reject the primary write.
    Strict,
}

/// Exponential backoff applied to index-store mutations.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay after each failed attempt.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

impl RetryConfig {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    pub const DEFAULT_INITIAL_DELAY_MS: u64 = 10;

    pub const DEFAULT_MAX_DELAY_MS: u64 = 1_000;

    pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

    /// A policy that tries exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Returns the delay to wait after the failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_ms = (self.initial_delay_ms as f64) * self.backoff_factor.powi(exponent);
        let capped_ms = delay_ms.min(self.max_delay_ms as f64).max(0.0);

        Duration::from_millis(capped_ms as u64)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "max_attempts".to_string(),
                constraint: "must be at least 1".to_string(),
            });
        }

        if self.backoff_factor < 1.0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "backoff_factor".to_string(),
                constraint: "must be >= 1.0".to_string(),
            });
        }

        if self.initial_delay_ms > self.max_delay_ms {
            return Err(ValidationError::InvalidFieldValue {
                field: "initial_delay_ms".to_string(),
                constraint: "must be <= max_delay_ms".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            initial_delay_ms: Self::DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: Self::DEFAULT_MAX_DELAY_MS,
            backoff_factor: Self::DEFAULT_BACKOFF_FACTOR,
        }
    }
}

fn default_max_attempts() -> u32 {
    RetryConfig::DEFAULT_MAX_ATTEMPTS
}

fn default_initial_delay_ms() -> u64 {
    RetryConfig::DEFAULT_INITIAL_DELAY_MS
}

fn default_max_delay_ms() -> u64 {
    RetryConfig::DEFAULT_MAX_DELAY_MS
}

fn default_backoff_factor() -> f64 {
    RetryConfig::DEFAULT_BACKOFF_FACTOR
}

/// How incremental index maintenance reacts to index-store failures.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct MaintenanceConfig {
    #[serde(default)]
    pub policy: MaintenancePolicy,
    #[serde(default)]
    pub retry: RetryConfig,
}
