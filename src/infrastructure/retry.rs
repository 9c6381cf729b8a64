//! Backoff policy shared by the transport fetcher and the page loader
//!
//! The remote site throttles aggressive clients, so every retry waits a
//! linearly growing interval: `base + step * attempt`, capped at `ceiling`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::infrastructure::config::defaults;

/// Attempt budget plus delay schedule for one retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// Total attempts allowed, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry (milliseconds)
    pub base_delay_ms: u64,
    /// Added per attempt index (milliseconds)
    pub step_delay_ms: u64,
    /// Upper bound on a single delay (milliseconds)
    pub max_delay_ms: u64,
}

impl BackoffPolicy {
    pub const fn linear(max_attempts: u32, base_delay_ms: u64, step_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            step_delay_ms,
            max_delay_ms: defaults::MAX_BACKOFF_DELAY_MS,
        }
    }

    /// Same budget, no waiting. Used by tests and dry runs.
    pub const fn none(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            step_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Transport-level defaults: a very large budget, 3s + 1s per attempt.
    pub const fn transport() -> Self {
        Self::linear(
            defaults::TRANSPORT_MAX_ATTEMPTS,
            defaults::BACKOFF_BASE_DELAY_MS,
            defaults::BACKOFF_STEP_DELAY_MS,
        )
    }

    /// Page validation defaults: 10 attempts, same delay shape.
    pub const fn page() -> Self {
        Self::linear(
            defaults::PAGE_MAX_ATTEMPTS,
            defaults::BACKOFF_BASE_DELAY_MS,
            defaults::BACKOFF_STEP_DELAY_MS,
        )
    }

    /// Delay to wait after the failed attempt with 0-based index `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let millis = self
            .base_delay_ms
            .saturating_add(self.step_delay_ms.saturating_mul(u64::from(attempt)))
            .min(self.max_delay_ms);
        Duration::from_millis(millis)
    }

    /// Whether another attempt may follow the 0-based `attempt`.
    pub fn has_next(&self, attempt: u32) -> bool {
        attempt.saturating_add(1) < self.max_attempts
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::page()
    }
}
