// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Requeue delays for failed reconciliations.
//!
//! Each key keeps its own failure count. Transient failures back off
//! exponentially with jitter, permanent failures go straight to the longest
//! interval, and a successful pass resets the count.
//!
//! # Retry Schedule
//!
//! With the default settings, transient failures are retried after roughly:
//!
//! 1. 5s
//! 2. 10s
//! 3. 20s
//! 4. 40s
//! 5. 80s
//! 6. 160s
//! 7. 300s (capped at max interval)

use crate::constants::{ERROR_REQUEUE_INITIAL_SECS, ERROR_REQUEUE_MAX_SECS};
use crate::context::ReconcileKey;
use crate::errors::ErrorClass;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Per-key exponential backoff.
#[derive(Debug)]
pub struct ErrorBackoff {
    /// Delay after the first failure
    pub initial_interval: Duration,
    /// Longest delay, also used for permanent failures
    pub max_interval: Duration,
    /// Randomization factor (e.g., 0.1 for ±10%), within `0.0..=1.0`
    pub randomization_factor: f64,
    failures: Mutex<HashMap<ReconcileKey, u32>>,
}

impl Default for ErrorBackoff {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(ERROR_REQUEUE_INITIAL_SECS),
            Duration::from_secs(ERROR_REQUEUE_MAX_SECS),
            RANDOMIZATION_FACTOR,
        )
    }
}

impl ErrorBackoff {
    #[must_use]
    pub fn new(
        initial_interval: Duration,
        max_interval: Duration,
        randomization_factor: f64,
    ) -> Self {
        Self {
            initial_interval,
            max_interval,
            randomization_factor: clamp_factor(randomization_factor),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Delay before retrying after the `failures`-th consecutive failure,
    /// without jitter.
    #[must_use]
    pub fn base_delay(&self, failures: u32) -> Duration {
        let exponent = i32::try_from(failures.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_interval.as_secs_f64() * BACKOFF_MULTIPLIER.powi(exponent);
        if !secs.is_finite() || secs >= self.max_interval.as_secs_f64() {
            return self.max_interval;
        }
        Duration::from_secs_f64(secs)
    }

    /// Record a failure of `key` and return the delay before its next attempt.
    pub fn next_delay(&self, key: &ReconcileKey, class: ErrorClass) -> Duration {
        let failures = {
            let mut failures = self
                .failures
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let count = failures.entry(key.clone()).or_insert(0);
            *count = count.saturating_add(1);
            *count
        };

        match class {
            ErrorClass::Permanent => self.max_interval,
            ErrorClass::Transient => self.apply_jitter(self.base_delay(failures)),
        }
    }

    /// Forget the failures of `key` after a successful pass.
    pub fn reset(&self, key: &ReconcileKey) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Consecutive failures currently recorded for `key`.
    #[must_use]
    pub fn failures(&self, key: &ReconcileKey) -> u32 {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Apply randomization (jitter) to an interval, never exceeding the cap.
    fn apply_jitter(&self, interval: Duration) -> Duration {
        let factor = clamp_factor(self.randomization_factor);
        if factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * factor;
        let min = secs - delta;
        let max = secs + delta;

        let jittered = rand::rng().random_range(min..=max);

        Duration::from_secs_f64(jittered.max(0.0)).min(self.max_interval)
    }
}

/// A factor outside `0.0..=1.0` (or NaN) would make the jitter range empty.
fn clamp_factor(factor: f64) -> f64 {
    if factor.is_nan() {
        0.0
    } else {
        factor.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
