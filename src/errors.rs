// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the GSLB controller.
//!
//! This module provides the error types crossing each boundary of the controller:
//! - Configuration loading and validation ([`ConfigError`])
//! - Object store access ([`StoreError`])
//! - Health and geo signal collection ([`SignalError`])
//! - Cancellation and deadlines ([`Interrupted`])
//! - Strategy resolution ([`ResolveError`])
//! - The reconciliation loop boundary ([`ReconcileError`])
//!
//! Only [`ReconcileError`] leaves the control loop. It is classified with
//! [`ErrorClass`] so the error policy can tell transient noise from conditions
//! that need operator intervention.

use crate::context::ReconcileKey;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while loading or validating the zone configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file '{path}': {source}")]
    Read {
        /// Path that was read
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The configuration document is not valid YAML for the expected shape.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A zone entry is malformed.
    #[error("invalid zone '{domain}': {reason}")]
    InvalidZone {
        /// Domain pattern of the offending zone (may be empty)
        domain: String,
        /// Explanation of what is invalid
        reason: String,
    },

    /// Two zones declare the same domain pattern.
    #[error("duplicate zone for domain pattern '{0}'")]
    DuplicateZone(String),

    /// A global tunable is out of range.
    #[error("invalid value for '{field}': {reason}")]
    InvalidTunable {
        /// camelCase field name as written in the file
        field: &'static str,
        /// Explanation of what is invalid
        reason: String,
    },
}

/// Result of a single object store call.
///
/// Mirrors the store contract: a call either succeeds with a value and its
/// version token, or fails with one of these distinguished outcomes.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The object does not exist.
    #[error("object not found")]
    NotFound,

    /// The write carried a stale version token, or the object already exists.
    #[error("version conflict: {0}")]
    Conflict(String),

    /// Any other failure (API server unavailable, transport errors, ...).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors produced by health and geo collaborators.
///
/// These never escape the resolver: strategies degrade instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignalError {
    /// The signal source could not be reached.
    #[error("signal source '{source_name}' unavailable: {reason}")]
    Unavailable {
        /// Name of the source (name server, geo provider, ...)
        source_name: String,
        /// Reason for the failure
        reason: String,
    },

    /// The source answered with data that could not be interpreted.
    #[error("signal source '{source_name}' returned invalid data: {reason}")]
    InvalidData {
        /// Name of the source
        source_name: String,
        /// Explanation of what is invalid
        reason: String,
    },
}

/// A call aborted because its reconciliation was cancelled or ran out of time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Interrupted {
    /// The reconciliation context was cancelled.
    #[error("{operation} cancelled")]
    Cancelled {
        /// Operation that was in flight
        operation: String,
    },

    /// The per-call deadline elapsed.
    #[error("{operation} exceeded deadline of {timeout:?}")]
    DeadlineExceeded {
        /// Operation that was in flight
        operation: String,
        /// Deadline that elapsed
        timeout: Duration,
    },
}

/// Errors returned by a resolver.
///
/// A resolver only fails on unrecoverable conditions or when its context is
/// interrupted. Missing or stale health data is never an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The declared strategy type is not known.
    #[error("unknown strategy type '{0}'")]
    UnknownStrategy(String),

    /// The zone managing a host is malformed.
    #[error("zone '{domain}' is corrupt: {reason}")]
    CorruptZone {
        /// Domain pattern of the zone
        domain: String,
        /// Explanation of what is corrupt
        reason: String,
    },

    /// The resolution was cancelled or exceeded its deadline.
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

/// How the control loop should treat a failed reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Requeue with growing backoff; expected to clear on its own.
    Transient,
    /// Requeue at the longest interval and flag for operator intervention.
    Permanent,
}

impl ResolveError {
    /// Classify this error for the control loop.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Interrupted(_) => ErrorClass::Transient,
            Self::UnknownStrategy(_) | Self::CorruptZone { .. } => ErrorClass::Permanent,
        }
    }
}

/// Errors crossing the reconciliation loop boundary.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// An object store call failed.
    #[error("failed to {operation} for {key}: {source}")]
    Store {
        /// Operation that failed (e.g. "get ingress")
        operation: &'static str,
        /// Key being reconciled
        key: ReconcileKey,
        /// Underlying store error
        #[source]
        source: StoreError,
    },

    /// A child write kept conflicting after the local retry.
    #[error("conflict on {key} persisted after {attempts} attempts: {reason}")]
    Conflict {
        /// Key being reconciled
        key: ReconcileKey,
        /// Number of fetch-diff-write cycles attempted
        attempts: u32,
        /// Last conflict reported by the store
        reason: String,
    },

    /// A call was cancelled or exceeded its deadline.
    #[error(transparent)]
    Interrupted(#[from] Interrupted),

    /// The resolver failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl ReconcileError {
    /// Wrap a store error with the operation and key it happened on.
    #[must_use]
    pub fn store(operation: &'static str, key: &ReconcileKey, source: StoreError) -> Self {
        Self::Store {
            operation,
            key: key.clone(),
            source,
        }
    }

    /// Classify this error for the control loop.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Resolve(err) => err.class(),
            Self::Store { .. } | Self::Conflict { .. } | Self::Interrupted(_) => {
                ErrorClass::Transient
            }
        }
    }

    /// Status condition reason for permanent errors.
    #[must_use]
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            Self::Resolve(ResolveError::UnknownStrategy(_)) => {
                Some(crate::status_reasons::REASON_UNKNOWN_STRATEGY)
            }
            Self::Resolve(ResolveError::CorruptZone { .. }) => {
                Some(crate::status_reasons::REASON_CORRUPT_ZONE)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
