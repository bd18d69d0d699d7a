// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-reconciliation identity and cancellation context.
//!
//! Every reconciliation is driven by a [`ReconcileKey`] and runs under a
//! [`ReconcileContext`]. The context carries a cancellation token and the
//! deadline attached to each downstream call; no store or signal call is
//! issued without going through [`ReconcileContext::run`].
//!
//! Contexts form a tree: the controller owns a root token that is cancelled
//! on shutdown, and each reconciliation gets a child. Cancelling a child
//! never affects its siblings.

use crate::errors::Interrupted;
use kube::{Resource, ResourceExt};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Identity of exactly one target object: `{namespace, name}`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReconcileKey {
    /// Namespace of the target object
    pub namespace: String,
    /// Name of the target object
    pub name: String,
}

impl ReconcileKey {
    /// Create a key from a namespace and a name.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Build the key of a namespaced object.
    #[must_use]
    pub fn from_object<K>(object: &K) -> Self
    where
        K: Resource + ResourceExt,
    {
        Self::new(object.namespace().unwrap_or_default(), object.name_any())
    }
}

impl fmt::Display for ReconcileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Cancellation and deadline context for one reconciliation.
#[derive(Clone, Debug)]
pub struct ReconcileContext {
    token: CancellationToken,
    timeout: Duration,
}

impl ReconcileContext {
    /// Create a context from an existing token and a per-call deadline.
    #[must_use]
    pub fn new(token: CancellationToken, timeout: Duration) -> Self {
        Self { token, timeout }
    }

    /// Create a context with a fresh, unparented token.
    #[must_use]
    pub fn detached(timeout: Duration) -> Self {
        Self::new(CancellationToken::new(), timeout)
    }

    /// Derive a context for a single reconciliation.
    ///
    /// The child is cancelled when this context is cancelled; cancelling the
    /// child leaves this context untouched.
    #[must_use]
    pub fn child(&self) -> Self {
        Self::new(self.token.child_token(), self.timeout)
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether this context has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Deadline attached to each call issued under this context.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run a downstream call under this context.
    ///
    /// The call is dropped, and therefore aborted, as soon as the context is
    /// cancelled or the deadline elapses.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupted::Cancelled`] if the context was cancelled before the
    /// call finished, or [`Interrupted::DeadlineExceeded`] if the deadline elapsed.
    pub async fn run<F>(&self, operation: &str, call: F) -> Result<F::Output, Interrupted>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(Interrupted::Cancelled {
                operation: operation.to_string(),
            }),
            result = tokio::time::timeout(self.timeout, call) => {
                result.map_err(|_| Interrupted::DeadlineExceeded {
                    operation: operation.to_string(),
                    timeout: self.timeout,
                })
            }
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
