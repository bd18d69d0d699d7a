// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `Gslb` reconciliation.
//!
//! One pass converges one `Gslb` toward its resolved state:
//!
//! 1. **Fetch** the `Gslb`. A missing object was deleted; its ingress is
//!    garbage-collected through the owner reference, so nothing is requeued.
//! 2. **Resolve** the declared hosts. A failure aborts the pass before any
//!    child is touched.
//! 3. **Synthesize** the desired ingress from the `Gslb` and the resolved
//!    state only.
//! 4. **Apply** it: create a skeleton when absent, otherwise write only when a
//!    managed field differs. A conflicting write is retried once with a fresh
//!    read.
//! 5. **Report** the outcome on the `Gslb` status when it changed.
//!
//! The pass is safe to repeat: an unchanged world produces no writes.

use super::ingress::{desired_ingress, merge, skeleton};
use super::retry::ErrorBackoff;
use super::status::{failed_status, resolved_status, status_changed};
use crate::config::SharedConfig;
use crate::constants::APPLY_MAX_ATTEMPTS;
use crate::context::{ReconcileContext, ReconcileKey};
use crate::crd::{Gslb, GslbStatus};
use crate::errors::{ErrorClass, Interrupted, ReconcileError, StoreError};
use crate::resolver::{GslbResolver, ResolvedState};
use crate::store::{ObjectStore, Versioned};
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Result of a successful pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Evaluate the object again after this delay.
    Requeue(Duration),
    /// The object is gone; wait for a new event.
    Deleted,
}

/// What a single apply attempt did to the owned ingress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created,
    Updated,
    Unchanged,
    Deleted,
    Absent,
}

/// Failure of a single apply attempt.
enum ApplyError {
    /// The store reported a version conflict; worth one fresh attempt.
    Conflict(String),
    Failed(ReconcileError),
}

impl From<Interrupted> for ApplyError {
    fn from(err: Interrupted) -> Self {
        Self::Failed(err.into())
    }
}

/// Shared state of the `Gslb` controller.
pub struct GslbReconciler {
    store: Arc<dyn ObjectStore>,
    resolver: Arc<dyn GslbResolver>,
    config: SharedConfig,
    backoff: ErrorBackoff,
    shutdown: CancellationToken,
}

impl GslbReconciler {
    #[must_use]
    pub fn new(
        store: Arc<dyn ObjectStore>,
        resolver: Arc<dyn GslbResolver>,
        config: SharedConfig,
    ) -> Self {
        Self {
            store,
            resolver,
            config,
            backoff: ErrorBackoff::default(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancel every in-flight pass when `token` is cancelled.
    #[must_use]
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Replace the requeue backoff.
    #[must_use]
    pub fn with_backoff(mut self, backoff: ErrorBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    #[must_use]
    pub fn backoff(&self) -> &ErrorBackoff {
        &self.backoff
    }

    /// Fresh context for one pass, cancelled on shutdown.
    #[must_use]
    pub fn context(&self) -> ReconcileContext {
        ReconcileContext::new(
            self.shutdown.child_token(),
            self.config.snapshot().operation_timeout(),
        )
    }

    /// Run one pass for `key`.
    ///
    /// # Errors
    ///
    /// Returns a [`ReconcileError`] when the pass could not converge. Use
    /// [`ReconcileError::class`] to decide how to requeue.
    pub async fn reconcile(
        &self,
        ctx: &ReconcileContext,
        key: &ReconcileKey,
    ) -> Result<Outcome, ReconcileError> {
        let outcome = self.converge(ctx, key).await?;
        self.backoff.reset(key);
        Ok(outcome)
    }

    async fn converge(
        &self,
        ctx: &ReconcileContext,
        key: &ReconcileKey,
    ) -> Result<Outcome, ReconcileError> {
        let config = self.config.snapshot();

        let gslb = match ctx.run("get gslb", self.store.get_gslb(key)).await? {
            Ok(Versioned { value, .. }) => value,
            Err(StoreError::NotFound) => {
                debug!("Gslb no longer exists, nothing to do");
                return Ok(Outcome::Deleted);
            }
            Err(e) => return Err(ReconcileError::store("get gslb", key, e)),
        };

        let geo_tag = config.cluster_geo_tag.as_str();
        let state = match self.resolver.resolve(ctx, &config, &gslb.spec).await {
            Ok(state) => state,
            Err(e) => {
                let err = ReconcileError::from(e);
                if let Some(reason) = err.reason() {
                    self.report_failure(ctx, key, &gslb, reason, &err).await;
                }
                return Err(err);
            }
        };

        let desired = (!gslb.spec.normalized_hosts().is_empty())
            .then(|| desired_ingress(&gslb, &state, geo_tag));
        let applied = self.apply(ctx, key, &gslb, desired.as_ref()).await?;
        debug!(outcome = ?applied, "Applied owned ingress");

        if self.report_success(ctx, key, &gslb, &state, geo_tag).await? {
            return Ok(Outcome::Deleted);
        }

        Ok(Outcome::Requeue(config.requeue_interval()))
    }

    /// Converge the owned ingress, retrying once on conflict.
    async fn apply(
        &self,
        ctx: &ReconcileContext,
        key: &ReconcileKey,
        gslb: &Gslb,
        desired: Option<&Ingress>,
    ) -> Result<ApplyOutcome, ReconcileError> {
        let mut last_conflict = String::new();
        for attempt in 1..=APPLY_MAX_ATTEMPTS {
            match self.apply_once(ctx, key, gslb, desired).await {
                Ok(outcome) => return Ok(outcome),
                Err(ApplyError::Failed(err)) => return Err(err),
                Err(ApplyError::Conflict(reason)) => {
                    debug!(attempt, reason = %reason, "Conflict applying owned ingress");
                    last_conflict = reason;
                }
            }
        }

        Err(ReconcileError::Conflict {
            key: key.clone(),
            attempts: APPLY_MAX_ATTEMPTS,
            reason: last_conflict,
        })
    }

    /// One fetch-diff-write cycle.
    async fn apply_once(
        &self,
        ctx: &ReconcileContext,
        key: &ReconcileKey,
        gslb: &Gslb,
        desired: Option<&Ingress>,
    ) -> Result<ApplyOutcome, ApplyError> {
        let existing = match ctx.run("get ingress", self.store.get_ingress(key)).await? {
            Ok(existing) => Some(existing),
            Err(StoreError::NotFound) => None,
            Err(e) => {
                let err = ReconcileError::store("get ingress", key, e);
                return Err(ApplyError::Failed(err));
            }
        };

        match (existing, desired) {
            (None, None) => Ok(ApplyOutcome::Absent),
            (None, Some(desired)) => {
                let result = ctx
                    .run("create ingress", self.store.create_ingress(&skeleton(desired)))
                    .await?;
                written("create ingress", key, result)?;
                info!("Created owned ingress");
                Ok(ApplyOutcome::Created)
            }
            (Some(current), Some(desired)) => {
                let Some(updated) = merge(&current.value, desired) else {
                    return Ok(ApplyOutcome::Unchanged);
                };
                let result = ctx
                    .run(
                        "update ingress",
                        self.store.update_ingress(&updated, &current.version),
                    )
                    .await?;
                written("update ingress", key, result)?;
                info!("Updated owned ingress");
                Ok(ApplyOutcome::Updated)
            }
            (Some(current), None) => {
                if !is_owned_by(&current.value, gslb) {
                    return Ok(ApplyOutcome::Absent);
                }
                let result = ctx
                    .run(
                        "delete ingress",
                        self.store.delete_ingress(key, &current.version),
                    )
                    .await?;
                match result {
                    Ok(()) | Err(StoreError::NotFound) => {
                        info!("Deleted owned ingress, Gslb declares no hosts");
                        Ok(ApplyOutcome::Deleted)
                    }
                    Err(StoreError::Conflict(reason)) => Err(ApplyError::Conflict(reason)),
                    Err(e) => Err(ApplyError::Failed(ReconcileError::store(
                        "delete ingress",
                        key,
                        e,
                    ))),
                }
            }
        }
    }

    /// Write the resolved status if it changed. Returns `true` when the
    /// `Gslb` disappeared in the meantime.
    async fn report_success(
        &self,
        ctx: &ReconcileContext,
        key: &ReconcileKey,
        gslb: &Gslb,
        state: &ResolvedState,
        geo_tag: &str,
    ) -> Result<bool, ReconcileError> {
        let status = resolved_status(gslb, state, geo_tag);
        if !status_changed(gslb, &status) {
            return Ok(false);
        }
        match self.write_status(ctx, key, &status).await? {
            Ok(()) => Ok(false),
            Err(StoreError::NotFound) => Ok(true),
            Err(e) => Err(ReconcileError::store("update gslb status", key, e)),
        }
    }

    /// Record a permanent failure on the `Gslb`. Failing to do so is logged
    /// and does not replace the original error.
    async fn report_failure(
        &self,
        ctx: &ReconcileContext,
        key: &ReconcileKey,
        gslb: &Gslb,
        reason: &str,
        err: &ReconcileError,
    ) {
        let status = failed_status(gslb, reason, &err.to_string());
        if !status_changed(gslb, &status) {
            return;
        }
        match self.write_status(ctx, key, &status).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to record failure on Gslb status"),
            Err(e) => warn!(error = %e, "Interrupted while recording failure on Gslb status"),
        }
    }

    async fn write_status(
        &self,
        ctx: &ReconcileContext,
        key: &ReconcileKey,
        status: &GslbStatus,
    ) -> Result<Result<(), StoreError>, Interrupted> {
        ctx.run(
            "update gslb status",
            self.store.update_gslb_status(key, status),
        )
        .await
    }

    /// Requeue delay after a failed pass for `key`.
    pub fn on_error(&self, key: &ReconcileKey, err: &ReconcileError) -> Duration {
        let class = err.class();
        let delay = self.backoff.next_delay(key, class);
        match class {
            ErrorClass::Transient => warn!(
                gslb = %key,
                error = %err,
                requeue_secs = delay.as_secs(),
                "Reconciliation failed, retrying with backoff"
            ),
            ErrorClass::Permanent => error!(
                gslb = %key,
                error = %err,
                requeue_secs = delay.as_secs(),
                "Reconciliation failed and needs operator intervention"
            ),
        }
        delay
    }
}

/// Map the result of a create or update onto an apply attempt.
fn written(
    operation: &'static str,
    key: &ReconcileKey,
    result: Result<Versioned<Ingress>, StoreError>,
) -> Result<(), ApplyError> {
    match result {
        Ok(_) => Ok(()),
        Err(StoreError::Conflict(reason)) => Err(ApplyError::Conflict(reason)),
        // Deleted between read and write: start over with a fresh read.
        Err(StoreError::NotFound) => Err(ApplyError::Conflict(format!(
            "ingress {key} disappeared during {operation}"
        ))),
        Err(e) => Err(ApplyError::Failed(ReconcileError::store(operation, key, e))),
    }
}

fn is_owned_by(ingress: &Ingress, gslb: &Gslb) -> bool {
    let Some(uid) = gslb.metadata.uid.as_deref() else {
        return false;
    };
    ingress
        .metadata
        .owner_references
        .iter()
        .flatten()
        .any(|owner| owner.uid == uid)
}

/// Controller entry point for one `Gslb` event.
///
/// # Errors
///
/// Returns the [`ReconcileError`] of the failed pass; [`error_policy`] turns it
/// into a requeue.
pub async fn reconcile(
    gslb: Arc<Gslb>,
    ctx: Arc<GslbReconciler>,
) -> Result<Action, ReconcileError> {
    let key = ReconcileKey::from_object(gslb.as_ref());
    let span = info_span!("reconcile", gslb = %key, namespace = %key.namespace);
    let pass = ctx.context();

    match ctx.reconcile(&pass, &key).instrument(span).await? {
        Outcome::Requeue(after) => {
            debug!(gslb = %key, requeue_secs = after.as_secs(), "Reconciled Gslb");
            Ok(Action::requeue(after))
        }
        Outcome::Deleted => Ok(Action::await_change()),
    }
}

/// Controller error policy: requeue with the per-key backoff.
pub fn error_policy(gslb: Arc<Gslb>, err: &ReconcileError, ctx: Arc<GslbReconciler>) -> Action {
    let key = ReconcileKey::from_object(gslb.as_ref());
    Action::requeue(ctx.on_error(&key, err))
}

#[cfg(test)]
#[path = "gslb_tests.rs"]
mod gslb_tests;
