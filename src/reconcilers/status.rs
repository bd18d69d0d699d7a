// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers for `Gslb` resources.
//!
//! Kubernetes conditions follow a standard format:
//! - `type`: The aspect of the resource being reported (e.g., "Ready")
//! - `status`: "True", "False", or "Unknown"
//! - `reason`: A programmatic identifier (CamelCase)
//! - `message`: A human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp when the status last changed
//!
//! The status is computed from the resolved state only, so an unchanged
//! world yields an identical status and no write.
//!
//! # Example
//!
//! ```rust,no_run
//! use gslb::reconcilers::status::create_condition;
//!
//! let condition = create_condition(
//!     "Ready",
//!     "True",
//!     "Resolved",
//!     "1 of 1 hosts resolved with strategy roundRobin"
//! );
//! ```

use crate::crd::{Condition, Gslb, GslbStatus};
use crate::resolver::ResolvedState;
use crate::status_reasons::{
    CONDITION_TYPE_READY, REASON_NO_HEALTHY_TARGETS, REASON_PARTIALLY_RESOLVED, REASON_RESOLVED,
};
use chrono::Utc;

/// Create a new Kubernetes condition with the current timestamp.
///
/// # Example
///
/// ```rust,no_run
/// # use gslb::reconcilers::status::create_condition;
/// let message = "unknown strategy type 'random'";
/// let condition = create_condition("Ready", "False", "UnknownStrategy", message);
/// assert_eq!(condition.r#type, "Ready");
/// assert_eq!(condition.status, "False");
/// ```
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Keep the previous `lastTransitionTime` when the status did not change.
///
/// A condition only transitions when its `status` changes; a new reason or
/// message alone is not a transition.
#[must_use]
pub fn carry_transition_time(previous: &[Condition], mut condition: Condition) -> Condition {
    if let Some(prev) = previous
        .iter()
        .find(|c| c.r#type == condition.r#type && c.status == condition.status)
    {
        condition
            .last_transition_time
            .clone_from(&prev.last_transition_time);
    }
    condition
}

/// Ready condition describing a resolved state.
#[must_use]
pub fn ready_condition(gslb: &Gslb, state: &ResolvedState) -> Condition {
    let strategy = gslb.spec.strategy.r#type.as_str();
    let declared = gslb.spec.normalized_hosts().len();
    let resolved = state.hosts.values().filter(|t| !t.is_empty()).count();
    let message = format!("{resolved} of {declared} hosts resolved with strategy {strategy}");

    if resolved == 0 {
        create_condition(CONDITION_TYPE_READY, "False", REASON_NO_HEALTHY_TARGETS, &message)
    } else if resolved < declared {
        create_condition(CONDITION_TYPE_READY, "True", REASON_PARTIALLY_RESOLVED, &message)
    } else {
        create_condition(CONDITION_TYPE_READY, "True", REASON_RESOLVED, &message)
    }
}

/// Status of a successfully reconciled `Gslb`.
#[must_use]
pub fn resolved_status(gslb: &Gslb, state: &ResolvedState, geo_tag: &str) -> GslbStatus {
    let previous = gslb
        .status
        .as_ref()
        .map(|s| s.conditions.as_slice())
        .unwrap_or_default();

    GslbStatus {
        conditions: vec![carry_transition_time(
            previous,
            ready_condition(gslb, state),
        )],
        observed_generation: gslb.metadata.generation,
        geo_tag: (!geo_tag.is_empty()).then(|| geo_tag.to_string()),
        hosts: state.managed_hosts(),
        healthy_records: state.healthy_records(),
    }
}

/// Status of a `Gslb` whose reconciliation failed permanently.
///
/// Everything but the Ready condition keeps its last reported value.
#[must_use]
pub fn failed_status(gslb: &Gslb, reason: &str, message: &str) -> GslbStatus {
    let mut status = gslb.status.clone().unwrap_or_default();
    let condition = carry_transition_time(
        &status.conditions,
        create_condition(CONDITION_TYPE_READY, "False", reason, message),
    );
    status.conditions.retain(|c| c.r#type != CONDITION_TYPE_READY);
    status.conditions.push(condition);
    status.observed_generation = gslb.metadata.generation;
    status
}

/// Whether `desired` differs from the status currently stored on `gslb`.
#[must_use]
pub fn status_changed(gslb: &Gslb, desired: &GslbStatus) -> bool {
    gslb.status.as_ref() != Some(desired)
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
